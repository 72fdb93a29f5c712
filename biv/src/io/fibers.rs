//! Fiber generator adapter.
//!
//! The rule-based fiber assignment (LDRB) needs Laplace solves, so it runs in
//! an external tool. The tool receives a [`FiberRequest`] as JSON on stdin and
//! must write `fiber`, `sheet` and `sheet_normal` as `.h5` + `.xdmf` pairs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::fibers::FiberParameters;
use crate::io::config::ToolsConfig;
use crate::io::layout::{DataLayout, FIBER_FIELDS, MESH_MSH, ensure_present};
use crate::io::process::{ToolRun, run_tool};

/// Request handed to the fiber tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiberRequest {
    /// Directory holding the mesh builder's artifacts.
    pub mesh_dir: PathBuf,
    /// Raw mesh file name inside `mesh_dir`.
    pub mesh_file: String,
    /// Directory the fields are written to.
    pub output_dir: PathBuf,
    /// Boundary markers keyed `base`, `lv`, `rv`, `epi`.
    pub markers: BTreeMap<String, i32>,
    pub fiber_space: String,
    /// Helix (`alpha_*`) and transverse (`beta_*`) angles in degrees.
    pub angles: BTreeMap<String, f64>,
    /// Field names to write, each as `<name>.h5` + `<name>.xdmf`.
    pub fields: Vec<String>,
}

impl FiberRequest {
    pub fn new(layout: &DataLayout, markers: BTreeMap<String, i32>, fibers: &FiberParameters) -> Self {
        Self {
            mesh_dir: layout.data_dir.clone(),
            mesh_file: MESH_MSH.to_string(),
            output_dir: layout.data_dir.clone(),
            markers,
            fiber_space: fibers.fiber_space.clone(),
            angles: fibers
                .angles()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            fields: FIBER_FIELDS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

/// Abstraction over fiber generation backends.
pub trait FiberGenerator {
    /// Generate the fields. Must write every requested field to `request.output_dir`.
    fn generate(&self, request: &FiberRequest, log_path: &Path) -> Result<()>;
}

/// Generator that spawns the configured LDRB command.
#[derive(Debug, Clone)]
pub struct CommandFiberGenerator {
    pub command: Vec<String>,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl CommandFiberGenerator {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self {
            command: tools.fiber_command.clone(),
            timeout: Duration::from_secs(tools.timeout_secs),
            output_limit_bytes: tools.output_limit_bytes,
        }
    }
}

impl FiberGenerator for CommandFiberGenerator {
    #[instrument(skip_all, fields(fiber_space = %request.fiber_space))]
    fn generate(&self, request: &FiberRequest, log_path: &Path) -> Result<()> {
        let mut payload = serde_json::to_vec_pretty(request).context("serialize fiber request")?;
        payload.push(b'\n');
        run_tool(&ToolRun {
            label: "fibers".to_string(),
            command: self.command.clone(),
            args: Vec::new(),
            stdin: Some(payload),
            workdir: Some(request.output_dir.clone()),
            timeout: self.timeout,
            output_limit_bytes: self.output_limit_bytes,
            log_path: log_path.to_path_buf(),
        })?;
        Ok(())
    }
}

/// Run the generator and check that every field was written.
#[instrument(skip_all)]
pub fn generate_fibers<G: FiberGenerator>(
    generator: &G,
    request: &FiberRequest,
    layout: &DataLayout,
) -> Result<()> {
    info!(markers = ?request.markers, "generating fibers");
    generator.generate(request, &layout.log("fibers"))?;
    ensure_present(&layout.fiber_artifacts(), "fiber generator")
}
