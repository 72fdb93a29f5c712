//! Mesh builder adapter.
//!
//! The [`MeshBuilder`] trait decouples the pipeline from the external meshing
//! tool (`cardiac-geometries create-biv-ellipsoid`). Tests use scripted
//! builders that write a synthetic labeled mesh without spawning processes.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::geometry::GeometryParameters;
use crate::core::mesh::Mesh;
use crate::io::config::ToolsConfig;
use crate::io::layout::{DataLayout, ensure_present};
use crate::io::msh::read_msh;
use crate::io::process::{ToolRun, run_tool};

/// Parameters for one mesh builder invocation.
#[derive(Debug, Clone, Copy)]
pub struct MeshRequest<'a> {
    pub geometry: &'a GeometryParameters,
    /// Directory that receives `biv_ellipsoid.msh` and the mesh fields.
    pub data_dir: &'a Path,
    /// Where the tool's stdout/stderr are written.
    pub log_path: &'a Path,
}

/// Abstraction over mesh generation backends.
pub trait MeshBuilder {
    /// Build the mesh. Must leave every mesh artifact in `request.data_dir`.
    fn build(&self, request: &MeshRequest<'_>) -> Result<()>;
}

/// Builder that spawns the configured `cardiac-geometries` command.
#[derive(Debug, Clone)]
pub struct CardiacGeometriesBuilder {
    pub command: Vec<String>,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl CardiacGeometriesBuilder {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self {
            command: tools.mesh_command.clone(),
            timeout: Duration::from_secs(tools.timeout_secs),
            output_limit_bytes: tools.output_limit_bytes,
        }
    }
}

impl MeshBuilder for CardiacGeometriesBuilder {
    #[instrument(skip_all, fields(data_dir = %request.data_dir.display()))]
    fn build(&self, request: &MeshRequest<'_>) -> Result<()> {
        run_tool(&ToolRun {
            label: "mesh".to_string(),
            command: self.command.clone(),
            args: mesh_args(request.geometry, request.data_dir),
            stdin: None,
            workdir: None,
            timeout: self.timeout,
            output_limit_bytes: self.output_limit_bytes,
            log_path: request.log_path.to_path_buf(),
        })?;
        Ok(())
    }
}

/// Output directory followed by one `--kebab-case value` pair per geometry field.
pub fn mesh_args(geometry: &GeometryParameters, data_dir: &Path) -> Vec<OsString> {
    let mut args = vec![data_dir.as_os_str().to_owned()];
    for (name, value) in geometry.fields() {
        args.push(format!("--{}", name.replace('_', "-")).into());
        args.push(value.to_string().into());
    }
    args
}

/// Run the builder, then check its artifacts and load the labeled mesh.
#[instrument(skip_all)]
pub fn build_mesh<B: MeshBuilder>(
    builder: &B,
    geometry: &GeometryParameters,
    layout: &DataLayout,
) -> Result<Mesh> {
    info!(char_length = geometry.char_length, "building mesh");
    let log_path = layout.log("mesh");
    builder.build(&MeshRequest {
        geometry,
        data_dir: &layout.data_dir,
        log_path: &log_path,
    })?;
    ensure_present(&layout.mesh_artifacts(), "mesh builder")?;
    load_mesh(layout)
}

/// Read `biv_ellipsoid.msh` and check that its boundary is fully labeled.
pub fn load_mesh(layout: &DataLayout) -> Result<Mesh> {
    let path = layout.mesh_msh();
    let mesh = read_msh(&path)?;
    let violations = mesh.coverage_violations();
    if !violations.is_empty() {
        return Err(anyhow!(
            "marker coverage violations in {}:\n- {}",
            path.display(),
            violations.join("\n- ")
        ))
        .context("check facet markers");
    }
    debug!(markers = mesh.registry.len(), "facet markers cover the boundary");
    Ok(mesh)
}
