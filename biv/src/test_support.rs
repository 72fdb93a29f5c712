//! Scripted stage doubles and a synthetic labeled mesh for tests.
//!
//! The external mesh and fiber tools are replaced by builders that write
//! placeholder field files and a small tetrahedral slab whose bottom face
//! plays both endocardia.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use purkinje::FractalTreeParameters;
use tempfile::TempDir;

use crate::core::markers::{BASE, ENDO_LV, ENDO_RV, EPI, FACET_DIM, MarkerRegistry};
use crate::core::mesh::{Cell as Tet, Facet, Mesh};
use crate::io::config::{OutputMode, PipelineConfig, PurkinjeConfig, TreeConfig};
use crate::io::fibers::{FiberGenerator, FiberRequest};
use crate::io::layout::{DataLayout, MESH_FIELDS, MESH_MSH};
use crate::io::mesh_builder::{MeshBuilder, MeshRequest};
use crate::io::msh::write_msh;

pub const BASE_TAG: i32 = 10;
pub const ENDO_RV_TAG: i32 = 20;
pub const ENDO_LV_TAG: i32 = 30;
pub const EPI_TAG: i32 = 40;

const SLAB_CELLS: [usize; 3] = [16, 8, 1];
const SLAB_SPACING: f64 = 0.25;
/// `x` coordinate splitting the bottom face into the LV (left) and RV (right).
pub const SLAB_SPLIT_X: f64 = 2.0;

/// Box `[0, 4] x [0, 2] x [0, 0.25]` of Kuhn-split cubes.
///
/// Boundary facets: bottom left `ENDO_LV`, bottom right `ENDO_RV`, top `EPI`,
/// sides `BASE`.
pub fn slab_mesh() -> Mesh {
    let [nx, ny, nz] = SLAB_CELLS;
    let index = |i: usize, j: usize, k: usize| (k * (ny + 1) + j) * (nx + 1) + i;

    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                vertices.push([
                    i as f64 * SLAB_SPACING,
                    j as f64 * SLAB_SPACING,
                    k as f64 * SLAB_SPACING,
                ]);
            }
        }
    }

    let axes = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    let mut cells = Vec::with_capacity(6 * nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                for order in axes {
                    let mut corner = [i, j, k];
                    let mut tet = [index(i, j, k); 4];
                    for (step, axis) in order.into_iter().enumerate() {
                        corner[axis] += 1;
                        tet[step + 1] = index(corner[0], corner[1], corner[2]);
                    }
                    cells.push(Tet {
                        vertices: tet,
                        tag: 0,
                    });
                }
            }
        }
    }

    let mut mesh = Mesh {
        vertices,
        cells,
        facets: Vec::new(),
        registry: slab_registry(),
    };
    let top = nz as f64 * SLAB_SPACING;
    mesh.facets = mesh
        .boundary_faces()
        .into_iter()
        .map(|face| {
            let points = face.map(|v| mesh.vertices[v]);
            let centroid_x = points.iter().map(|p| p[0]).sum::<f64>() / 3.0;
            let tag = if points.iter().all(|p| p[2] == 0.0) {
                if centroid_x < SLAB_SPLIT_X {
                    ENDO_LV_TAG
                } else {
                    ENDO_RV_TAG
                }
            } else if points.iter().all(|p| p[2] == top) {
                EPI_TAG
            } else {
                BASE_TAG
            };
            Facet {
                vertices: face,
                tag,
            }
        })
        .collect();
    mesh
}

fn slab_registry() -> MarkerRegistry {
    let mut registry = MarkerRegistry::new();
    registry.insert(BASE, BASE_TAG, FACET_DIM);
    registry.insert(ENDO_RV, ENDO_RV_TAG, FACET_DIM);
    registry.insert(ENDO_LV, ENDO_LV_TAG, FACET_DIM);
    registry.insert(EPI, EPI_TAG, FACET_DIM);
    registry
}

/// The slab with its RV endocardium relabeled as LV and `ENDO_RV` unregistered.
pub fn slab_mesh_without_endo_rv() -> Mesh {
    let mut mesh = slab_mesh();
    for facet in &mut mesh.facets {
        if facet.tag == ENDO_RV_TAG {
            facet.tag = ENDO_LV_TAG;
        }
    }
    let mut registry = MarkerRegistry::new();
    for (name, marker) in mesh.registry.iter().filter(|(name, _)| *name != ENDO_RV) {
        registry.insert(name, marker.tag, marker.dim);
    }
    mesh.registry = registry;
    mesh
}

/// Growth parameters sized for the slab's 2 x 2 endocardia.
pub fn slab_growth() -> FractalTreeParameters {
    FractalTreeParameters {
        init_length: 1.0,
        generations: 4,
        length: 0.3,
        segment_length: 0.05,
        fascicle_lengths: vec![0.5, 0.5],
        initial_direction: [1.0, 0.0, 0.0],
        search_vertices: 3,
        ..FractalTreeParameters::default()
    }
}

/// Tree roots near the left edge of each endocardium.
pub fn slab_tree_config() -> PurkinjeConfig {
    PurkinjeConfig {
        seed: 1234,
        max_seed_distance: 0.5,
        lv: TreeConfig {
            root: [0.25, 1.0, 0.02],
            growth: slab_growth(),
        },
        rv: TreeConfig {
            root: [2.25, 1.0, 0.02],
            growth: slab_growth(),
        },
    }
}

/// Default configuration writing to `root` with slab-sized trees.
pub fn slab_config(root: &Path) -> PipelineConfig {
    let mut cfg = PipelineConfig {
        purkinje: slab_tree_config(),
        ..PipelineConfig::default()
    };
    cfg.output.root = root.to_path_buf();
    cfg.output.mode = OutputMode::Fresh;
    cfg
}

/// A temporary output root with a slab configuration.
pub struct TestRun {
    temp: TempDir,
    pub config: PipelineConfig,
}

impl TestRun {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp dir")?;
        let config = slab_config(temp.path());
        Ok(Self { temp, config })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(self.temp.path())
    }

    /// Write the config to `<root>/biv.toml` and return its path.
    pub fn write_config(&self) -> Result<PathBuf> {
        let path = self.root().join("biv.toml");
        crate::io::config::write_config(&path, &self.config)?;
        Ok(path)
    }
}

fn write_placeholder(dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, format!("scripted {name}\n"))
        .with_context(|| format!("write {}", path.display()))
}

fn write_scripted_log(path: &Path, label: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("=== stdout ===\nscripted {label}\n"))?;
    Ok(())
}

/// Mesh builder that writes a fixed mesh instead of running a tool.
pub struct ScriptedMeshBuilder {
    mesh: Mesh,
    failure: Option<String>,
    skip: Vec<String>,
    calls: Cell<usize>,
}

impl ScriptedMeshBuilder {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            failure: None,
            skip: Vec::new(),
            calls: Cell::new(0),
        }
    }

    /// A builder whose every run fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(Mesh::default())
        }
    }

    /// Leave `name` out of the written artifacts.
    pub fn without_file(mut self, name: &str) -> Self {
        self.skip.push(name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl MeshBuilder for ScriptedMeshBuilder {
    fn build(&self, request: &MeshRequest<'_>) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        write_scripted_log(request.log_path, "mesh")?;
        if let Some(message) = &self.failure {
            return Err(anyhow!("{message}"));
        }
        if !self.skip.iter().any(|name| name == MESH_MSH) {
            write_msh(&request.data_dir.join(MESH_MSH), &self.mesh)?;
        }
        for field in MESH_FIELDS {
            for name in [format!("{field}.h5"), format!("{field}.xdmf")] {
                if !self.skip.contains(&name) {
                    write_placeholder(request.data_dir, &name)?;
                }
            }
        }
        Ok(())
    }
}

/// Fiber generator that records requests and writes placeholder fields.
#[derive(Default)]
pub struct ScriptedFiberGenerator {
    skip: Vec<String>,
    requests: RefCell<Vec<FiberRequest>>,
}

impl ScriptedFiberGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_file(mut self, name: &str) -> Self {
        self.skip.push(name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<FiberRequest> {
        self.requests.borrow().clone()
    }
}

impl FiberGenerator for ScriptedFiberGenerator {
    fn generate(&self, request: &FiberRequest, log_path: &Path) -> Result<()> {
        self.requests.borrow_mut().push(request.clone());
        write_scripted_log(log_path, "fibers")?;
        for field in &request.fields {
            for name in [format!("{field}.h5"), format!("{field}.xdmf")] {
                if !self.skip.contains(&name) {
                    write_placeholder(&request.output_dir, &name)?;
                }
            }
        }
        Ok(())
    }
}
