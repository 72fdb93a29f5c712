//! Orchestration of a full run: mesh, fibers, LV tree, RV tree, manifest.
//!
//! Stages run strictly in that order and the first failure aborts the run.
//! Partial output is left on disk. In `resume` mode a stage whose artifacts
//! all exist is skipped and its result read back instead; a stage missing
//! any of its files runs again.

use anyhow::Context;
use chrono::Utc;
use purkinje::PurkinjeTree;
use tracing::{info, instrument, warn};

use crate::core::manifest::{ManifestInputs, RunManifest, TreeRecord, build_manifest};
use crate::core::markers::{self, first_missing, ldrb_markers};
use crate::core::mesh::Mesh;
use crate::core::ventricle::Ventricle;
use crate::error::{PipelineError, Stage};
use crate::io::config::{OutputMode, PipelineConfig};
use crate::io::fibers::{FiberGenerator, FiberRequest, generate_fibers};
use crate::io::layout::{DataLayout, all_present};
use crate::io::mesh_builder::{MeshBuilder, build_mesh, load_mesh};
use crate::io::output::{
    prepare_output, read_tree_files, write_manifest, write_markers, write_tree_files,
};
use crate::io::trees::{PurkinjeGenerator, TreeRequest};

/// Version recorded in every manifest.
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The three backends a run drives.
#[derive(Debug, Clone)]
pub struct Stages<M, F, P> {
    pub mesh: M,
    pub fibers: F,
    pub purkinje: P,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub layout: DataLayout,
    pub manifest: RunManifest,
    /// Stages skipped because their artifacts already existed (`resume`).
    pub skipped: Vec<Stage>,
    /// LV tree, then RV tree.
    pub trees: [PurkinjeTree; 2],
}

/// Run every stage for `cfg`.
///
/// `config_sha256` is the digest of the config file the run was loaded from,
/// recorded in the manifest when present.
#[instrument(skip_all, fields(root = %cfg.output.root.display(), mode = ?cfg.output.mode))]
pub fn run_pipeline<M, F, P>(
    cfg: &PipelineConfig,
    config_sha256: Option<String>,
    stages: &Stages<M, F, P>,
) -> Result<PipelineOutcome, PipelineError>
where
    M: MeshBuilder,
    F: FiberGenerator,
    P: PurkinjeGenerator,
{
    cfg.validate().map_err(PipelineError::invalid)?;
    for ventricle in Ventricle::ALL {
        cfg.purkinje
            .tree(ventricle)
            .growth
            .validate()
            .map_err(|err| PipelineError::purkinje(ventricle, err))?;
    }

    let layout = DataLayout::new(&cfg.output.root);
    let resume = cfg.output.mode == OutputMode::Resume;
    prepare_output(&layout, cfg.output.mode).map_err(PipelineError::output)?;
    let mut skipped = Vec::new();

    let mesh = if resume && all_present(&layout.mesh_artifacts()) {
        info!("mesh exists, skipping mesh builder");
        skipped.push(Stage::Mesh);
        load_mesh(&layout).map_err(PipelineError::mesh)?
    } else {
        build_mesh(&stages.mesh, &cfg.geometry, &layout).map_err(PipelineError::mesh)?
    };
    write_markers(&layout, &mesh.registry).map_err(PipelineError::output)?;

    if let Some(name) = first_missing(&mesh.registry, &mesh.facet_tags(), &markers::REQUIRED) {
        warn!(marker = name, "required marker missing");
        return Err(PipelineError::MissingMarker {
            name: name.to_string(),
        });
    }
    if resume && all_present(&layout.fiber_artifacts()) {
        info!("fibers exist, skipping fiber generator");
        skipped.push(Stage::Fibers);
    } else {
        let markers = ldrb_markers(&mesh.registry).map_err(|name| PipelineError::MissingMarker {
            name: name.to_string(),
        })?;
        let request = FiberRequest::new(&layout, markers, &cfg.fibers);
        generate_fibers(&stages.fibers, &request, &layout).map_err(PipelineError::fibers)?;
    }

    let mut grow = |ventricle| {
        tree_stage(cfg, &stages.purkinje, &layout, &mesh, ventricle, resume, &mut skipped)
    };
    let lv = grow(Ventricle::Lv)?;
    let rv = grow(Ventricle::Rv)?;

    let manifest = build_manifest(&ManifestInputs {
        geometry: &cfg.geometry,
        fibers: &cfg.fibers,
        seed: cfg.purkinje.seed,
        max_seed_distance: cfg.purkinje.max_seed_distance,
        trees: [
            TreeRecord {
                ventricle: Ventricle::Lv,
                params: &cfg.purkinje.lv.growth,
                root: cfg.purkinje.lv.root,
                tree: &lv,
            },
            TreeRecord {
                ventricle: Ventricle::Rv,
                params: &cfg.purkinje.rv.growth,
                root: cfg.purkinje.rv.root,
                tree: &rv,
            },
        ],
        generator_version: GENERATOR_VERSION,
        created_at: Utc::now().to_rfc3339(),
        config_sha256,
    })
    .context("assemble info.json")
    .map_err(PipelineError::output)?;
    write_manifest(&layout, &manifest).map_err(PipelineError::output)?;
    info!(skipped = skipped.len(), "pipeline complete");

    Ok(PipelineOutcome {
        layout,
        manifest,
        skipped,
        trees: [lv, rv],
    })
}

fn tree_stage<P: PurkinjeGenerator>(
    cfg: &PipelineConfig,
    generator: &P,
    layout: &DataLayout,
    mesh: &Mesh,
    ventricle: Ventricle,
    resume: bool,
    skipped: &mut Vec<Stage>,
) -> Result<PurkinjeTree, PipelineError> {
    if resume && all_present(&layout.tree_artifacts(ventricle)) {
        info!(%ventricle, "tree exists, skipping growth");
        skipped.push(Stage::Purkinje(ventricle));
        return read_tree_files(layout, ventricle)
            .map_err(|err| PipelineError::purkinje(ventricle, err));
    }

    let tree_config = cfg.purkinje.tree(ventricle);
    let tree = generator
        .generate(&TreeRequest {
            ventricle,
            mesh,
            root: tree_config.root,
            params: &tree_config.growth,
            seed: cfg.purkinje.seed_for(ventricle),
            max_seed_distance: cfg.purkinje.max_seed_distance,
        })
        .and_then(|tree| {
            tree.validate().context("check tree structure")?;
            Ok(tree)
        })
        .map_err(|err| PipelineError::purkinje(ventricle, err))?;
    write_tree_files(layout, ventricle, &tree).map_err(PipelineError::output)?;
    Ok(tree)
}
