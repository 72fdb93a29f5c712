//! `biv validate`: re-check an existing output directory.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, instrument};

use crate::core::geometry::validate_geometry;
use crate::core::markers::REQUIRED;
use crate::core::ventricle::Ventricle;
use crate::io::layout::{DataLayout, file_name};
use crate::io::mesh_builder::load_mesh;
use crate::io::output::{read_manifest, read_markers, read_tree_files};

/// Summary of a valid output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutcome {
    pub files: usize,
    pub markers: usize,
    /// Node counts of the LV and RV trees.
    pub tree_nodes: [usize; 2],
}

/// Validate `<root>/data`: every artifact present, markers consistent with
/// the mesh, both trees structurally sound and a flat manifest whose
/// geometry is valid.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn validate_output(root: &Path) -> Result<ValidateOutcome> {
    let layout = DataLayout::new(root);
    if !layout.data_dir.is_dir() {
        bail!("missing data directory {}", layout.data_dir.display());
    }
    let missing = layout.missing_files();
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(|path| file_name(path)).collect();
        bail!("missing artifacts: {}", names.join(", "));
    }

    let markers = read_markers(&layout).context("load markers.json")?;
    let mesh = load_mesh(&layout).context("load biv_ellipsoid.msh")?;
    if markers != mesh.registry.tag_map() {
        bail!("markers.json does not match the physical names of the mesh");
    }
    if let Some(name) = REQUIRED.iter().find(|name| !markers.contains_key(**name)) {
        bail!("markers.json lacks {name}");
    }

    let mut tree_nodes = [0usize; 2];
    for (slot, ventricle) in tree_nodes.iter_mut().zip(Ventricle::ALL) {
        let tree = read_tree_files(&layout, ventricle)?;
        if tree.xyz.len() < 2 {
            bail!("{ventricle} tree has no segments");
        }
        *slot = tree.xyz.len();
    }

    let manifest = read_manifest(&layout).context("load info.json")?;
    let geometry = manifest.geometry().map_err(|err| anyhow!("info.json: {err}"))?;
    let errors = validate_geometry(&geometry);
    if !errors.is_empty() {
        bail!("info.json geometry is invalid:\n- {}", errors.join("\n- "));
    }
    debug!(entries = manifest.len(), "manifest checked");

    Ok(ValidateOutcome {
        files: layout.expected_files().len(),
        markers: markers.len(),
        tree_nodes,
    })
}
