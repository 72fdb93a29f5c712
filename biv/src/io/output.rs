//! Output directory preparation and the JSON / tree artifacts written by the
//! pipeline itself.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use purkinje::PurkinjeTree;
use purkinje::export::{TreeFiles, read_tree, write_tree};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::core::manifest::RunManifest;
use crate::core::markers::MarkerRegistry;
use crate::core::ventricle::Ventricle;
use crate::io::config::OutputMode;
use crate::io::layout::DataLayout;

const WRITE_PROBE: &str = ".biv-write-probe";

/// Create `data/` and `logs/` and check that `data/` may be written in `mode`.
///
/// `fresh` refuses a non-empty `data/`; the other modes accept it.
#[instrument(skip_all, fields(root = %layout.root.display(), mode = ?mode))]
pub fn prepare_output(layout: &DataLayout, mode: OutputMode) -> Result<()> {
    if layout.data_dir.exists() && !layout.data_dir.is_dir() {
        bail!("{} exists and is not a directory", layout.data_dir.display());
    }
    if mode == OutputMode::Fresh && layout.data_dir.is_dir() {
        let mut entries = fs::read_dir(&layout.data_dir)
            .with_context(|| format!("read {}", layout.data_dir.display()))?;
        if entries.next().is_some() {
            bail!(
                "{} is not empty (use --force to overwrite or --resume to continue)",
                layout.data_dir.display()
            );
        }
    }
    for dir in [&layout.data_dir, &layout.logs_dir] {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }

    let probe = layout.data(WRITE_PROBE);
    fs::write(&probe, b"")
        .with_context(|| format!("{} is not writable", layout.data_dir.display()))?;
    fs::remove_file(&probe).with_context(|| format!("remove {}", probe.display()))?;
    debug!("output directory ready");
    Ok(())
}

/// Serialize `value` to pretty-printed JSON with trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Write `markers.json` (`name -> tag`).
pub fn write_markers(layout: &DataLayout, registry: &MarkerRegistry) -> Result<()> {
    write_json(&layout.markers_json(), &registry.tag_map())
}

pub fn read_markers(layout: &DataLayout) -> Result<BTreeMap<String, i32>> {
    read_json(&layout.markers_json())
}

/// Write `info.json`.
pub fn write_manifest(layout: &DataLayout, manifest: &RunManifest) -> Result<()> {
    write_json(&layout.info_json(), manifest)?;
    info!(entries = manifest.len(), "manifest written");
    Ok(())
}

/// Read `info.json`, rejecting nested values.
pub fn read_manifest(layout: &DataLayout) -> Result<RunManifest> {
    let manifest: RunManifest = read_json(&layout.info_json())?;
    let nested = manifest.nested_keys();
    if !nested.is_empty() {
        return Err(anyhow!(
            "{} has non-scalar values for: {}",
            layout.info_json().display(),
            nested.join(", ")
        ));
    }
    Ok(manifest)
}

pub fn write_tree_files(
    layout: &DataLayout,
    ventricle: Ventricle,
    tree: &PurkinjeTree,
) -> Result<TreeFiles> {
    let files = write_tree(&layout.data_dir, ventricle.tree_stem(), tree)
        .with_context(|| format!("write {ventricle} tree"))?;
    debug!(vtu = %files.vtu.display(), "tree files written");
    Ok(files)
}

/// Read a stored tree and check its structure.
pub fn read_tree_files(layout: &DataLayout, ventricle: Ventricle) -> Result<PurkinjeTree> {
    let tree = read_tree(&layout.data_dir, ventricle.tree_stem())
        .with_context(|| format!("read {ventricle} tree"))?;
    tree.validate()
        .with_context(|| format!("check {ventricle} tree"))?;
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_mode_creates_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = DataLayout::new(temp.path().join("run"));
        prepare_output(&layout, OutputMode::Fresh).expect("prepare");
        assert!(layout.data_dir.is_dir());
        assert!(layout.logs_dir.is_dir());
        assert_eq!(fs::read_dir(&layout.data_dir).expect("read").count(), 0);
    }

    #[test]
    fn fresh_mode_rejects_existing_artifacts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = DataLayout::new(temp.path());
        fs::create_dir_all(&layout.data_dir).expect("data dir");
        fs::write(layout.mesh_msh(), "old").expect("old mesh");

        let err = prepare_output(&layout, OutputMode::Fresh).expect_err("non-empty");
        assert!(err.to_string().contains("is not empty"));
        prepare_output(&layout, OutputMode::Overwrite).expect("overwrite");
        prepare_output(&layout, OutputMode::Resume).expect("resume");
    }

    #[test]
    fn data_path_that_is_a_file_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = DataLayout::new(temp.path());
        fs::write(&layout.data_dir, "not a dir").expect("file");
        let err = prepare_output(&layout, OutputMode::Overwrite).expect_err("file");
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn markers_round_trip_byte_for_byte() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = DataLayout::new(temp.path());
        fs::create_dir_all(&layout.data_dir).expect("data dir");
        let mut registry = MarkerRegistry::new();
        registry.insert("EPI", 40, 2);
        registry.insert("BASE", 10, 2);
        write_markers(&layout, &registry).expect("write");
        let first = fs::read_to_string(layout.markers_json()).expect("read");
        assert_eq!(first, "{\n  \"BASE\": 10,\n  \"EPI\": 40\n}\n");

        let map = read_markers(&layout).expect("parse");
        write_markers(&layout, &MarkerRegistry::from_tag_map(&map)).expect("rewrite");
        assert_eq!(fs::read_to_string(layout.markers_json()).expect("reread"), first);
    }

    #[test]
    fn manifest_round_trips_and_rejects_nesting() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = DataLayout::new(temp.path());
        fs::create_dir_all(&layout.data_dir).expect("data dir");
        let mut manifest = RunManifest::new();
        manifest.insert("a_endo_lv", 5.0);
        manifest.insert("fiber_space", "P_1");
        write_manifest(&layout, &manifest).expect("write");
        let first = fs::read_to_string(layout.info_json()).expect("read");
        write_manifest(&layout, &read_manifest(&layout).expect("parse")).expect("rewrite");
        assert_eq!(fs::read_to_string(layout.info_json()).expect("reread"), first);

        write_json(&layout.info_json(), &json!({"lv": {"length": 0.5}})).expect("nested");
        let err = read_manifest(&layout).expect_err("nested manifest");
        assert!(err.to_string().contains("lv"));
    }

    #[test]
    fn broken_tree_files_fail_validation() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = DataLayout::new(temp.path());
        fs::create_dir_all(&layout.data_dir).expect("data dir");
        let tree = PurkinjeTree::from_edges(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            vec![[0, 1], [1, 2]],
        );
        write_tree_files(&layout, Ventricle::Lv, &tree).expect("write");
        assert_eq!(read_tree_files(&layout, Ventricle::Lv).expect("read"), tree);

        let files = layout.tree_files(Ventricle::Lv);
        fs::write(&files.endnodes, "1\n").expect("corrupt");
        let err = read_tree_files(&layout, Ventricle::Lv).expect_err("bad endnodes");
        assert!(format!("{err:#}").contains("check lv tree"));
    }
}
