//! Fixed on-disk layout of a run.
//!
//! ```text
//! <root>/
//!   data/   the artifacts downstream tooling reads
//!   logs/   stdout/stderr of the external tools
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use purkinje::export::TreeFiles;

use crate::core::ventricle::Ventricle;

/// Raw mesh builder output.
pub const MESH_MSH: &str = "biv_ellipsoid.msh";
/// Mesh-derived fields written by the mesh builder as `<name>.h5` + `<name>.xdmf`.
pub const MESH_FIELDS: [&str; 3] = ["mesh", "ffun", "triangle_mesh"];
/// Fields written by the fiber generator as `<name>.h5` + `<name>.xdmf`.
pub const FIBER_FIELDS: [&str; 3] = ["fiber", "sheet", "sheet_normal"];
pub const MARKERS_JSON: &str = "markers.json";
pub const INFO_JSON: &str = "info.json";

/// Number of files in a complete `data/` directory.
pub const EXPECTED_FILE_COUNT: usize = 23;

/// Canonical paths below an output root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_dir: root.join("data"),
            logs_dir: root.join("logs"),
            root,
        }
    }

    pub fn data(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn mesh_msh(&self) -> PathBuf {
        self.data(MESH_MSH)
    }

    pub fn markers_json(&self) -> PathBuf {
        self.data(MARKERS_JSON)
    }

    pub fn info_json(&self) -> PathBuf {
        self.data(INFO_JSON)
    }

    /// `<name>.h5` and `<name>.xdmf` in `data/`.
    pub fn field_pair(&self, name: &str) -> [PathBuf; 2] {
        [
            self.data(&format!("{name}.h5")),
            self.data(&format!("{name}.xdmf")),
        ]
    }

    /// Artifacts the mesh builder must leave behind.
    pub fn mesh_artifacts(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.mesh_msh()];
        paths.extend(MESH_FIELDS.iter().flat_map(|name| self.field_pair(name)));
        paths
    }

    /// Artifacts the fiber generator must leave behind.
    pub fn fiber_artifacts(&self) -> Vec<PathBuf> {
        FIBER_FIELDS
            .iter()
            .flat_map(|name| self.field_pair(name))
            .collect()
    }

    pub fn tree_files(&self, ventricle: Ventricle) -> TreeFiles {
        TreeFiles::new(&self.data_dir, ventricle.tree_stem())
    }

    /// The four files of one ventricle's tree.
    pub fn tree_artifacts(&self, ventricle: Ventricle) -> Vec<PathBuf> {
        let files = self.tree_files(ventricle);
        files.all().iter().map(|path| path.to_path_buf()).collect()
    }

    /// Log file of an external tool run.
    pub fn log(&self, label: &str) -> PathBuf {
        self.logs_dir.join(format!("{label}.log"))
    }

    /// Every file of a complete run, in stage order.
    pub fn expected_files(&self) -> Vec<PathBuf> {
        let mut paths = self.mesh_artifacts();
        paths.push(self.markers_json());
        paths.extend(self.fiber_artifacts());
        for ventricle in Ventricle::ALL {
            paths.extend(self.tree_artifacts(ventricle));
        }
        paths.push(self.info_json());
        paths
    }

    /// Expected files that do not exist.
    pub fn missing_files(&self) -> Vec<PathBuf> {
        self.expected_files()
            .into_iter()
            .filter(|path| !path.is_file())
            .collect()
    }
}

/// Whether every path is an existing file.
pub fn all_present(paths: &[PathBuf]) -> bool {
    paths.iter().all(|path| path.is_file())
}

/// Fail unless every path exists, naming the missing ones.
pub fn ensure_present(paths: &[PathBuf], producer: &str) -> Result<()> {
    let missing: Vec<String> = paths
        .iter()
        .filter(|path| !path.is_file())
        .map(|path| file_name(path))
        .collect();
    if !missing.is_empty() {
        bail!("{producer} did not write {}", missing.join(", "));
    }
    Ok(())
}

/// File name of `path` for messages.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
