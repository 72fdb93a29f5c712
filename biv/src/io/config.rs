//! Pipeline configuration (`biv.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use purkinje::FractalTreeParameters;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::fibers::{FiberParameters, validate_fibers};
use crate::core::geometry::{GeometryParameters, validate_geometry};
use crate::core::ventricle::Ventricle;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "biv.toml";

/// Pipeline configuration (TOML).
///
/// Every section and field is optional; missing values take the defaults of
/// the reference BiV model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub geometry: GeometryParameters,
    pub fibers: FiberParameters,
    pub purkinje: PurkinjeConfig,
    pub tools: ToolsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PurkinjeConfig {
    /// Seed of the LV tree; the RV tree uses `seed + 1`.
    pub seed: u64,
    /// Largest accepted distance between a configured root point and the
    /// surface vertex it snaps to.
    pub max_seed_distance: f64,
    pub lv: TreeConfig,
    pub rv: TreeConfig,
}

/// Root point and growth parameters of one ventricle's tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TreeConfig {
    /// Approximate root (His bundle attachment) point.
    pub root: [f64; 3],
    pub growth: FractalTreeParameters,
}

impl Default for PurkinjeConfig {
    fn default() -> Self {
        Self {
            seed: 1234,
            max_seed_distance: 1.0,
            lv: TreeConfig {
                root: [0.0, 2.34484, 0.19],
                growth: FractalTreeParameters {
                    init_length: 7.0,
                    generations: 12,
                    length: 0.5,
                    ..FractalTreeParameters::default()
                },
            },
            rv: TreeConfig {
                root: [0.0, 3.19, 0.19],
                growth: FractalTreeParameters {
                    init_length: 9.7,
                    generations: 15,
                    length: 0.5,
                    ..FractalTreeParameters::default()
                },
            },
        }
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            root: [0.0; 3],
            growth: FractalTreeParameters::default(),
        }
    }
}

impl PurkinjeConfig {
    pub fn tree(&self, ventricle: Ventricle) -> &TreeConfig {
        match ventricle {
            Ventricle::Lv => &self.lv,
            Ventricle::Rv => &self.rv,
        }
    }

    pub fn seed_for(&self, ventricle: Ventricle) -> u64 {
        self.seed.wrapping_add(ventricle.seed_offset())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Mesh tool; the data directory and one `--<field>` flag per geometry
    /// parameter are appended.
    pub mesh_command: Vec<String>,
    /// Fiber tool; receives its request as JSON on stdin.
    pub fiber_command: Vec<String>,
    /// Wall-clock budget of a single tool run, in seconds.
    pub timeout_secs: u64,
    /// Truncate captured tool stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            mesh_command: vec![
                "cardiac-geometries".to_string(),
                "create-biv-ellipsoid".to_string(),
            ],
            fiber_command: vec!["ldrb-fibers".to_string()],
            timeout_secs: 60 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

/// How an existing `data/` directory is treated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Refuse to write into a non-empty `data/`.
    #[default]
    Fresh,
    /// Overwrite existing artifacts.
    Overwrite,
    /// Skip every stage whose primary artifact already exists.
    Resume,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output root; artifacts go to `<root>/data`, tool logs to `<root>/logs`.
    pub root: PathBuf,
    pub mode: OutputMode,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            mode: OutputMode::Fresh,
        }
    }
}

impl PipelineConfig {
    /// Validate geometry, fiber angles, tool settings and seed snapping.
    ///
    /// Growth parameters are checked separately by the Purkinje stage so
    /// their failures are attributed to it.
    pub fn validate(&self) -> Result<()> {
        let mut errors = validate_geometry(&self.geometry);
        errors.extend(validate_fibers(&self.fibers));
        if !errors.is_empty() {
            return Err(anyhow!("invalid parameters:\n- {}", errors.join("\n- ")));
        }
        if !self.purkinje.max_seed_distance.is_finite() || self.purkinje.max_seed_distance <= 0.0 {
            return Err(anyhow!("purkinje.max_seed_distance must be > 0"));
        }
        for ventricle in Ventricle::ALL {
            if self.purkinje.tree(ventricle).root.iter().any(|v| !v.is_finite()) {
                return Err(anyhow!("purkinje.{ventricle}.root must be finite"));
            }
        }
        if self.tools.timeout_secs == 0 {
            return Err(anyhow!("tools.timeout_secs must be > 0"));
        }
        if self.tools.output_limit_bytes == 0 {
            return Err(anyhow!("tools.output_limit_bytes must be > 0"));
        }
        for (name, command) in [
            ("tools.mesh_command", &self.tools.mesh_command),
            ("tools.fiber_command", &self.tools.fiber_command),
        ] {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(anyhow!("{name} must be a non-empty array"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg = parse_layered(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Parse a config file as overrides of the defaults.
///
/// Tables merge key by key, so a file that sets only
/// `purkinje.rv.growth.generations` keeps every other RV default instead of
/// falling back to the generic growth defaults.
fn parse_layered(contents: &str) -> Result<PipelineConfig> {
    let overrides: toml::Table = toml::from_str(contents).context("parse toml")?;
    let mut merged =
        toml::Value::try_from(PipelineConfig::default()).context("serialize defaults")?;
    merge_toml(&mut merged, toml::Value::Table(overrides));
    merged.try_into().context("decode config")
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Hex SHA-256 digest of a file's bytes, `None` when the file does not exist.
pub fn file_sha256(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    Ok(Some(hex::encode(hasher.finalize())))
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.purkinje.lv.growth.generations, 12);
        assert_eq!(cfg.purkinje.rv.growth.init_length, 9.7);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("biv.toml");
        let mut cfg = PipelineConfig::default();
        cfg.fibers.alpha_endo_sept = Some(45.0);
        cfg.output.mode = OutputMode::Resume;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("biv.toml");
        fs::write(
            &path,
            "[geometry]\nchar_length = 0.5\n\n[purkinje]\nseed = 7\n\n[purkinje.rv.growth]\ngenerations = 3\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.geometry.char_length, 0.5);
        assert_eq!(cfg.geometry.a_endo_lv, 5.0);
        assert_eq!(cfg.purkinje.seed, 7);
        assert_eq!(cfg.purkinje.seed_for(Ventricle::Rv), 8);
        assert_eq!(cfg.purkinje.rv.growth.generations, 3);
        assert_eq!(cfg.purkinje.rv.growth.init_length, 9.7);
        assert_eq!(cfg.purkinje.rv.root, [0.0, 3.19, 0.19]);
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("biv.toml");
        fs::write(&path, "[geometry]\na_epi_lv = 4.0\n").expect("write");
        let err = load_config(&path).expect_err("invalid geometry");
        assert!(format!("{err:#}").contains("a_epi_lv (4) must exceed a_endo_lv (5)"));
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("biv.toml");
        fs::write(&path, "[output]\nmode = \"append\"\n").expect("write");
        let err = load_config(&path).expect_err("bad mode");
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn empty_tool_command_is_rejected() {
        let cfg = PipelineConfig {
            tools: ToolsConfig {
                fiber_command: Vec::new(),
                ..ToolsConfig::default()
            },
            ..PipelineConfig::default()
        };
        let err = cfg.validate().expect_err("empty command");
        assert!(err.to_string().contains("tools.fiber_command"));
    }

    #[test]
    fn digest_is_stable_hex() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("biv.toml");
        fs::write(&path, "").expect("write");
        assert_eq!(
            file_sha256(&path).expect("digest").as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert_eq!(file_sha256(&temp.path().join("none.toml")).expect("digest"), None);
    }
}
