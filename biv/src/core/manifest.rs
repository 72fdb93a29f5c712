//! Run manifest (`info.json`): every input and derived generation parameter
//! of a run as one flat `key -> scalar` object.
//!
//! Keys:
//! - geometry fields under their own names (`a_endo_lv`, ...)
//! - fiber angles and `fiber_space`
//! - growth parameters prefixed `lv_` / `rv_`, lists expanded to `_0`, `_1`, ...
//! - `purkinje_seed`, `max_seed_distance`, per-tree node counts and root
//! - provenance: `generator_version`, `created_at`, `config_sha256`

use std::collections::BTreeMap;

use purkinje::{FractalTreeParameters, PurkinjeTree};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::fibers::FiberParameters;
use crate::core::geometry::GeometryParameters;
use crate::core::ventricle::Ventricle;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunManifest {
    entries: BTreeMap<String, Value>,
}

/// Growth inputs and result of one ventricle's tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeRecord<'a> {
    pub ventricle: Ventricle,
    pub params: &'a FractalTreeParameters,
    /// Configured approximate root point.
    pub root: [f64; 3],
    pub tree: &'a PurkinjeTree,
}

/// Everything recorded in a manifest.
#[derive(Debug, Clone)]
pub struct ManifestInputs<'a> {
    pub geometry: &'a GeometryParameters,
    pub fibers: &'a FiberParameters,
    pub seed: u64,
    pub max_seed_distance: f64,
    pub trees: [TreeRecord<'a>; 2],
    pub generator_version: &'a str,
    pub created_at: String,
    pub config_sha256: Option<String>,
}

impl RunManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(Value::as_f64)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert `value` flattened under `prefix`.
    ///
    /// Objects append `_<field>`, arrays append `_<index>`, nulls are skipped.
    pub fn insert_flattened(&mut self, prefix: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::Object(fields) => {
                for (field, value) in fields {
                    self.insert_flattened(&join_key(prefix, field), value);
                }
            }
            Value::Array(items) => {
                for (index, value) in items.iter().enumerate() {
                    self.insert_flattened(&join_key(prefix, &index.to_string()), value);
                }
            }
            scalar => self.insert(prefix, scalar.clone()),
        }
    }

    /// Keys whose values are not strings, numbers or booleans.
    pub fn nested_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, value)| value.is_object() || value.is_array() || value.is_null())
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Recover the geometry recorded in the manifest.
    pub fn geometry(&self) -> Result<GeometryParameters, String> {
        let mut fields = Map::new();
        let mut missing = Vec::new();
        for (name, _) in GeometryParameters::default().fields() {
            match self.entries.get(name) {
                Some(value) if value.is_number() => {
                    fields.insert(name.to_string(), value.clone());
                }
                _ => missing.push(name),
            }
        }
        if !missing.is_empty() {
            return Err(format!(
                "manifest lacks numeric geometry fields: {}",
                missing.join(", ")
            ));
        }
        serde_json::from_value(Value::Object(fields)).map_err(|err| err.to_string())
    }
}

fn join_key(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}_{field}")
    }
}

/// Assemble the manifest of a completed run.
pub fn build_manifest(inputs: &ManifestInputs<'_>) -> Result<RunManifest, serde_json::Error> {
    let mut manifest = RunManifest::new();
    for (name, value) in inputs.geometry.fields() {
        manifest.insert(name, value);
    }
    for (name, value) in inputs.fibers.angles() {
        manifest.insert(name, value);
    }
    manifest.insert("fiber_space", inputs.fibers.fiber_space.clone());

    manifest.insert("purkinje_seed", inputs.seed);
    manifest.insert("max_seed_distance", inputs.max_seed_distance);
    for record in &inputs.trees {
        let prefix = record.ventricle.prefix();
        manifest.insert(
            format!("{prefix}_seed"),
            inputs.seed.wrapping_add(record.ventricle.seed_offset()),
        );
        let params = serde_json::to_value(record.params)?;
        manifest.insert_flattened(prefix, &params);
        manifest.insert(
            format!("{prefix}_length_std"),
            record.params.effective_length_std(),
        );
        manifest.insert(
            format!("{prefix}_min_length"),
            record.params.effective_min_length(),
        );
        for (axis, value) in record.root.iter().enumerate() {
            manifest.insert(format!("{prefix}_root_{axis}"), *value);
        }
        if let Some(root) = record.tree.xyz.first() {
            for (axis, value) in root.iter().enumerate() {
                manifest.insert(format!("{prefix}_tree_root_{axis}"), *value);
            }
        }
        manifest.insert(format!("{prefix}_nodes"), record.tree.xyz.len());
        manifest.insert(format!("{prefix}_endnodes"), record.tree.endnodes.len());
    }

    manifest.insert("generator_version", inputs.generator_version);
    manifest.insert("created_at", inputs.created_at.clone());
    if let Some(digest) = &inputs.config_sha256 {
        manifest.insert("config_sha256", digest.clone());
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> PurkinjeTree {
        PurkinjeTree::from_edges(vec![[0.0, 2.4, 0.19], [0.1, 2.4, 0.19]], vec![[0, 1]])
    }

    fn manifest() -> RunManifest {
        let geometry = GeometryParameters::default();
        let fibers = FiberParameters::default();
        let params = FractalTreeParameters::default();
        let tree = tree();
        build_manifest(&ManifestInputs {
            geometry: &geometry,
            fibers: &fibers,
            seed: 1234,
            max_seed_distance: 1.0,
            trees: [
                TreeRecord {
                    ventricle: Ventricle::Lv,
                    params: &params,
                    root: [0.0, 2.34484, 0.19],
                    tree: &tree,
                },
                TreeRecord {
                    ventricle: Ventricle::Rv,
                    params: &params,
                    root: [0.0, 3.19, 0.19],
                    tree: &tree,
                },
            ],
            generator_version: "0.1.0",
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            config_sha256: None,
        })
        .expect("manifest")
    }

    #[test]
    fn manifest_is_flat_and_records_geometry() {
        let manifest = manifest();
        assert!(manifest.nested_keys().is_empty());
        assert_eq!(manifest.geometry().expect("geometry"), GeometryParameters::default());
        assert_eq!(manifest.get_f64("a_endo_lv"), Some(5.0));
        assert_eq!(manifest.get("fiber_space"), Some(&json!("P_1")));
        assert!(manifest.get("config_sha256").is_none());
    }

    #[test]
    fn growth_parameters_are_prefixed_and_expanded() {
        let manifest = manifest();
        assert_eq!(manifest.get_f64("lv_fascicle_angles_0"), Some(-1.5));
        assert_eq!(manifest.get_f64("rv_fascicle_angles_1"), Some(0.2));
        assert_eq!(manifest.get_f64("lv_initial_direction_0"), Some(1.0));
        assert_eq!(manifest.get_f64("rv_root_1"), Some(3.19));
        assert_eq!(manifest.get("lv_seed"), Some(&json!(1234)));
        assert_eq!(manifest.get("rv_seed"), Some(&json!(1235)));
        assert_eq!(manifest.get("lv_nodes"), Some(&json!(2)));
        let std = manifest.get_f64("lv_length_std").expect("length std");
        assert!((std - 0.2_f64.sqrt() * 0.1).abs() < 1e-12);
    }

    #[test]
    fn every_growth_parameter_is_recorded_per_tree() {
        let manifest = manifest();
        let params = serde_json::to_value(FractalTreeParameters::default()).expect("params");
        let Value::Object(fields) = params else {
            panic!("growth parameters serialize to an object");
        };
        for (name, value) in fields.iter().filter(|(_, value)| !value.is_null()) {
            for prefix in ["lv", "rv"] {
                let key = if value.is_array() {
                    format!("{prefix}_{name}_0")
                } else {
                    format!("{prefix}_{name}")
                };
                assert!(manifest.get(&key).is_some(), "{key} missing");
            }
        }
    }

    #[test]
    fn geometry_readback_reports_missing_fields() {
        let mut manifest = RunManifest::new();
        manifest.insert("char_length", 0.2);
        let err = manifest.geometry().expect_err("incomplete");
        assert!(err.contains("center_lv_x"));
    }

    #[test]
    fn flattening_skips_nulls_and_nests_keys() {
        let mut manifest = RunManifest::new();
        manifest.insert_flattened("x", &json!({"a": [1, {"b": 2}], "c": null}));
        assert_eq!(manifest.get("x_a_0"), Some(&json!(1)));
        assert_eq!(manifest.get("x_a_1_b"), Some(&json!(2)));
        assert_eq!(manifest.len(), 2);
    }
}
