//! Anatomical marker registry.
//!
//! The mesh tool labels boundary facets with integer physical tags and names
//! them (`BASE`, `ENDO_LV`, ...). The registry keeps `name -> (tag, dim)`;
//! `markers.json` persists the flat `name -> tag` view.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub const BASE: &str = "BASE";
pub const ENDO_LV: &str = "ENDO_LV";
pub const ENDO_RV: &str = "ENDO_RV";
pub const EPI: &str = "EPI";

/// Markers the fiber rule needs, in the order they are checked.
pub const REQUIRED: [&str; 4] = [BASE, ENDO_LV, ENDO_RV, EPI];

/// Dimension of facet (surface triangle) markers.
pub const FACET_DIM: u8 = 2;

/// A named physical group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub tag: i32,
    pub dim: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerRegistry {
    markers: BTreeMap<String, Marker>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, replacing any previous entry with that name.
    pub fn insert(&mut self, name: impl Into<String>, tag: i32, dim: u8) {
        self.markers.insert(name.into(), Marker { tag, dim });
    }

    pub fn get(&self, name: &str) -> Option<Marker> {
        self.markers.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Marker)> + '_ {
        self.markers.iter().map(|(name, marker)| (name.as_str(), *marker))
    }

    /// Name of the marker with this tag and dimension.
    pub fn name_of(&self, tag: i32, dim: u8) -> Option<&str> {
        self.iter()
            .find(|(_, marker)| marker.tag == tag && marker.dim == dim)
            .map(|(name, _)| name)
    }

    /// The flat `name -> tag` map persisted as `markers.json`.
    pub fn tag_map(&self) -> BTreeMap<String, i32> {
        self.markers
            .iter()
            .map(|(name, marker)| (name.clone(), marker.tag))
            .collect()
    }

    /// Rebuild a registry from a persisted `name -> tag` map.
    ///
    /// The flat form drops dimensions; every entry is taken as a facet marker.
    pub fn from_tag_map(map: &BTreeMap<String, i32>) -> Self {
        let mut registry = Self::new();
        for (name, &tag) in map {
            registry.insert(name.clone(), tag, FACET_DIM);
        }
        registry
    }
}

/// First required marker that is unregistered or labels no facet.
pub fn first_missing<'a>(
    registry: &MarkerRegistry,
    facet_tags: &BTreeSet<i32>,
    required: &[&'a str],
) -> Option<&'a str> {
    required.iter().copied().find(|name| match registry.get(name) {
        Some(marker) => marker.dim != FACET_DIM || !facet_tags.contains(&marker.tag),
        None => true,
    })
}

/// Boundary marker map in the vocabulary of the fiber rule.
///
/// Fails with the name of the first missing required marker.
pub fn ldrb_markers(registry: &MarkerRegistry) -> Result<BTreeMap<String, i32>, &'static str> {
    let mut map = BTreeMap::new();
    for (key, name) in [("base", BASE), ("lv", ENDO_LV), ("rv", ENDO_RV), ("epi", EPI)] {
        let marker = registry.get(name).ok_or(name)?;
        map.insert(key.to_string(), marker.tag);
    }
    Ok(map)
}
