//! The two ventricles and the names derived from them.

use std::fmt;

use crate::core::markers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ventricle {
    Lv,
    Rv,
}

impl Ventricle {
    pub const ALL: [Ventricle; 2] = [Ventricle::Lv, Ventricle::Rv];

    /// Lowercase prefix used in file names and manifest keys.
    pub fn prefix(self) -> &'static str {
        match self {
            Ventricle::Lv => "lv",
            Ventricle::Rv => "rv",
        }
    }

    /// Stem of the tree files, e.g. `lv_tree`.
    pub fn tree_stem(self) -> &'static str {
        match self {
            Ventricle::Lv => "lv_tree",
            Ventricle::Rv => "rv_tree",
        }
    }

    /// Facet marker of this ventricle's endocardium.
    pub fn endo_marker(self) -> &'static str {
        match self {
            Ventricle::Lv => markers::ENDO_LV,
            Ventricle::Rv => markers::ENDO_RV,
        }
    }

    /// Offset added to the configured seed so the two trees draw independent streams.
    pub fn seed_offset(self) -> u64 {
        match self {
            Ventricle::Lv => 0,
            Ventricle::Rv => 1,
        }
    }
}

impl fmt::Display for Ventricle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}
