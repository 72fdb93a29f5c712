//! Idealized bi-ventricular geometry description.
//!
//! Each ventricle is a truncated ellipsoidal shell: an endocardial and an
//! epicardial ellipsoid sharing a center, with semi-axes `a` (long axis, x),
//! `b` (y) and `c` (z). `char_length` is the target mesh edge length.

use serde::{Deserialize, Serialize};

/// Smallest accepted mesh characteristic length.
pub const MIN_CHAR_LENGTH: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryParameters {
    pub char_length: f64,

    pub center_lv_x: f64,
    pub center_lv_y: f64,
    pub center_lv_z: f64,
    pub a_endo_lv: f64,
    pub b_endo_lv: f64,
    pub c_endo_lv: f64,
    pub a_epi_lv: f64,
    pub b_epi_lv: f64,
    pub c_epi_lv: f64,

    pub center_rv_x: f64,
    pub center_rv_y: f64,
    pub center_rv_z: f64,
    pub a_endo_rv: f64,
    pub b_endo_rv: f64,
    pub c_endo_rv: f64,
    pub a_epi_rv: f64,
    pub b_epi_rv: f64,
    pub c_epi_rv: f64,
}

impl Default for GeometryParameters {
    fn default() -> Self {
        Self {
            char_length: 0.2,
            center_lv_x: 0.0,
            center_lv_y: 0.2,
            center_lv_z: 0.0,
            a_endo_lv: 5.0,
            b_endo_lv: 2.2,
            c_endo_lv: 2.2,
            a_epi_lv: 6.0,
            b_epi_lv: 3.0,
            c_epi_lv: 3.0,
            center_rv_x: 0.0,
            center_rv_y: 1.0,
            center_rv_z: 0.0,
            a_endo_rv: 6.0,
            b_endo_rv: 2.5,
            c_endo_rv: 2.7,
            a_epi_rv: 8.0,
            b_epi_rv: 5.5,
            c_epi_rv: 4.0,
        }
    }
}

impl GeometryParameters {
    /// Every parameter with its name, in declaration order.
    ///
    /// The names double as the mesh tool's flag names (kebab-cased) and as
    /// the run manifest keys.
    pub fn fields(&self) -> [(&'static str, f64); 19] {
        [
            ("char_length", self.char_length),
            ("center_lv_x", self.center_lv_x),
            ("center_lv_y", self.center_lv_y),
            ("center_lv_z", self.center_lv_z),
            ("a_endo_lv", self.a_endo_lv),
            ("b_endo_lv", self.b_endo_lv),
            ("c_endo_lv", self.c_endo_lv),
            ("a_epi_lv", self.a_epi_lv),
            ("b_epi_lv", self.b_epi_lv),
            ("c_epi_lv", self.c_epi_lv),
            ("center_rv_x", self.center_rv_x),
            ("center_rv_y", self.center_rv_y),
            ("center_rv_z", self.center_rv_z),
            ("a_endo_rv", self.a_endo_rv),
            ("b_endo_rv", self.b_endo_rv),
            ("c_endo_rv", self.c_endo_rv),
            ("a_epi_rv", self.a_epi_rv),
            ("b_epi_rv", self.b_epi_rv),
            ("c_epi_rv", self.c_epi_rv),
        ]
    }

    fn endo_lv(&self) -> [f64; 3] {
        [self.a_endo_lv, self.b_endo_lv, self.c_endo_lv]
    }

    fn epi_lv(&self) -> [f64; 3] {
        [self.a_epi_lv, self.b_epi_lv, self.c_epi_lv]
    }

    fn endo_rv(&self) -> [f64; 3] {
        [self.a_endo_rv, self.b_endo_rv, self.c_endo_rv]
    }

    fn epi_rv(&self) -> [f64; 3] {
        [self.a_epi_rv, self.b_epi_rv, self.c_epi_rv]
    }

    /// Smallest endocardial semi-axis over both ventricles.
    pub fn min_endo_semi_axis(&self) -> f64 {
        self.endo_lv()
            .into_iter()
            .chain(self.endo_rv())
            .fold(f64::INFINITY, f64::min)
    }
}

/// Check geometry consistency, returning one message per violation.
///
/// - every value finite, every semi-axis `> 0`
/// - epicardium strictly outside endocardium on each axis of each ventricle
/// - RV epicardium not inside the LV epicardium on any axis
/// - `char_length` within `[MIN_CHAR_LENGTH, min endocardial semi-axis]`
pub fn validate_geometry(geometry: &GeometryParameters) -> Vec<String> {
    let mut errors = Vec::new();
    for (name, value) in geometry.fields() {
        if !value.is_finite() {
            errors.push(format!("{name} must be finite, got {value}"));
        }
    }
    if !errors.is_empty() {
        return errors;
    }

    for (name, value) in geometry.fields() {
        let is_semi_axis = name.contains("_endo_") || name.contains("_epi_");
        if is_semi_axis && value <= 0.0 {
            errors.push(format!("{name} must be > 0, got {value}"));
        }
    }

    const AXES: [char; 3] = ['a', 'b', 'c'];
    let shells = [
        ("lv", geometry.endo_lv(), geometry.epi_lv()),
        ("rv", geometry.endo_rv(), geometry.epi_rv()),
    ];
    for (ventricle, endo, epi) in shells {
        for ((axis, endo), epi) in AXES.iter().zip(endo).zip(epi) {
            if epi <= endo {
                errors.push(format!(
                    "{axis}_epi_{ventricle} ({epi}) must exceed {axis}_endo_{ventricle} ({endo})"
                ));
            }
        }
    }
    for ((axis, lv), rv) in AXES.iter().zip(geometry.epi_lv()).zip(geometry.epi_rv()) {
        if rv < lv {
            errors.push(format!(
                "{axis}_epi_rv ({rv}) must not be smaller than {axis}_epi_lv ({lv})"
            ));
        }
    }

    let max_char_length = geometry.min_endo_semi_axis();
    if geometry.char_length < MIN_CHAR_LENGTH || geometry.char_length > max_char_length {
        errors.push(format!(
            "char_length {} must lie within [{MIN_CHAR_LENGTH}, {max_char_length}]",
            geometry.char_length
        ));
    }
    errors
}
