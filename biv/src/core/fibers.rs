//! Rule-based (LDRB) fiber angle parameters.

use serde::{Deserialize, Serialize};

/// Helix (`alpha`) and transverse (`beta`) angles in degrees.
///
/// RV and septum angles are optional; the fiber tool falls back to the LV
/// angles for any that are unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiberParameters {
    pub alpha_endo_lv: f64,
    pub alpha_epi_lv: f64,
    pub beta_endo_lv: f64,
    pub beta_epi_lv: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_endo_rv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_epi_rv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta_endo_rv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta_epi_rv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_endo_sept: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_epi_sept: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta_endo_sept: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta_epi_sept: Option<f64>,
    /// Function space of the fiber fields, `<family>_<degree>` (e.g. `P_1`).
    pub fiber_space: String,
}

impl Default for FiberParameters {
    fn default() -> Self {
        Self {
            alpha_endo_lv: 60.0,
            alpha_epi_lv: -60.0,
            beta_endo_lv: 0.0,
            beta_epi_lv: 0.0,
            alpha_endo_rv: None,
            alpha_epi_rv: None,
            beta_endo_rv: None,
            beta_epi_rv: None,
            alpha_endo_sept: None,
            alpha_epi_sept: None,
            beta_endo_sept: None,
            beta_epi_sept: None,
            fiber_space: "P_1".to_string(),
        }
    }
}

impl FiberParameters {
    /// Every angle that is set, with its name.
    pub fn angles(&self) -> Vec<(&'static str, f64)> {
        let optional = [
            ("alpha_endo_rv", self.alpha_endo_rv),
            ("alpha_epi_rv", self.alpha_epi_rv),
            ("beta_endo_rv", self.beta_endo_rv),
            ("beta_epi_rv", self.beta_epi_rv),
            ("alpha_endo_sept", self.alpha_endo_sept),
            ("alpha_epi_sept", self.alpha_epi_sept),
            ("beta_endo_sept", self.beta_endo_sept),
            ("beta_epi_sept", self.beta_epi_sept),
        ];
        let mut angles = vec![
            ("alpha_endo_lv", self.alpha_endo_lv),
            ("alpha_epi_lv", self.alpha_epi_lv),
            ("beta_endo_lv", self.beta_endo_lv),
            ("beta_epi_lv", self.beta_epi_lv),
        ];
        angles.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|value| (name, value))),
        );
        angles
    }
}

/// Check angle ranges and the fiber space, returning one message per violation.
pub fn validate_fibers(fibers: &FiberParameters) -> Vec<String> {
    let mut errors = Vec::new();
    for (name, angle) in fibers.angles() {
        if !angle.is_finite() || !(-90.0..=90.0).contains(&angle) {
            errors.push(format!("{name} must lie within [-90, 90] degrees, got {angle}"));
        }
    }
    if !is_function_space(&fibers.fiber_space) {
        errors.push(format!(
            "fiber_space must look like <family>_<degree> (e.g. P_1), got {:?}",
            fibers.fiber_space
        ));
    }
    errors
}

fn is_function_space(space: &str) -> bool {
    let Some((family, degree)) = space.split_once('_') else {
        return false;
    };
    !family.is_empty()
        && family.chars().all(|ch| ch.is_ascii_alphabetic())
        && degree.parse::<u32>().is_ok()
}
