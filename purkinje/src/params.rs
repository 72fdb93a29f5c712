//! Growth parameters for a fractal Purkinje tree.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::GrowthError;

/// Parameters controlling fractal tree growth.
///
/// Lengths are in mesh units, angles in radians. Missing fields take the
/// defaults below when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalTreeParameters {
    /// Length of the first branch, grown from the root along `initial_direction`.
    pub init_length: f64,
    /// Number of bifurcation generations grown after the fascicles.
    pub generations: u32,
    /// Mean length of a generated branch.
    pub length: f64,
    /// Standard deviation of the branch length. `sqrt(0.2) * length` when unset.
    pub length_std: Option<f64>,
    /// Lower clamp for a sampled branch length. `length / 10` when unset.
    pub min_length: Option<f64>,
    /// Half angle between the two children of a bifurcation.
    pub branch_angle: f64,
    /// Weight of the repulsion from existing branches.
    pub repulsion: f64,
    /// Approximate length of a single growth step.
    pub segment_length: f64,
    /// In-plane rotation of each fascicle relative to the first branch.
    pub fascicle_angles: Vec<f64>,
    /// Length of each fascicle, paired with `fascicle_angles`.
    pub fascicle_lengths: Vec<f64>,
    /// Direction of the first branch.
    pub initial_direction: [f64; 3],
    /// Number of nearest surface vertices tried when projecting a step.
    pub search_vertices: usize,
}

impl Default for FractalTreeParameters {
    fn default() -> Self {
        Self {
            init_length: 0.1,
            generations: 10,
            length: 0.1,
            length_std: None,
            min_length: None,
            branch_angle: 0.15,
            repulsion: 0.1,
            segment_length: 0.01,
            fascicle_angles: vec![-1.5, 0.2],
            fascicle_lengths: vec![0.5, 0.5],
            initial_direction: [1.0, 0.0, 0.0],
            search_vertices: 1,
        }
    }
}

impl FractalTreeParameters {
    pub fn effective_length_std(&self) -> f64 {
        self.length_std.unwrap_or_else(|| 0.2_f64.sqrt() * self.length)
    }

    pub fn effective_min_length(&self) -> f64 {
        self.min_length.unwrap_or(self.length / 10.0)
    }

    pub fn direction(&self) -> DVec3 {
        DVec3::from_array(self.initial_direction).normalize_or_zero()
    }

    /// Number of growth steps used for a branch of nominal length `length`.
    pub(crate) fn segments_for(&self, length: f64) -> usize {
        (length / self.segment_length) as usize
    }

    pub fn validate(&self) -> Result<(), GrowthError> {
        let positive = [
            ("init_length", self.init_length),
            ("length", self.length),
            ("segment_length", self.segment_length),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{name} must be > 0, got {value}")));
            }
        }
        if self.generations == 0 {
            return Err(invalid("generations must be > 0"));
        }
        if self.segment_length >= self.length || self.segment_length >= self.init_length {
            return Err(invalid(format!(
                "segment_length {} must be smaller than length {} and init_length {}",
                self.segment_length, self.length, self.init_length
            )));
        }
        let length_std = self.effective_length_std();
        if !length_std.is_finite() || length_std < 0.0 {
            return Err(invalid(format!("length_std must be >= 0, got {length_std}")));
        }
        let min_length = self.effective_min_length();
        if !min_length.is_finite() || min_length <= 0.0 {
            return Err(invalid(format!("min_length must be > 0, got {min_length}")));
        }
        if !self.branch_angle.is_finite() || !self.repulsion.is_finite() || self.repulsion < 0.0 {
            return Err(invalid("branch_angle must be finite and repulsion >= 0"));
        }
        if self.fascicle_angles.len() != self.fascicle_lengths.len() {
            return Err(invalid(format!(
                "fascicle_angles has {} entries but fascicle_lengths has {}",
                self.fascicle_angles.len(),
                self.fascicle_lengths.len()
            )));
        }
        for (index, fascicle_length) in self.fascicle_lengths.iter().enumerate() {
            if !fascicle_length.is_finite() || *fascicle_length <= self.segment_length {
                return Err(invalid(format!(
                    "fascicle_lengths[{index}] must exceed segment_length, got {fascicle_length}"
                )));
            }
        }
        if self.fascicle_angles.iter().any(|angle| !angle.is_finite()) {
            return Err(invalid("fascicle_angles must be finite"));
        }
        if self.direction() == DVec3::ZERO || !self.direction().is_finite() {
            return Err(invalid("initial_direction must be a non-zero vector"));
        }
        if self.search_vertices == 0 {
            return Err(invalid("search_vertices must be > 0"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> GrowthError {
    GrowthError::InvalidParameter(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        FractalTreeParameters::default()
            .validate()
            .expect("defaults validate");
    }

    #[test]
    fn derived_lengths_follow_length() {
        let params = FractalTreeParameters {
            length: 0.5,
            ..FractalTreeParameters::default()
        };
        assert!((params.effective_length_std() - 0.2_f64.sqrt() * 0.5).abs() < 1e-12);
        assert!((params.effective_min_length() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn rejects_zero_generations() {
        let params = FractalTreeParameters {
            generations: 0,
            ..FractalTreeParameters::default()
        };
        let err = params.validate().expect_err("zero generations");
        assert!(err.to_string().contains("generations"));
    }

    #[test]
    fn rejects_zero_length() {
        let params = FractalTreeParameters {
            length: 0.0,
            ..FractalTreeParameters::default()
        };
        let err = params.validate().expect_err("zero length");
        assert!(err.to_string().contains("length"));
    }

    #[test]
    fn rejects_mismatched_fascicles() {
        let params = FractalTreeParameters {
            fascicle_lengths: vec![0.5],
            ..FractalTreeParameters::default()
        };
        let err = params.validate().expect_err("mismatched fascicles");
        assert!(err.to_string().contains("fascicle"));
    }

    #[test]
    fn rejects_zero_direction() {
        let params = FractalTreeParameters {
            initial_direction: [0.0, 0.0, 0.0],
            ..FractalTreeParameters::default()
        };
        params.validate().expect_err("zero direction");
    }
}
