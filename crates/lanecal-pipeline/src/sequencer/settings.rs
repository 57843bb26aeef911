//! Tunable parameters of a calibration run.

use lanecal_core::{EstimatorTargets, Thresholds};
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Targets of the offset equation and the acceptance bands of both gates.
///
/// Every field has a default, so a settings file only needs to name what it
/// changes:
///
/// ```json
/// { "thresholds": { "csa_with_offset": { "min": 89.0, "max": 91.0 } } }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSettings {
    pub targets: EstimatorTargets,
    pub thresholds: Thresholds,
}

impl SequencerSettings {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let EstimatorTargets {
            target_ratio,
            target_steering_angle,
        } = self.targets;
        if !(0.0..=1.0).contains(&target_ratio) {
            return Err(CalibrationError::Configuration(format!(
                "target ratio must lie in [0, 1] (got {target_ratio})"
            )));
        }
        if !target_steering_angle.is_finite() {
            return Err(CalibrationError::Configuration(format!(
                "target steering angle must be finite (got {target_steering_angle})"
            )));
        }
        if let Some(band) = self.thresholds.invalid_band() {
            return Err(CalibrationError::Configuration(format!(
                "threshold band `{band}` must satisfy min <= max"
            )));
        }
        Ok(())
    }
}
