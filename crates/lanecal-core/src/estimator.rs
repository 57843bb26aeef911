//! Conversion of a measured lane ratio and steering angle into corrective offsets.
//!
//! The lane ratio is a linear proxy for lateral displacement across the path,
//! so a ratio error scales by the path width into a distance in centimetres.
//! The right and left cameras see the lane boundary from opposite sides, which
//! flips the sign of the ratio error between them:
//!
//! - right: `offset = path_width * (target_ratio - ratio)`
//! - left:  `offset = path_width * (ratio - target_ratio)`
//!
//! The steering offset is `target_angle - angle` for every camera. Both values
//! are rounded to 2 decimals, which is the precision stored in the shared config.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::round_to;
use crate::types::{CameraRole, MeasurementSample};

/// Fixed points of the offset equation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorTargets {
    /// Lane ratio of a perfectly centred camera.
    pub target_ratio: f64,
    /// Steering angle (degrees) when driving straight.
    pub target_steering_angle: f64,
}

impl Default for EstimatorTargets {
    fn default() -> Self {
        Self {
            target_ratio: 0.5,
            target_steering_angle: 90.0,
        }
    }
}

/// Corrective offsets for one camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetEstimate {
    /// Lateral offset in centimetres; `None` for the front camera.
    pub ratio_offset: Option<f64>,
    /// Steering offset in degrees.
    pub steering_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum EstimateError {
    #[error("path width must be a positive finite number of centimetres (got {0})")]
    InvalidPathWidth(f64),
}

/// Estimate both offsets for `role` from one measurement.
pub fn estimate_offsets(
    role: CameraRole,
    sample: &MeasurementSample,
    path_width_cm: f64,
    targets: &EstimatorTargets,
) -> Result<OffsetEstimate, EstimateError> {
    Ok(OffsetEstimate {
        ratio_offset: ratio_offset(role, sample.ratio, path_width_cm, targets.target_ratio)?,
        steering_offset: steering_offset(sample.steering_angle, targets.target_steering_angle),
    })
}

/// Lateral offset for a side camera, `None` for the front camera.
pub fn ratio_offset(
    role: CameraRole,
    ratio: f64,
    path_width_cm: f64,
    target_ratio: f64,
) -> Result<Option<f64>, EstimateError> {
    if !(path_width_cm.is_finite() && path_width_cm > 0.0) {
        return Err(EstimateError::InvalidPathWidth(path_width_cm));
    }
    let offset = match role {
        CameraRole::Front => return Ok(None),
        CameraRole::Right => path_width_cm * (target_ratio - ratio),
        CameraRole::Left => path_width_cm * (ratio - target_ratio),
    };
    Ok(Some(round_to(offset, 2)))
}

/// Steering offset that brings `measured` onto `target`.
pub fn steering_offset(measured: f64, target: f64) -> f64 {
    round_to(target - measured, 2)
}
