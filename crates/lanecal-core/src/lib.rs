//! Pure building blocks for three-camera lane-offset calibration.
//!
//! Nothing in this crate touches a process, a camera or the shared config
//! file. It turns the text log of one offline vision run into a measurement,
//! a measurement into corrective offsets, and measurements into verdicts.
//!
//! # Modules
//!
//! - \[`types`\]: camera roles, measurement stages and per-role storage.
//! - \[`log_parser`\]: mean ratio / steering angle from a vision log.
//! - \[`estimator`\]: ratio and steering offsets from a measurement.
//! - \[`gate`\]: inclusive acceptance bands and directional instructions.
//! - \[`result_store`\]: write-once per-camera results and the result artifact.
//!
//! # Example
//!
//! ```
//! use lanecal_core::{CameraRole, EstimatorTargets, estimate_offsets, parse_log_str};
//!
//! let sample = parse_log_str("ratio=0.40;CSA=85.0\n").unwrap();
//! let est = estimate_offsets(CameraRole::Right, &sample, 60.0, &EstimatorTargets::default())
//!     .unwrap();
//! assert_eq!(est.ratio_offset, Some(6.0));
//! assert_eq!(est.steering_offset, 5.0);
//! ```

pub mod estimator;
pub mod gate;
pub mod log_parser;
/// Rounding and averaging helpers.
mod math;
pub mod result_store;
pub mod types;

pub use estimator::{EstimateError, EstimatorTargets, OffsetEstimate, estimate_offsets};
pub use gate::{
    Adjustment, Bounds, Instruction, MountingVerdict, OffsetVerdict, Thresholds, Verdict,
    Violation, evaluate, mounting_verdict, offset_verdict, violation,
};
pub use log_parser::{LogParseError, Metric, parse_log_file, parse_log_str};
pub use math::round_to;
pub use result_store::{
    CalibrationResultStore, CamResult, ResultArtifact, ResultField, RoleRecord,
};
pub use types::{CalibrationStage, CameraRole, MeasurementSample, PerRole};
