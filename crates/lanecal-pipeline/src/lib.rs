//! Calibration run for the three lane cameras of a ground robot.
//!
//! This crate owns everything with a side effect: the shared
//! `CameraStartUpJson` document, the offline vision executable, the camera id
//! mapping and the state machine that drives the three measurement passes.
//! The arithmetic lives in [`lanecal_core`].
//!
//! # Modules
//!
//! - \[`config`\]: typed view of the shared config with atomic persist.
//! - \[`runner`\]: the `VideoProcessingRunner` seam and its subprocess implementation.
//! - \[`progress`\]: cosmetic terminal spinner.
//! - \[`mapping`\]: marker detections → role/camera-id table.
//! - \[`session`\]: mutable state container with an audit log.
//! - \[`sequencer`\]: the calibration state machine.
//! - \[`report`\]: operator tables.

pub mod config;
pub mod error;
pub mod mapping;
pub mod progress;
pub mod report;
pub mod runner;
pub mod sequencer;
pub mod session;

pub use config::{ConfigGroup, SharedConfig};
pub use error::CalibrationError;
pub use mapping::{CameraMap, DetectionRecord, MappingError, MarkerAssignment, map_camera_ids};
pub use runner::{ExecutableRunner, RunRequest, RunnerError, VideoProcessingRunner};
pub use sequencer::{
    CalibrationInput, CalibrationOutcome, CalibrationSequencer, MappingSource, SequencerSettings,
    SequencerState,
};
pub use session::CalibrationSession;
