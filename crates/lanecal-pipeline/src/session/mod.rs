//! Calibration session framework.
//!
//! A [`CalibrationSession`] is a mutable state container. The
//! [`CalibrationSequencer`](crate::sequencer::CalibrationSequencer) owns one
//! and its step methods update it in place, logging every step:
//!
//! ```no_run
//! use lanecal_pipeline::runner::ExecutableRunner;
//! use lanecal_pipeline::sequencer::{CalibrationInput, CalibrationSequencer, SequencerSettings};
//! use lanecal_pipeline::session::CalibrationSession;
//! use lanecal_pipeline::config::SharedConfig;
//! # fn main() -> anyhow::Result<()> {
//! let config_path = std::path::Path::new("CameraStartUpJson.json");
//! let config = SharedConfig::load(config_path)?;
//! let session = CalibrationSession::new(
//!     "AGV12",
//!     CalibrationInput::new("clips", "clips"),
//!     SequencerSettings::default(),
//! );
//! let runner = ExecutableRunner::new("./VideoPlayback")?;
//! let mut sequencer = CalibrationSequencer::new(session, config, config_path, runner)?;
//! let outcome = sequencer.run()?;
//! println!("passed: {}", outcome.passed);
//! # Ok(())
//! # }
//! ```

pub mod calibsession;
pub mod types;

pub use calibsession::CalibrationSession;
pub use types::{LogEntry, SessionMetadata, current_timestamp};
