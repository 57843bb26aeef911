//! Calibration session container with mutable state.
//!
//! The session stores the run settings, the input locations, the
//! intermediate per-stage state and the result store. Sequencer steps mutate
//! the session in place and append to its operation log.

use lanecal_core::CalibrationResultStore;
use serde::{Deserialize, Serialize};

use super::types::{LogEntry, SessionMetadata};
use crate::sequencer::{CalibrationInput, RunState, SequencerSettings};

/// State of one calibration run.
///
/// # Example
///
/// ```
/// use lanecal_pipeline::session::CalibrationSession;
/// use lanecal_pipeline::sequencer::{CalibrationInput, SequencerSettings};
///
/// let input = CalibrationInput::new("clips", "clips");
/// let mut session = CalibrationSession::new("AGV12", input, SequencerSettings::default());
/// session.log_success("init");
/// assert_eq!(session.log.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSession {
    /// Robot id, timestamps, description.
    pub metadata: SessionMetadata,

    /// Targets and acceptance bands.
    pub settings: SequencerSettings,

    /// Where clips are read from and logs are written to.
    pub input: CalibrationInput,

    /// Sequencer position and per-stage measurements.
    pub state: RunState,

    /// Values reported in the result artifact.
    pub results: CalibrationResultStore,

    /// Operation log (lightweight audit trail).
    pub log: Vec<LogEntry>,
}

impl CalibrationSession {
    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    pub fn new(
        robot_id: impl Into<String>,
        input: CalibrationInput,
        settings: SequencerSettings,
    ) -> Self {
        Self {
            metadata: SessionMetadata::new(robot_id),
            settings,
            input,
            state: RunState::default(),
            results: CalibrationResultStore::new(),
            log: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    pub fn robot_id(&self) -> &str {
        &self.metadata.robot_id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    pub fn log_success(&mut self, operation: impl Into<String>) {
        self.log.push(LogEntry::success(operation));
        self.metadata.touch();
    }

    pub fn log_success_with_notes(
        &mut self,
        operation: impl Into<String>,
        notes: impl Into<String>,
    ) {
        self.log.push(LogEntry::success_with_notes(operation, notes));
        self.metadata.touch();
    }

    pub fn log_failure(&mut self, operation: impl Into<String>, error: impl Into<String>) {
        self.log.push(LogEntry::failure(operation, error));
        self.metadata.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────────

    /// Serialize session to a pretty JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
