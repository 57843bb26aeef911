//! Error taxonomy of a calibration run.

use std::io;
use std::path::PathBuf;

use lanecal_core::{
    CalibrationStage, CameraRole, EstimateError, Instruction, LogParseError, MountingVerdict,
};
use thiserror::Error;

use crate::mapping::MappingError;
use crate::runner::RunnerError;
use crate::sequencer::SequencerState;

/// Fatal conditions that abort a calibration run.
///
/// A failed final verdict is not an error: it is reported through
/// [`CalibrationOutcome`](crate::sequencer::CalibrationOutcome).
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{role} camera, {stage}: log file {path} not found")]
    LogFileNotFound {
        role: CameraRole,
        stage: CalibrationStage,
        path: PathBuf,
    },

    #[error("{role} camera, {stage}: measurement unavailable: {source}")]
    MeasurementUnavailable {
        role: CameraRole,
        stage: CalibrationStage,
        #[source]
        source: LogParseError,
    },

    #[error("external vision process failed: {0}")]
    ExternalProcessFailure(#[from] RunnerError),

    #[error("camera mounting out of range: {}", join_instructions(.0))]
    MountingOutOfRange(Vec<MountingVerdict>),

    #[error("{role} camera clip {path} not found")]
    RecordingMissing { role: CameraRole, path: PathBuf },

    #[error("camera id mapping failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("step `{step}` is not allowed in state {state}")]
    InvalidTransition {
        step: &'static str,
        state: SequencerState,
    },

    #[error("{role} camera has no {stage} measurement")]
    MissingSample {
        role: CameraRole,
        stage: CalibrationStage,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CalibrationError {
    /// Attach the camera and stage to a log parsing failure.
    pub fn from_log(role: CameraRole, stage: CalibrationStage, err: LogParseError) -> Self {
        match err {
            LogParseError::LogFileNotFound(path) => Self::LogFileNotFound { role, stage, path },
            source => Self::MeasurementUnavailable {
                role,
                stage,
                source,
            },
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

impl From<EstimateError> for CalibrationError {
    fn from(err: EstimateError) -> Self {
        Self::Configuration(err.to_string())
    }
}

fn join_instructions(verdicts: &[MountingVerdict]) -> String {
    let instructions: Vec<String> = verdicts
        .iter()
        .flat_map(|v| v.instructions.iter())
        .map(Instruction::to_string)
        .collect();
    instructions.join("; ")
}
