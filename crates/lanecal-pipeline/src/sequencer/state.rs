//! Sequencer position and intermediate per-stage data.

use std::fmt;
use std::path::PathBuf;

use lanecal_core::{
    CalibrationStage, CameraRole, MeasurementSample, MountingVerdict, OffsetVerdict, PerRole,
};
use serde::{Deserialize, Serialize};

use crate::mapping::{DetectionRecord, MarkerAssignment};

/// Position of the sequencer: the step that runs next, or a terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequencerState {
    #[default]
    Init,
    IdMapping,
    Recording,
    Stage0,
    DeriveRatioOffset,
    Stage1,
    DeriveSteeringOffset,
    Stage2,
    DeriveVerification,
    FinalVerdict,
    Terminal,
    /// Baseline values out of the mounting bands; the camera must be refitted.
    AbortedMounting,
    /// A step failed; the run cannot continue.
    AbortedError,
}

impl SequencerState {
    /// Successor on the normal path, `None` for terminal states.
    pub fn next(self) -> Option<Self> {
        use SequencerState::*;
        Some(match self {
            Init => IdMapping,
            IdMapping => Recording,
            Recording => Stage0,
            Stage0 => DeriveRatioOffset,
            DeriveRatioOffset => Stage1,
            Stage1 => DeriveSteeringOffset,
            DeriveSteeringOffset => Stage2,
            Stage2 => DeriveVerification,
            DeriveVerification => FinalVerdict,
            FinalVerdict => Terminal,
            Terminal | AbortedMounting | AbortedError => return None,
        })
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Measurement pass run in this state, if it is one.
    pub fn stage(self) -> Option<CalibrationStage> {
        match self {
            SequencerState::Stage0 => Some(CalibrationStage::WithoutOffset),
            SequencerState::Stage1 => Some(CalibrationStage::RatioOffsetOnly),
            SequencerState::Stage2 => Some(CalibrationStage::RatioAndSteeringOffset),
            _ => None,
        }
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How roles get their camera ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum MappingSource {
    /// Keep the ids already in the shared config.
    #[default]
    FromConfig,
    /// Map from one frame's marker detections per physical camera.
    Detections {
        records: Vec<DetectionRecord>,
        markers: MarkerAssignment,
    },
}

/// Input locations of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationInput {
    /// Directory holding `FrontCam.mp4`, `RightCam.mp4`, `LeftCam.mp4`.
    pub clips_dir: PathBuf,
    /// Directory receiving the vision logs and the result artifact.
    pub data_dir: PathBuf,
    pub mapping: MappingSource,
}

impl CalibrationInput {
    pub fn new(clips_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            clips_dir: clips_dir.into(),
            data_dir: data_dir.into(),
            mapping: MappingSource::FromConfig,
        }
    }

    pub fn with_detections(
        mut self,
        records: Vec<DetectionRecord>,
        markers: MarkerAssignment,
    ) -> Self {
        self.mapping = MappingSource::Detections { records, markers };
        self
    }
}

/// Final verdict of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    /// Every gated metric of every connected camera passed.
    pub passed: bool,
    pub verdicts: Vec<OffsetVerdict>,
}

/// Mutable state carried between sequencer steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub phase: SequencerState,
    /// Connected roles, read from the shared config at init.
    pub connected: PerRole<bool>,
    /// Measurement of every role in every stage, indexed by stage ordinal.
    pub samples: PerRole<[Option<MeasurementSample>; 3]>,
    pub mounting: Vec<MountingVerdict>,
    pub outcome: Option<CalibrationOutcome>,
}

impl RunState {
    pub fn sample(&self, role: CameraRole, stage: CalibrationStage) -> Option<MeasurementSample> {
        self.samples[role][stage.index()]
    }
}
