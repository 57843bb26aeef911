//! Three-pass calibration state machine.
//!
//! ```text
//! Init → IdMapping → Recording → Stage0 → DeriveRatioOffset → Stage1
//!      → DeriveSteeringOffset → Stage2 → DeriveVerification → FinalVerdict → Terminal
//! ```
//!
//! Every measurement stage runs the vision executable once per connected
//! camera, strictly one camera at a time: the executable picks the clip type
//! from `SelectCameraForOfflineMode` in the shared config, so two runs can
//! not share the file.
//!
//! A baseline outside the mounting bands ends the run in
//! [`SequencerState::AbortedMounting`]; any other failure ends it in
//! [`SequencerState::AbortedError`]. There is no retry: a new run starts again
//! from a fresh offset reset.

mod settings;
mod state;
mod steps;

use std::fs;
use std::path::{Path, PathBuf};

use lanecal_core::CameraRole;
use log::info;

use crate::config::SharedConfig;
use crate::error::CalibrationError;
use crate::runner::VideoProcessingRunner;
use crate::session::CalibrationSession;

pub use settings::SequencerSettings;
pub use state::{CalibrationInput, CalibrationOutcome, MappingSource, RunState, SequencerState};

type Result<T> = std::result::Result<T, CalibrationError>;

/// Drives one calibration run.
///
/// The runner is injected, so tests can replace the vision executable with a
/// fake that writes synthetic logs.
pub struct CalibrationSequencer<R> {
    session: CalibrationSession,
    config: SharedConfig,
    config_path: PathBuf,
    runner: R,
}

impl<R: VideoProcessingRunner> CalibrationSequencer<R> {
    pub fn new(
        session: CalibrationSession,
        config: SharedConfig,
        config_path: impl Into<PathBuf>,
        runner: R,
    ) -> Result<Self> {
        session.settings.validate()?;
        Ok(Self {
            session,
            config,
            config_path: config_path.into(),
            runner,
        })
    }

    pub fn session(&self) -> &CalibrationSession {
        &self.session
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn state(&self) -> SequencerState {
        self.session.state.phase
    }

    pub fn into_session(self) -> CalibrationSession {
        self.session
    }

    /// Run the step for the current state.
    pub fn step(&mut self) -> Result<()> {
        match self.state() {
            SequencerState::Init => self.step_init(),
            SequencerState::IdMapping => self.step_map_ids(),
            SequencerState::Recording => self.step_check_recordings(),
            SequencerState::Stage0 | SequencerState::Stage1 | SequencerState::Stage2 => {
                self.step_measure()
            }
            SequencerState::DeriveRatioOffset => self.step_derive_ratio_offsets(),
            SequencerState::DeriveSteeringOffset => self.step_derive_steering_offsets(),
            SequencerState::DeriveVerification => self.step_derive_verification(),
            SequencerState::FinalVerdict => self.step_final_verdict(),
            state @ (SequencerState::Terminal
            | SequencerState::AbortedMounting
            | SequencerState::AbortedError) => Err(CalibrationError::InvalidTransition {
                step: "step",
                state,
            }),
        }
    }

    /// Run every remaining step and return the final verdict.
    ///
    /// A failed verdict is returned as `Ok` with `passed == false`.
    pub fn run(&mut self) -> Result<CalibrationOutcome> {
        while !self.state().is_terminal() {
            self.step()?;
        }
        self.session
            .state
            .outcome
            .clone()
            .ok_or(CalibrationError::InvalidTransition {
                step: "run",
                state: self.state(),
            })
    }

    /// Write `<robot>_AutoCalibResult.json` into `dir`.
    pub fn write_result_artifact(&self, dir: &Path) -> Result<PathBuf> {
        let robot_id = self.session.robot_id();
        let path = dir.join(format!("{robot_id}_AutoCalibResult.json"));
        let json = self.session.results.to_json(robot_id)?;
        fs::write(&path, json).map_err(CalibrationError::io(&path))?;
        info!("result artifact written to {}", path.display());
        Ok(path)
    }

    fn connected_roles(&self) -> Vec<CameraRole> {
        let connected = &self.session.state.connected;
        CameraRole::ALL
            .into_iter()
            .filter(|role| connected[*role])
            .collect()
    }
}
