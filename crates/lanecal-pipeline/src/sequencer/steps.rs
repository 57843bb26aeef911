//! Step methods of the calibration sequencer.
//!
//! Each step checks the sequencer is in the state it belongs to, does its
//! work, logs it in the session and moves to the next state. A failing step
//! moves the sequencer to an aborted state instead.

use std::fs;

use lanecal_core::estimator::{ratio_offset, steering_offset};
use lanecal_core::{
    CalibrationResultStore, CalibrationStage, CameraRole, MeasurementSample, ResultField,
    mounting_verdict, offset_verdict, parse_log_file,
};
use log::{error, info, warn};

use super::{CalibrationOutcome, CalibrationSequencer, MappingSource, Result, SequencerState};
use crate::error::CalibrationError;
use crate::mapping::{CameraMap, map_camera_ids};
use crate::runner::{RunRequest, VideoProcessingRunner};

impl<R: VideoProcessingRunner> CalibrationSequencer<R> {
    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn expect_state(&self, expected: SequencerState, step: &'static str) -> Result<()> {
        let state = self.state();
        if state != expected {
            return Err(CalibrationError::InvalidTransition { step, state });
        }
        Ok(())
    }

    /// Run `f`; on success advance, on failure abort and log the error.
    fn guarded(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> Result<String>,
    ) -> Result<()> {
        match f(self) {
            Ok(notes) => {
                if notes.is_empty() {
                    self.session.log_success(operation);
                } else {
                    self.session.log_success_with_notes(operation, notes);
                }
                if let Some(next) = self.state().next() {
                    self.session.state.phase = next;
                }
                Ok(())
            }
            Err(err) => {
                let aborted = match err {
                    CalibrationError::MountingOutOfRange(_) => SequencerState::AbortedMounting,
                    _ => SequencerState::AbortedError,
                };
                error!("{operation} failed: {err}");
                self.session.log_failure(operation, err.to_string());
                self.session.state.phase = aborted;
                Err(err)
            }
        }
    }

    fn require_sample(&self, role: CameraRole, stage: CalibrationStage) -> Result<MeasurementSample> {
        self.session
            .state
            .sample(role, stage)
            .ok_or(CalibrationError::MissingSample { role, stage })
    }

    fn persist_config(&self) -> Result<()> {
        self.config.persist(&self.config_path)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Setup
    // ─────────────────────────────────────────────────────────────────────────

    /// Check the shared config and prepare the data directory.
    pub fn step_init(&mut self) -> Result<()> {
        self.expect_state(SequencerState::Init, "init")?;
        self.guarded("init", |seq| {
            let connected = seq.config.connected_roles();
            if !connected.0.iter().any(|c| *c) {
                return Err(CalibrationError::Configuration(
                    "connectedCameraFlag marks no camera as connected".to_string(),
                ));
            }
            let path_width = seq.config.path_width()?;

            let data_dir = seq.session.input.data_dir.clone();
            fs::create_dir_all(&data_dir).map_err(CalibrationError::io(&data_dir))?;

            seq.session.state.connected = connected;
            seq.session.results = CalibrationResultStore::with_connected(connected);

            let roles: Vec<&str> = seq.connected_roles().iter().map(|r| r.label()).collect();
            info!(
                "calibrating {} cameras of {} (path width {path_width} cm)",
                roles.join("/"),
                seq.session.robot_id()
            );
            Ok(format!("path_width={path_width} cameras={}", roles.join(",")))
        })
    }

    /// Resolve camera ids and record them in the config and the result store.
    pub fn step_map_ids(&mut self) -> Result<()> {
        self.expect_state(SequencerState::IdMapping, "map_ids")?;
        self.guarded("map_ids", |seq| {
            let mapping = seq.session.input.mapping.clone();
            let (map, detected) = match mapping {
                MappingSource::FromConfig => {
                    info!("skipping camera id mapping, using ids from the shared config");
                    (CameraMap::from_config(&seq.config), false)
                }
                MappingSource::Detections { records, markers } => {
                    (map_camera_ids(&records, &markers)?, true)
                }
            };
            map.require(&seq.session.state.connected)?;

            let mut notes = Vec::new();
            for role in seq.connected_roles() {
                let Some(id) = map.get(role) else { continue };
                if detected {
                    seq.config.set_camera_id(role, id);
                }
                seq.session.results.set_camera_id(role, id);
                notes.push(format!("{}={id}", role.key_prefix()));
            }
            if detected {
                seq.persist_config()?;
            }
            Ok(notes.join(" "))
        })
    }

    /// Every connected camera must have its clip recorded.
    pub fn step_check_recordings(&mut self) -> Result<()> {
        self.expect_state(SequencerState::Recording, "check_recordings")?;
        self.guarded("check_recordings", |seq| {
            for role in seq.connected_roles() {
                let path = seq.session.input.clips_dir.join(role.clip_file_name());
                if !path.is_file() {
                    return Err(CalibrationError::RecordingMissing { role, path });
                }
            }
            Ok(format!(
                "clips in {}",
                seq.session.input.clips_dir.display()
            ))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Measurement
    // ─────────────────────────────────────────────────────────────────────────

    /// Run the current stage on every connected camera, one after another.
    ///
    /// The baseline stage first zeroes every offset in the shared config.
    pub fn step_measure(&mut self) -> Result<()> {
        let state = self.state();
        let Some(stage) = state.stage() else {
            return Err(CalibrationError::InvalidTransition {
                step: "measure",
                state,
            });
        };
        let operation = match stage {
            CalibrationStage::WithoutOffset => "measure_stage0",
            CalibrationStage::RatioOffsetOnly => "measure_stage1",
            CalibrationStage::RatioAndSteeringOffset => "measure_stage2",
        };
        self.guarded(operation, |seq| {
            if stage == CalibrationStage::WithoutOffset {
                seq.config.reset_offsets();
                seq.persist_config()?;
                info!("all camera offsets reset to 0");
            }
            let mut notes = Vec::new();
            for role in seq.connected_roles() {
                let sample = seq.measure(role, stage)?;
                notes.push(format!(
                    "{}: ratio={:.3} csa={:.2}",
                    role.key_prefix(),
                    sample.ratio,
                    sample.steering_angle
                ));
            }
            Ok(notes.join(", "))
        })
    }

    fn measure(&mut self, role: CameraRole, stage: CalibrationStage) -> Result<MeasurementSample> {
        let input = &self.session.input;
        let request = RunRequest {
            role,
            stage,
            clip: input.clips_dir.join(role.clip_file_name()),
            log_file: input.data_dir.join(stage.log_file_name(role)),
        };

        self.config.prepare_offline_run(role);
        self.persist_config()?;

        info!("{stage}: processing {role} camera clip");
        self.runner.process(&request)?;

        let sample = parse_log_file(&request.log_file)
            .map_err(|err| CalibrationError::from_log(role, stage, err))?;
        info!(
            "{role} camera, {stage}: ratio={:.3} CSA={:.2}",
            sample.ratio, sample.steering_angle
        );
        self.session.state.samples[role][stage.index()] = Some(sample);
        Ok(sample)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derivation
    // ─────────────────────────────────────────────────────────────────────────

    /// Gate the baseline against the mounting bands, then persist ratio offsets.
    ///
    /// Nothing is written to the config when a camera fails the gate.
    pub fn step_derive_ratio_offsets(&mut self) -> Result<()> {
        self.expect_state(SequencerState::DeriveRatioOffset, "derive_ratio_offset")?;
        self.guarded("derive_ratio_offset", |seq| {
            let stage = CalibrationStage::WithoutOffset;
            let settings = seq.session.settings;
            let roles = seq.connected_roles();

            let mut verdicts = Vec::with_capacity(roles.len());
            for &role in &roles {
                let sample = seq.require_sample(role, stage)?;
                let results = &mut seq.session.results;
                results.update_result(role, ResultField::RatioWithoutOffset, sample.ratio);
                results.update_result(
                    role,
                    ResultField::SteeringAngleWithoutOffset,
                    sample.steering_angle,
                );
                verdicts.push(mounting_verdict(
                    role,
                    sample.ratio,
                    sample.steering_angle,
                    &settings.thresholds.ratio_without_offset,
                    &settings.thresholds.csa_without_offset,
                ));
            }
            seq.session.state.mounting = verdicts.clone();

            let failed: Vec<_> = verdicts.into_iter().filter(|v| !v.passed()).collect();
            if !failed.is_empty() {
                return Err(CalibrationError::MountingOutOfRange(failed));
            }

            let path_width = seq.config.path_width()?;
            let mut notes = Vec::new();
            for &role in &roles {
                let sample = seq.require_sample(role, stage)?;
                let Some(offset) = ratio_offset(
                    role,
                    sample.ratio,
                    path_width,
                    settings.targets.target_ratio,
                )?
                else {
                    continue;
                };
                seq.config.set_ratio_offset(role, offset);
                seq.session
                    .results
                    .update_result(role, ResultField::RatioOffset, offset);
                info!("{}SideCameraOffset = {offset}", role.key_prefix());
                notes.push(format!("{}={offset}", role.key_prefix()));
            }
            seq.persist_config()?;
            Ok(notes.join(" "))
        })
    }

    /// Persist steering offsets measured with the ratio offsets applied.
    pub fn step_derive_steering_offsets(&mut self) -> Result<()> {
        self.expect_state(SequencerState::DeriveSteeringOffset, "derive_steering_offset")?;
        self.guarded("derive_steering_offset", |seq| {
            let target = seq.session.settings.targets.target_steering_angle;
            let mut notes = Vec::new();
            for role in seq.connected_roles() {
                let sample = seq.require_sample(role, CalibrationStage::RatioOffsetOnly)?;
                let offset = steering_offset(sample.steering_angle, target);
                seq.config.set_steering_offset(role, offset);
                seq.session
                    .results
                    .update_result(role, ResultField::SteeringOffset, offset);
                info!("{}SideSteeringOffset = {offset}", role.key_prefix());
                notes.push(format!("{}={offset}", role.key_prefix()));
            }
            seq.persist_config()?;
            Ok(notes.join(" "))
        })
    }

    /// Record the verification pass for the verdict.
    pub fn step_derive_verification(&mut self) -> Result<()> {
        self.expect_state(SequencerState::DeriveVerification, "derive_verification")?;
        self.guarded("derive_verification", |seq| {
            for role in seq.connected_roles() {
                let sample = seq.require_sample(role, CalibrationStage::RatioAndSteeringOffset)?;
                let results = &mut seq.session.results;
                results.update_result(role, ResultField::RatioWithOffset, sample.ratio);
                results.update_result(
                    role,
                    ResultField::SteeringAngleWithOffset,
                    sample.steering_angle,
                );
            }
            Ok(String::new())
        })
    }

    /// Gate the verification pass against the narrow bands.
    ///
    /// A failing camera does not make this step fail; the outcome says so.
    pub fn step_final_verdict(&mut self) -> Result<()> {
        self.expect_state(SequencerState::FinalVerdict, "final_verdict")?;
        self.guarded("final_verdict", |seq| {
            let thresholds = seq.session.settings.thresholds;
            let mut verdicts = Vec::new();
            for role in seq.connected_roles() {
                let sample = seq.require_sample(role, CalibrationStage::RatioAndSteeringOffset)?;
                verdicts.push(offset_verdict(
                    role,
                    sample.ratio,
                    sample.steering_angle,
                    &thresholds,
                ));
            }
            let passed = verdicts.iter().all(|v| v.passed());
            if passed {
                info!("calibration passed");
            } else {
                for instruction in verdicts.iter().flat_map(|v| v.instructions.iter()) {
                    warn!("offset out of range: {instruction}");
                }
            }
            seq.session.state.outcome = Some(CalibrationOutcome { passed, verdicts });
            Ok(if passed { "passed" } else { "failed" }.to_string())
        })
    }
}
