//! End-to-end runs of the sequencer against a simulated vision executable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use lanecal_core::{CalibrationStage, CameraRole, PerRole, Verdict};
use lanecal_pipeline::{
    CalibrationError, CalibrationInput, CalibrationSequencer, CalibrationSession, ConfigGroup,
    DetectionRecord, MarkerAssignment, RunRequest, RunnerError, SequencerSettings, SequencerState,
    SharedConfig, VideoProcessingRunner,
};
use serde_json::{Value, json};
use tempfile::TempDir;

const PATH_WIDTH: f64 = 60.0;

/// How the simulated executable misbehaves on one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    /// Exits non-zero.
    Crash,
    /// Exits 0 after printing no frame records.
    EmptyLog,
    /// Exits 0 without writing a log.
    NoLog,
}

/// Stands in for the vision executable.
///
/// Reads the persisted config the way the real executable does and reports
/// the lane position a camera with the given baseline would see once the
/// stored offsets are applied.
struct FakeVision {
    config_path: PathBuf,
    baseline: PerRole<(f64, f64)>,
    /// Fraction of the stored ratio offset that actually moves the ratio.
    ratio_gain: f64,
    fault: Option<(CameraRole, CalibrationStage, Fault)>,
    calls: Vec<(RunRequest, SharedConfig)>,
}

impl FakeVision {
    fn new(config_path: &Path, baseline: PerRole<(f64, f64)>) -> Self {
        Self {
            config_path: config_path.to_path_buf(),
            baseline,
            ratio_gain: 1.0,
            fault: None,
            calls: Vec::new(),
        }
    }
}

impl VideoProcessingRunner for FakeVision {
    fn process(&mut self, request: &RunRequest) -> Result<(), RunnerError> {
        let config = SharedConfig::load(&self.config_path)
            .map_err(|err| RunnerError::Failed(err.to_string()))?;
        self.calls.push((request.clone(), config.clone()));
        let fault = self
            .fault
            .filter(|&(role, stage, _)| (role, stage) == (request.role, request.stage))
            .map(|(_, _, fault)| fault);
        match fault {
            Some(Fault::Crash) => return Err(RunnerError::Failed("decoder crashed".to_string())),
            Some(Fault::NoLog) => return Ok(()),
            Some(Fault::EmptyLog) => {
                let log = format!("opening {}\nno lanes found\n", request.clip.display());
                return fs::write(&request.log_file, log)
                    .map_err(|err| RunnerError::Failed(err.to_string()));
            }
            None => {}
        }

        let (ratio, angle) = self.baseline[request.role];
        let shift = config.ratio_offset(request.role).unwrap_or(0.0) / PATH_WIDTH * self.ratio_gain;
        let ratio = match request.role {
            CameraRole::Front => ratio,
            CameraRole::Right => ratio + shift,
            CameraRole::Left => ratio - shift,
        };
        let angle = angle + config.steering_offset(request.role);

        let mut log = format!("opening {}\n", request.clip.display());
        for frame in 0..3 {
            log.push_str(&format!("frame={frame};ratio={ratio:.4};lines=2;CSA={angle:.2}\n"));
        }
        fs::write(&request.log_file, log).map_err(|err| RunnerError::Failed(err.to_string()))
    }
}

struct Bench {
    dir: TempDir,
    config_path: PathBuf,
}

impl Bench {
    /// Config with stale offsets from a previous run, and all three clips recorded.
    fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("CameraStartUpJson.json");
        let mut config = SharedConfig::template();
        config.set_param(ConfigGroup::DebugParams, "PathWidth", json!(PATH_WIDTH))?;
        config.set_ratio_offset(CameraRole::Right, 12.0);
        config.set_steering_offset(CameraRole::Left, 3.5);
        for role in CameraRole::ALL {
            config.set_camera_id(role, format!("cfg-{}", role.key_prefix()));
        }
        config.persist(&config_path)?;

        for role in CameraRole::ALL {
            fs::write(dir.path().join(role.clip_file_name()), b"")?;
        }
        Ok(Self { dir, config_path })
    }

    fn clips(&self) -> &Path {
        self.dir.path()
    }

    fn input(&self) -> CalibrationInput {
        CalibrationInput::new(self.clips(), self.dir.path().join("data"))
    }

    fn sequencer<'a>(
        &self,
        input: CalibrationInput,
        runner: &'a mut FakeVision,
    ) -> Result<CalibrationSequencer<&'a mut FakeVision>> {
        let session = CalibrationSession::new("bot7", input, SequencerSettings::default());
        let config = SharedConfig::load(&self.config_path)?;
        Ok(CalibrationSequencer::new(session, config, &self.config_path, runner)?)
    }

    fn reload(&self) -> Result<SharedConfig> {
        Ok(SharedConfig::load(&self.config_path)?)
    }
}

fn centred_robot() -> PerRole<(f64, f64)> {
    PerRole([(0.50, 92.0), (0.40, 85.0), (0.60, 95.0)])
}

#[test]
fn full_run_persists_offsets_and_passes() -> Result<()> {
    let bench = Bench::new()?;
    let mut vision = FakeVision::new(&bench.config_path, centred_robot());

    let mut seq = bench.sequencer(bench.input(), &mut vision)?;
    let outcome = seq.run()?;
    assert!(outcome.passed, "{outcome:?}");
    assert_eq!(seq.state(), SequencerState::Terminal);

    let artifact_path = seq.write_result_artifact(bench.dir.path())?;
    assert!(artifact_path.ends_with("bot7_AutoCalibResult.json"));
    let session = seq.into_session();
    assert!(session.log.iter().all(|entry| entry.success));
    let verification = session
        .log
        .iter()
        .find(|entry| entry.operation == "derive_verification")
        .unwrap();
    assert_eq!(verification.notes, None);
    let ratio = session
        .log
        .iter()
        .find(|entry| entry.operation == "derive_ratio_offset")
        .unwrap();
    assert!(ratio.notes.as_deref().unwrap().contains("right=6"));

    let config = bench.reload()?;
    assert_eq!(config.ratio_offset(CameraRole::Right), Some(6.0));
    assert_eq!(config.ratio_offset(CameraRole::Left), Some(6.0));
    assert_eq!(config.steering_offset(CameraRole::Front), -2.0);
    assert_eq!(config.steering_offset(CameraRole::Right), 5.0);
    assert_eq!(config.steering_offset(CameraRole::Left), -5.0);
    assert_eq!(config.camera_id(CameraRole::Right), "cfg-right");

    let artifact: Value = serde_json::from_str(&fs::read_to_string(&artifact_path)?)?;
    let right = &artifact["bot7"]["right"];
    assert_eq!(right["camera_id"], json!("cfg-right"));
    assert_eq!(right["ratio_without_offset"], json!(0.4));
    assert_eq!(right["ratio_offset"], json!(6.0));
    assert_eq!(right["steering_angle_offset"], json!(5.0));
    assert_eq!(right["ratio_with_offset"], json!(0.5));
    assert_eq!(right["steering_angle_with_offset"], json!(90.0));
    assert_eq!(artifact["bot7"]["front"]["ratio_offset"], Value::Null);

    // Three stages, three cameras, one at a time.
    assert_eq!(vision.calls.len(), 9);
    for (request, config) in &vision.calls {
        assert_eq!(
            config.debug_params().select_camera_for_offline_mode,
            request.role.offline_mode()
        );
        assert_eq!(config.debug_params().host_commn_flag, 0);
        assert!(!config.debug_params().hybrid_switch);
        assert_eq!(request.clip, bench.clips().join(request.role.clip_file_name()));
    }
    let order: Vec<_> = vision.calls.iter().map(|(r, _)| (r.stage, r.role)).collect();
    assert_eq!(order[0], (CalibrationStage::WithoutOffset, CameraRole::Front));
    assert_eq!(order[4], (CalibrationStage::RatioOffsetOnly, CameraRole::Right));
    assert_eq!(order[8], (CalibrationStage::RatioAndSteeringOffset, CameraRole::Left));

    // Baseline runs see zeroed offsets, the second pass only the ratio offsets.
    for (request, config) in &vision.calls {
        let right = config.ratio_offset(CameraRole::Right);
        let left_steering = config.steering_offset(CameraRole::Left);
        match request.stage {
            CalibrationStage::WithoutOffset => {
                assert_eq!(right, Some(0.0));
                assert_eq!(left_steering, 0.0);
            }
            CalibrationStage::RatioOffsetOnly => {
                assert_eq!(right, Some(6.0));
                assert_eq!(left_steering, 0.0);
            }
            CalibrationStage::RatioAndSteeringOffset => {
                assert_eq!(right, Some(6.0));
                assert_eq!(left_steering, -5.0);
            }
        }
    }

    let logs = bench.dir.path().join("data");
    assert!(logs.join("RightCamLog.txt").is_file());
    assert!(logs.join("RightCamLogRatioOffset.txt").is_file());
    assert!(logs.join("RightCamLogWithOffset.txt").is_file());
    Ok(())
}

#[test]
fn baseline_out_of_band_aborts_before_any_offset_is_written() -> Result<()> {
    let bench = Bench::new()?;
    let mut vision = FakeVision::new(
        &bench.config_path,
        PerRole([(0.50, 92.0), (0.30, 85.0), (0.60, 95.0)]),
    );

    let mut seq = bench.sequencer(bench.input(), &mut vision)?;
    let err = seq.run().unwrap_err();
    let CalibrationError::MountingOutOfRange(failed) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].role, CameraRole::Right);
    assert_eq!(failed[0].vertical_pos, Verdict::Fail);
    assert!(err.to_string().contains("tilt Right camera downwards"));
    assert_eq!(seq.state(), SequencerState::AbortedMounting);
    assert_eq!(seq.session().state.mounting.len(), 3);

    let session = seq.into_session();
    let last = session.log.last().unwrap();
    assert_eq!(last.operation, "derive_ratio_offset");
    assert!(!last.success);

    assert_eq!(vision.calls.len(), 3);
    let config = bench.reload()?;
    assert_eq!(config.ratio_offset(CameraRole::Right), Some(0.0));
    assert_eq!(config.ratio_offset(CameraRole::Left), Some(0.0));
    assert_eq!(config.steering_offset(CameraRole::Left), 0.0);
    Ok(())
}

#[test]
fn under_corrected_camera_fails_the_verdict() -> Result<()> {
    let bench = Bench::new()?;
    let mut vision = FakeVision::new(&bench.config_path, centred_robot());
    vision.ratio_gain = 0.5;

    let mut seq = bench.sequencer(bench.input(), &mut vision)?;
    let outcome = seq.run()?;
    assert!(!outcome.passed);
    assert_eq!(seq.state(), SequencerState::Terminal);

    let right = outcome
        .verdicts
        .iter()
        .find(|v| v.role == CameraRole::Right)
        .unwrap();
    assert_eq!(right.ratio, Some(Verdict::Fail));
    assert_eq!(right.steering, Verdict::Pass);
    assert!(
        right
            .instructions
            .iter()
            .any(|i| i.to_string() == "tilt Right camera downwards")
    );
    let front = outcome
        .verdicts
        .iter()
        .find(|v| v.role == CameraRole::Front)
        .unwrap();
    assert!(front.passed());

    // Offsets stay in the config for the operator to inspect.
    assert_eq!(bench.reload()?.ratio_offset(CameraRole::Right), Some(6.0));
    Ok(())
}

#[test]
fn runner_failure_aborts_the_run() -> Result<()> {
    let bench = Bench::new()?;
    let mut vision = FakeVision::new(&bench.config_path, centred_robot());
    vision.fault = Some((CameraRole::Left, CalibrationStage::RatioOffsetOnly, Fault::Crash));

    let mut seq = bench.sequencer(bench.input(), &mut vision)?;
    let err = seq.run().unwrap_err();
    assert!(matches!(err, CalibrationError::ExternalProcessFailure(_)));
    assert_eq!(seq.state(), SequencerState::AbortedError);

    let again = seq.step().unwrap_err();
    assert!(matches!(
        again,
        CalibrationError::InvalidTransition {
            state: SequencerState::AbortedError,
            ..
        }
    ));
    drop(seq);
    assert_eq!(vision.calls.len(), 6);
    Ok(())
}

#[test]
fn clean_exit_with_empty_log_aborts() -> Result<()> {
    let bench = Bench::new()?;
    let mut vision = FakeVision::new(&bench.config_path, centred_robot());
    vision.fault = Some((CameraRole::Right, CalibrationStage::WithoutOffset, Fault::EmptyLog));

    let mut seq = bench.sequencer(bench.input(), &mut vision)?;
    let err = seq.run().unwrap_err();
    assert!(
        matches!(
            err,
            CalibrationError::MeasurementUnavailable {
                role: CameraRole::Right,
                stage: CalibrationStage::WithoutOffset,
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(seq.state(), SequencerState::AbortedError);
    assert!(seq.session().state.mounting.is_empty());
    drop(seq);

    // The run stops at the camera whose log has no samples.
    assert_eq!(vision.calls.len(), 2);
    assert_eq!(bench.reload()?.ratio_offset(CameraRole::Right), Some(0.0));
    Ok(())
}

#[test]
fn clean_exit_without_log_aborts() -> Result<()> {
    let bench = Bench::new()?;
    let mut vision = FakeVision::new(&bench.config_path, centred_robot());
    vision.fault = Some((
        CameraRole::Front,
        CalibrationStage::RatioAndSteeringOffset,
        Fault::NoLog,
    ));

    let mut seq = bench.sequencer(bench.input(), &mut vision)?;
    let err = seq.run().unwrap_err();
    let CalibrationError::LogFileNotFound { role, stage, path } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*role, CameraRole::Front);
    assert_eq!(*stage, CalibrationStage::RatioAndSteeringOffset);
    assert!(path.ends_with("FrontCamLogWithOffset.txt"));
    assert_eq!(seq.state(), SequencerState::AbortedError);

    let session = seq.into_session();
    let last = session.log.last().unwrap();
    assert!(!last.success);
    assert_eq!(vision.calls.len(), 7);
    Ok(())
}

#[test]
fn missing_clip_stops_before_processing() -> Result<()> {
    let bench = Bench::new()?;
    fs::remove_file(bench.clips().join("LeftCam.mp4"))?;
    let mut vision = FakeVision::new(&bench.config_path, centred_robot());

    let mut seq = bench.sequencer(bench.input(), &mut vision)?;
    let err = seq.run().unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::RecordingMissing {
            role: CameraRole::Left,
            ..
        }
    ));
    assert_eq!(seq.state(), SequencerState::AbortedError);
    drop(seq);
    assert!(vision.calls.is_empty());
    Ok(())
}

#[test]
fn steps_refuse_to_run_out_of_order() -> Result<()> {
    let bench = Bench::new()?;
    let mut vision = FakeVision::new(&bench.config_path, centred_robot());

    let mut seq = bench.sequencer(bench.input(), &mut vision)?;
    let err = seq.step_derive_ratio_offsets().unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::InvalidTransition {
            step: "derive_ratio_offset",
            state: SequencerState::Init,
        }
    ));
    assert!(matches!(
        seq.step_measure(),
        Err(CalibrationError::InvalidTransition { .. })
    ));
    // Rejected steps leave the state alone.
    assert_eq!(seq.state(), SequencerState::Init);
    seq.step_init()?;
    assert_eq!(seq.state(), SequencerState::IdMapping);
    Ok(())
}

#[test]
fn disconnected_camera_is_skipped() -> Result<()> {
    let bench = Bench::new()?;
    let mut config = bench.reload()?;
    config.set_param(ConfigGroup::CamParams, "connectedCameraFlag", json!([0, 1, 1]))?;
    config.persist(&bench.config_path)?;
    fs::remove_file(bench.clips().join("FrontCam.mp4"))?;

    let mut vision = FakeVision::new(&bench.config_path, centred_robot());
    let mut seq = bench.sequencer(bench.input(), &mut vision)?;
    assert!(seq.run()?.passed);

    let artifact: Value = serde_json::from_str(&seq.session().results.to_json("bot7")?)?;
    assert!(artifact["bot7"].get("front").is_none());
    assert!(artifact["bot7"].get("left").is_some());
    drop(seq);

    assert_eq!(vision.calls.len(), 6);
    assert!(vision.calls.iter().all(|(r, _)| r.role != CameraRole::Front));
    Ok(())
}

#[test]
fn detected_ids_are_written_to_the_config() -> Result<()> {
    let bench = Bench::new()?;
    let records = vec![
        DetectionRecord {
            serial_number: "SN-300".to_string(),
            marker_ids: vec![12],
        },
        DetectionRecord {
            serial_number: "SN-100".to_string(),
            marker_ids: vec![10],
        },
        DetectionRecord {
            serial_number: "SN-200".to_string(),
            marker_ids: vec![11],
        },
    ];
    let markers = MarkerAssignment {
        front: 10,
        right: 11,
        left: 12,
    };
    let input = bench.input().with_detections(records, markers);
    let mut vision = FakeVision::new(&bench.config_path, centred_robot());

    let mut seq = bench.sequencer(input, &mut vision)?;
    seq.step_init()?;
    seq.step_map_ids()?;
    assert_eq!(seq.state(), SequencerState::Recording);
    assert_eq!(seq.session().results.camera_id(CameraRole::Left), Some("SN-300"));

    let config = bench.reload()?;
    assert_eq!(config.camera_id(CameraRole::Front), "SN-100");
    assert_eq!(config.camera_id(CameraRole::Right), "SN-200");
    assert_eq!(config.camera_id(CameraRole::Left), "SN-300");
    Ok(())
}

#[test]
fn detection_missing_a_connected_role_aborts() -> Result<()> {
    let bench = Bench::new()?;
    let records = vec![DetectionRecord {
        serial_number: "SN-100".to_string(),
        marker_ids: vec![10],
    }];
    let markers = MarkerAssignment {
        front: 10,
        right: 11,
        left: 12,
    };
    let input = bench.input().with_detections(records, markers);
    let mut vision = FakeVision::new(&bench.config_path, centred_robot());

    let mut seq = bench.sequencer(input, &mut vision)?;
    let err = seq.run().unwrap_err();
    assert!(matches!(err, CalibrationError::Mapping(_)));
    assert_eq!(seq.state(), SequencerState::AbortedError);
    assert_eq!(bench.reload()?.camera_id(CameraRole::Front), "cfg-front");
    Ok(())
}
