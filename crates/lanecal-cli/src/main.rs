use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use gethostname::gethostname;
use lanecal_pipeline::{
    CalibrationInput, CalibrationSequencer, CalibrationSession, ConfigGroup, DetectionRecord,
    ExecutableRunner, MarkerAssignment, SequencerSettings, SharedConfig, report,
};
use log::{info, warn};
use serde_json::json;

/// Lane-offset calibration for the front, right and left cameras of a robot.
#[derive(Debug, Parser)]
#[command(author, version, about = "Three-camera lane-offset calibration")]
struct Args {
    /// Shared CameraStartUpJson document; created from the stock template if missing.
    #[arg(long)]
    json_path: PathBuf,

    /// Offline vision executable: a path, or a bare name looked up in PATH.
    #[arg(long)]
    build: PathBuf,

    /// Directory holding FrontCam.mp4, RightCam.mp4 and LeftCam.mp4.
    #[arg(long)]
    clips_dir: PathBuf,

    /// Directory for vision logs and the result artifact. Defaults to the clips directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Robot id used to name the result artifact. Defaults to the hostname.
    #[arg(long)]
    bot_id: Option<String>,

    /// BotType written to CamParams (1: camera on FRP, 2: raised FRP with metal plate).
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..=2))]
    bot_type: Option<i64>,

    /// LaneColourToScan written to CamParams.
    #[arg(long)]
    lane_colour: Option<i64>,

    /// Lane width in centimetres written to DebugParams.PathWidth.
    #[arg(long)]
    path_width: Option<f64>,

    /// JSON list of `{serial_number, marker_ids}`, one per physical camera.
    #[arg(long, required_unless_present = "skip_camera_id_mapping")]
    detections: Option<PathBuf>,

    /// Keep the camera ids already stored in the shared config.
    #[arg(long, conflicts_with = "detections")]
    skip_camera_id_mapping: bool,

    #[arg(long, default_value_t = 0)]
    front_marker_id: i32,

    #[arg(long, default_value_t = 1)]
    right_marker_id: i32,

    #[arg(long, default_value_t = 2)]
    left_marker_id: i32,

    /// Optional JSON SequencerSettings (targets and acceptance bands).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Copy the shared config to CameraStartUpJson_bkp_<unix>.json before changing it.
    #[arg(long)]
    backup: bool,

    /// Free-text note stored with the session, e.g. the bay or the operator.
    #[arg(long)]
    description: Option<String>,

    /// Write the session (measurements and step log) to this file.
    #[arg(long)]
    session_out: Option<PathBuf>,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_settings(path: Option<&Path>) -> Result<SequencerSettings> {
    let settings = match path {
        Some(path) => load_json_file::<SequencerSettings>(path)?,
        None => SequencerSettings::default(),
    };
    settings.validate()?;
    Ok(settings)
}

/// Hostnames look like `<robot>-C<controller>`; keep the robot part.
fn normalise_hostname(raw: &str) -> Option<String> {
    let name = raw.trim().split('C').next()?.trim_matches('-');
    (!name.is_empty()).then(|| name.to_string())
}

fn resolve_robot_id(explicit: Option<&str>, hostname: Option<&OsStr>) -> String {
    if let Some(id) = explicit {
        return id.to_string();
    }
    hostname
        .and_then(OsStr::to_str)
        .and_then(normalise_hostname)
        .unwrap_or_else(|| {
            warn!("cannot read the hostname, naming the robot \"unknown\"");
            "unknown".to_string()
        })
}

/// Write operator-supplied fields into the shared config. Returns whether anything changed.
fn apply_overrides(config: &mut SharedConfig, args: &Args) -> Result<bool> {
    let mut changed = false;
    if let Some(bot_type) = args.bot_type {
        config.set_param(ConfigGroup::CamParams, "BotType", json!(bot_type))?;
        changed = true;
    }
    if let Some(colour) = args.lane_colour {
        config.set_param(ConfigGroup::CamParams, "LaneColourToScan", json!(colour))?;
        changed = true;
    }
    if let Some(width) = args.path_width {
        if !(width.is_finite() && width > 0.0) {
            bail!("--path-width must be a positive number of centimetres (got {width})");
        }
        config.set_param(ConfigGroup::DebugParams, "PathWidth", json!(width))?;
        changed = true;
    }
    Ok(changed)
}

fn calibration_input(args: &Args) -> Result<CalibrationInput> {
    let data_dir = args.data_dir.clone().unwrap_or_else(|| args.clips_dir.clone());
    let input = CalibrationInput::new(&args.clips_dir, data_dir);
    let Some(path) = args.detections.as_deref() else {
        return Ok(input);
    };
    let records: Vec<DetectionRecord> = load_json_file(path)?;
    let markers = MarkerAssignment {
        front: args.front_marker_id,
        right: args.right_marker_id,
        left: args.left_marker_id,
    };
    Ok(input.with_detections(records, markers))
}

fn new_session(
    args: &Args,
    robot_id: String,
    input: CalibrationInput,
    settings: SequencerSettings,
) -> CalibrationSession {
    let session = CalibrationSession::new(robot_id, input, settings);
    match &args.description {
        Some(description) => session.with_description(description.as_str()),
        None => session,
    }
}

fn main() {
    match try_main() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether every camera passed the final verdict.
fn try_main() -> Result<bool> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let settings = load_settings(args.settings.as_deref())?;
    let mut config = SharedConfig::load_or_create(&args.json_path)?;
    if args.backup {
        let dir = args
            .json_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        config.backup_to(dir)?;
    }
    if apply_overrides(&mut config, &args)? {
        config.persist(&args.json_path)?;
    }

    let hostname = gethostname();
    let robot_id = resolve_robot_id(args.bot_id.as_deref(), Some(hostname.as_os_str()));
    let runner = ExecutableRunner::new(&args.build)?.with_progress(!args.no_progress);
    let input = calibration_input(&args)?;
    let data_dir = input.data_dir.clone();
    let session = new_session(&args, robot_id, input, settings);

    let mut sequencer = CalibrationSequencer::new(session, config, &args.json_path, runner)?;
    let result = sequencer.run();

    let session = sequencer.session();
    if !session.state.mounting.is_empty() {
        println!("{}", report::mounting_table(&session.state.mounting, &session.results));
    }
    if let Some(path) = &args.session_out {
        let json = session.to_json()?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!("session written to {}", path.display());
    }

    let outcome = result?;
    println!("{}", report::result_table(&session.results, Some(&outcome)));
    sequencer.write_result_artifact(&data_dir)?;
    Ok(outcome.passed)
}
