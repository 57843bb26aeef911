//! The shared `CameraStartUpJson` document read by the robot's vision runtime.
//!
//! Only the fields this tool reads or writes are typed. Everything else in the
//! document is kept in `extra` maps and written back untouched.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lanecal_core::{CameraRole, PerRole};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tempfile::NamedTempFile;

use crate::error::CalibrationError;
use crate::session::current_timestamp;

type Result<T> = std::result::Result<T, CalibrationError>;

/// Top-level parameter groups of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigGroup {
    Header,
    CamParams,
    DebugParams,
}

impl ConfigGroup {
    pub fn key(self) -> &'static str {
        match self {
            ConfigGroup::Header => "Header",
            ConfigGroup::CamParams => "CamParams",
            ConfigGroup::DebugParams => "DebugParams",
        }
    }
}

/// `CamParams[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamParams {
    #[serde(default)]
    pub right_side_camera_offset: f64,
    #[serde(default)]
    pub left_side_camera_offset: f64,
    #[serde(default)]
    pub front_side_steering_offset: f64,
    #[serde(default)]
    pub right_side_steering_offset: f64,
    #[serde(default)]
    pub left_side_steering_offset: f64,
    #[serde(default)]
    pub front_camera_id: String,
    #[serde(default)]
    pub right_camera_id: String,
    #[serde(default)]
    pub left_camera_id: String,
    /// `[front, right, left]`, non-zero when the camera is fitted.
    #[serde(default = "all_connected")]
    pub connected_camera_flag: [u8; 3],
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `DebugParams[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DebugParams {
    #[serde(default)]
    pub host_commn_flag: i64,
    #[serde(default)]
    pub hybrid_switch: bool,
    #[serde(default)]
    pub select_camera_for_offline_mode: u8,
    /// Physical lane width in centimetres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_width: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn all_connected() -> [u8; 3] {
    [1, 1, 1]
}

/// In-memory copy of the shared config. Mutators only touch memory;
/// [`SharedConfig::persist`] writes the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(rename = "Header", default)]
    header: Vec<Map<String, Value>>,
    #[serde(rename = "CamParams")]
    cam_params: Vec<CamParams>,
    #[serde(rename = "DebugParams")]
    debug_params: Vec<DebugParams>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl SharedConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Stock document for a robot that has never been configured.
    pub fn template() -> Self {
        Self {
            header: vec![object(json!({
                "BOT_ID": "Bot1",
                "Config_TimeStamp": current_timestamp(),
            }))],
            cam_params: vec![CamParams {
                right_side_camera_offset: 0.0,
                left_side_camera_offset: 0.0,
                front_side_steering_offset: 0.0,
                right_side_steering_offset: 0.0,
                left_side_steering_offset: 0.0,
                front_camera_id: String::new(),
                right_camera_id: String::new(),
                left_camera_id: String::new(),
                connected_camera_flag: all_connected(),
                extra: object(json!({
                    "serial_port": "/dev/ttyAMA0",
                    "BotType": 0,
                    "EnableHostRatioBasedRejection": 0,
                    "EnableBlankFactorBasedMasking": 0,
                    "FrontCameraOffsetDistance": 54,
                    "SideCameraOffsetDistance": 0,
                    "LaneColourToScan": 0,
                })),
            }],
            debug_params: vec![DebugParams {
                host_commn_flag: 0,
                hybrid_switch: false,
                select_camera_for_offline_mode: 1,
                path_width: Some(0.0),
                extra: object(json!({
                    "ShowImageDebug": 0,
                    "ShowImageRelease": 0,
                    "LogImageDebug": 0,
                    "LogImageFrameRatioDiffMin": 0.08,
                    "TARGET_FPS": 10,
                    "EnableGrouping": 0,
                    "GroupingThreshold": 20,
                    "GroupingNumberOfLinesWeight": 0.2,
                    "GroupingDistanceWeight": -0.6,
                    "GroupingSumOfLengths": 0.2,
                    "VisualizeBestGroup": 0,
                })),
            }],
            extra: Map::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        if config.cam_params.is_empty() || config.debug_params.is_empty() {
            return Err(CalibrationError::Configuration(
                "CamParams and DebugParams must each hold one entry".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(CalibrationError::io(path))?;
        let config = Self::from_json(&text)?;
        debug!("loaded shared config from {}", path.display());
        Ok(config)
    }

    /// Load `path`, or write and return the template when it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let config = Self::template();
                config.persist(path)?;
                info!("{} not found, created it from template", path.display());
                Ok(config)
            }
            Err(err) => Err(CalibrationError::io(path)(err)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(|err| CalibrationError::Configuration(err.to_string()))
    }

    /// Rewrite the whole document at `path`.
    ///
    /// The new content goes to a temporary file in the same directory which
    /// is then renamed over `path`, so readers see either the old or the new
    /// document. The replaced file keeps its permissions; a new file is
    /// readable by everyone, like one written in place.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let text = self.to_json()?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(CalibrationError::io(dir))?;
        if let Some(permissions) = target_permissions(path) {
            tmp.as_file()
                .set_permissions(permissions)
                .map_err(CalibrationError::io(tmp.path()))?;
        }
        tmp.write_all(text.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(CalibrationError::io(tmp.path()))?;
        tmp.persist(path)
            .map_err(|err| CalibrationError::io(path)(err.error))?;
        debug!("persisted shared config to {}", path.display());
        Ok(())
    }

    /// Write a copy named `CameraStartUpJson_bkp_<unix-seconds>.json` into `dir`.
    pub fn backup_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!(
            "CameraStartUpJson_bkp_{}.json",
            current_timestamp()
        ));
        self.persist(&path)?;
        info!("backed up shared config to {}", path.display());
        Ok(path)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Typed access
    // ─────────────────────────────────────────────────────────────────────────

    pub fn cam_params(&self) -> &CamParams {
        &self.cam_params[0]
    }

    pub fn debug_params(&self) -> &DebugParams {
        &self.debug_params[0]
    }

    /// Path width in centimetres; must be a positive finite number.
    pub fn path_width(&self) -> Result<f64> {
        match self.debug_params().path_width {
            Some(width) if width.is_finite() && width > 0.0 => Ok(width),
            Some(width) => Err(CalibrationError::Configuration(format!(
                "DebugParams.PathWidth must be a positive number of centimetres (got {width})"
            ))),
            None => Err(CalibrationError::Configuration(
                "DebugParams.PathWidth is missing".to_string(),
            )),
        }
    }

    pub fn connected_roles(&self) -> PerRole<bool> {
        let flags = self.cam_params().connected_camera_flag;
        PerRole::from_fn(|role| flags[role.index()] != 0)
    }

    pub fn camera_id(&self, role: CameraRole) -> &str {
        let cam = self.cam_params();
        match role {
            CameraRole::Front => &cam.front_camera_id,
            CameraRole::Right => &cam.right_camera_id,
            CameraRole::Left => &cam.left_camera_id,
        }
    }

    /// Lateral offset of a side camera, `None` for the front camera.
    pub fn ratio_offset(&self, role: CameraRole) -> Option<f64> {
        let cam = self.cam_params();
        match role {
            CameraRole::Front => None,
            CameraRole::Right => Some(cam.right_side_camera_offset),
            CameraRole::Left => Some(cam.left_side_camera_offset),
        }
    }

    pub fn steering_offset(&self, role: CameraRole) -> f64 {
        let cam = self.cam_params();
        match role {
            CameraRole::Front => cam.front_side_steering_offset,
            CameraRole::Right => cam.right_side_steering_offset,
            CameraRole::Left => cam.left_side_steering_offset,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Zero every side-camera and steering offset.
    pub fn reset_offsets(&mut self) {
        let cam = &mut self.cam_params[0];
        cam.right_side_camera_offset = 0.0;
        cam.left_side_camera_offset = 0.0;
        cam.front_side_steering_offset = 0.0;
        cam.right_side_steering_offset = 0.0;
        cam.left_side_steering_offset = 0.0;
    }

    /// Set `*SideCameraOffset`. The front camera has no such field; the call is ignored.
    pub fn set_ratio_offset(&mut self, role: CameraRole, value: f64) {
        let cam = &mut self.cam_params[0];
        match role {
            CameraRole::Front => {}
            CameraRole::Right => cam.right_side_camera_offset = value,
            CameraRole::Left => cam.left_side_camera_offset = value,
        }
    }

    pub fn set_steering_offset(&mut self, role: CameraRole, value: f64) {
        let cam = &mut self.cam_params[0];
        match role {
            CameraRole::Front => cam.front_side_steering_offset = value,
            CameraRole::Right => cam.right_side_steering_offset = value,
            CameraRole::Left => cam.left_side_steering_offset = value,
        }
    }

    pub fn set_camera_id(&mut self, role: CameraRole, id: impl Into<String>) {
        let cam = &mut self.cam_params[0];
        let slot = match role {
            CameraRole::Front => &mut cam.front_camera_id,
            CameraRole::Right => &mut cam.right_camera_id,
            CameraRole::Left => &mut cam.left_camera_id,
        };
        *slot = id.into();
    }

    /// Point the vision executable at `role`'s clip, with host communication off.
    pub fn prepare_offline_run(&mut self, role: CameraRole) {
        let debug = &mut self.debug_params[0];
        debug.select_camera_for_offline_mode = role.offline_mode();
        debug.host_commn_flag = 0;
        debug.hybrid_switch = false;
    }

    /// Set an arbitrary field of a group's first entry.
    ///
    /// Typed fields are accepted too; the value must then have the right JSON type.
    pub fn set_param(&mut self, group: ConfigGroup, key: &str, value: Value) -> Result<()> {
        match group {
            ConfigGroup::Header => {
                if self.header.is_empty() {
                    self.header.push(Map::new());
                }
                self.header[0].insert(key.to_string(), value);
            }
            ConfigGroup::CamParams => {
                self.cam_params[0] = with_field(&self.cam_params[0], key, value)?;
            }
            ConfigGroup::DebugParams => {
                self.debug_params[0] = with_field(&self.debug_params[0], key, value)?;
            }
        }
        debug!("set {}.{key}", group.key());
        Ok(())
    }

    /// Value of a field of a group's first entry, typed or not.
    pub fn param(&self, group: ConfigGroup, key: &str) -> Option<Value> {
        let entry = match group {
            ConfigGroup::Header => self.header.first().map(|h| Value::Object(h.clone())),
            ConfigGroup::CamParams => serde_json::to_value(self.cam_params()).ok(),
            ConfigGroup::DebugParams => serde_json::to_value(self.debug_params()).ok(),
        }?;
        entry.get(key).cloned()
    }
}

/// Round-trip `entry` through JSON with `key` replaced, so typed fields stay typed.
fn with_field<T>(entry: &T, key: &str, value: Value) -> Result<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut map = match serde_json::to_value(entry)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert(key.to_string(), value);
    Ok(serde_json::from_value(Value::Object(map))?)
}

/// Permissions the persisted document should carry.
///
/// Temporary files are created owner-only, which would lock the vision
/// runtime out of its own config.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        #[cfg(unix)]
        Err(_) => {
            use std::os::unix::fs::PermissionsExt;
            Some(fs::Permissions::from_mode(0o644))
        }
        #[cfg(not(unix))]
        Err(_) => None,
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Header": [{"BOT_ID": "AGV12", "Config_TimeStamp": 1700000000}],
        "CamParams": [{
            "serial_port": "/dev/ttyAMA0",
            "BotType": 2,
            "rightSideCameraOffset": 3.5,
            "leftSideCameraOffset": -1.25,
            "frontCameraId": "F1",
            "rightCameraId": "R1",
            "leftCameraId": "L1",
            "connectedCameraFlag": [1, 1, 1],
            "leftSideSteeringOffset": 2,
            "rightSideSteeringOffset": -3,
            "frontSideSteeringOffset": 1
        }],
        "DebugParams": [{
            "HostCommnFlag": 1,
            "HybridSwitch": true,
            "SelectCameraForOfflineMode": 0,
            "PathWidth": 60,
            "GroupingDistanceWeight": -0.6,
            "TARGET_FPS": 10
        }],
        "Vendor": {"note": "kept"}
    }"#;

    #[test]
    fn opaque_fields_survive_round_trip() {
        let config = SharedConfig::from_json(SAMPLE).unwrap();
        let written: Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(written["CamParams"][0]["BotType"], 2);
        assert_eq!(written["CamParams"][0]["serial_port"], "/dev/ttyAMA0");
        assert_eq!(written["DebugParams"][0]["GroupingDistanceWeight"], -0.6);
        assert_eq!(written["DebugParams"][0]["TARGET_FPS"], 10);
        assert_eq!(written["Header"][0]["BOT_ID"], "AGV12");
        assert_eq!(written["Vendor"]["note"], "kept");
        assert_eq!(written["CamParams"][0]["rightSideCameraOffset"], 3.5);
    }

    #[test]
    fn reset_zeroes_all_offsets() {
        let mut config = SharedConfig::from_json(SAMPLE).unwrap();
        config.reset_offsets();
        for role in CameraRole::ALL {
            assert_eq!(config.steering_offset(role), 0.0);
            assert!(config.ratio_offset(role).is_none_or(|v| v == 0.0));
        }
    }

    #[test]
    fn prepare_offline_run_selects_camera() {
        let mut config = SharedConfig::from_json(SAMPLE).unwrap();
        config.prepare_offline_run(CameraRole::Left);
        let debug = config.debug_params();
        assert_eq!(debug.select_camera_for_offline_mode, 2);
        assert_eq!(debug.host_commn_flag, 0);
        assert!(!debug.hybrid_switch);
    }

    #[test]
    fn path_width_must_be_positive() {
        let config = SharedConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.path_width().unwrap(), 60.0);

        let template = SharedConfig::template();
        assert!(matches!(
            template.path_width(),
            Err(CalibrationError::Configuration(_))
        ));
    }

    #[test]
    fn set_param_handles_typed_and_opaque_keys() {
        let mut config = SharedConfig::template();
        config
            .set_param(ConfigGroup::CamParams, "LaneColourToScan", json!(3))
            .unwrap();
        config
            .set_param(ConfigGroup::DebugParams, "PathWidth", json!(72.5))
            .unwrap();
        assert_eq!(
            config.param(ConfigGroup::CamParams, "LaneColourToScan"),
            Some(json!(3))
        );
        assert_eq!(config.path_width().unwrap(), 72.5);
        assert!(
            config
                .set_param(ConfigGroup::DebugParams, "HybridSwitch", json!("yes"))
                .is_err()
        );
    }

    #[test]
    fn persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CameraStartUpJson.json");

        let mut config = SharedConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        config.set_ratio_offset(CameraRole::Right, 6.0);
        config.set_steering_offset(CameraRole::Front, -2.0);
        config.set_camera_id(CameraRole::Right, "CAM-R");
        config.persist(&path).unwrap();

        let reloaded = SharedConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(reloaded.ratio_offset(CameraRole::Right), Some(6.0));
        assert_eq!(reloaded.camera_id(CameraRole::Right), "CAM-R");

        let backup = reloaded.backup_to(dir.path()).unwrap();
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("CameraStartUpJson_bkp_"));
        assert_eq!(SharedConfig::load(&backup).unwrap(), config);
    }

    #[cfg(unix)]
    #[test]
    fn persist_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CameraStartUpJson.json");
        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;

        let mut config = SharedConfig::load_or_create(&path).unwrap();
        assert_eq!(mode(&path), 0o644);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o664)).unwrap();
        config.set_steering_offset(CameraRole::Left, 1.5);
        config.persist(&path).unwrap();
        assert_eq!(mode(&path), 0o664);
        assert_eq!(
            SharedConfig::load(&path).unwrap().steering_offset(CameraRole::Left),
            1.5
        );
    }

    #[test]
    fn missing_groups_are_rejected() {
        let err = SharedConfig::from_json(r#"{"CamParams": [], "DebugParams": [{}]}"#).unwrap_err();
        assert!(matches!(err, CalibrationError::Configuration(_)));
    }

    #[test]
    fn disconnected_front_camera() {
        let mut config = SharedConfig::template();
        config
            .set_param(ConfigGroup::CamParams, "connectedCameraFlag", json!([0, 1, 1]))
            .unwrap();
        let connected = config.connected_roles();
        assert!(!connected[CameraRole::Front]);
        assert!(connected[CameraRole::Right]);
    }
}
