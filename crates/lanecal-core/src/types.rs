//! Camera roles, measurement stages and per-role storage.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Logical role of a physical camera on the robot.
///
/// The front camera looks along the path and only carries a steering offset.
/// The side cameras see the lane boundary from opposite sides and carry both
/// a lateral ratio offset and a steering offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraRole {
    Front,
    Right,
    Left,
}

impl CameraRole {
    /// All roles in processing order.
    pub const ALL: [CameraRole; 3] = [CameraRole::Front, CameraRole::Right, CameraRole::Left];

    /// Slot of this role in a [`PerRole`] array.
    pub fn index(self) -> usize {
        match self {
            CameraRole::Front => 0,
            CameraRole::Right => 1,
            CameraRole::Left => 2,
        }
    }

    /// Value of `SelectCameraForOfflineMode` that makes the vision executable
    /// process a clip of this camera.
    pub fn offline_mode(self) -> u8 {
        self.index() as u8
    }

    /// Lowercase key prefix used in the shared config (`rightSideCameraOffset`).
    pub fn key_prefix(self) -> &'static str {
        match self {
            CameraRole::Front => "front",
            CameraRole::Right => "right",
            CameraRole::Left => "left",
        }
    }

    /// Capitalised name used for file names and reports.
    pub fn label(self) -> &'static str {
        match self {
            CameraRole::Front => "Front",
            CameraRole::Right => "Right",
            CameraRole::Left => "Left",
        }
    }

    /// File name of the recorded clip for this camera.
    pub fn clip_file_name(self) -> String {
        format!("{}Cam.mp4", self.label())
    }

    /// Whether a lateral ratio offset applies to this camera.
    pub fn has_ratio_offset(self) -> bool {
        !matches!(self, CameraRole::Front)
    }
}

impl fmt::Display for CameraRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One of the three measurement passes.
///
/// The ordinal is the pass index and selects the log file name set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CalibrationStage {
    /// Baseline: all offsets forced to zero.
    WithoutOffset = 0,
    /// Ratio offsets applied, steering offsets still zero.
    RatioOffsetOnly = 1,
    /// Both offsets applied; verification pass.
    RatioAndSteeringOffset = 2,
}

impl CalibrationStage {
    pub const ALL: [CalibrationStage; 3] = [
        CalibrationStage::WithoutOffset,
        CalibrationStage::RatioOffsetOnly,
        CalibrationStage::RatioAndSteeringOffset,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Name of the log file the vision executable writes for `role` in this stage.
    pub fn log_file_name(self, role: CameraRole) -> String {
        let suffix = match self {
            CalibrationStage::WithoutOffset => "",
            CalibrationStage::RatioOffsetOnly => "RatioOffset",
            CalibrationStage::RatioAndSteeringOffset => "WithOffset",
        };
        format!("{}CamLog{}.txt", role.label(), suffix)
    }
}

impl fmt::Display for CalibrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalibrationStage::WithoutOffset => "without offset",
            CalibrationStage::RatioOffsetOnly => "ratio offset only",
            CalibrationStage::RatioAndSteeringOffset => "ratio and steering offset",
        };
        write!(f, "stage {} ({})", self.index(), name)
    }
}

/// Mean lane ratio and steering angle extracted from one run of the vision executable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSample {
    /// Lateral lane position as a fraction of the path width (0.5 = centred).
    pub ratio: f64,
    /// Current steering angle in degrees (90 = straight).
    pub steering_angle: f64,
}

impl MeasurementSample {
    pub fn new(ratio: f64, steering_angle: f64) -> Self {
        Self {
            ratio,
            steering_angle,
        }
    }
}

/// Fixed-size storage with one slot per [`CameraRole`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerRole<T>(pub [T; 3]);

impl<T> PerRole<T> {
    pub fn from_fn(mut f: impl FnMut(CameraRole) -> T) -> Self {
        Self([
            f(CameraRole::Front),
            f(CameraRole::Right),
            f(CameraRole::Left),
        ])
    }

    pub fn get(&self, role: CameraRole) -> &T {
        &self.0[role.index()]
    }

    pub fn get_mut(&mut self, role: CameraRole) -> &mut T {
        &mut self.0[role.index()]
    }

    /// Iterate `(role, value)` pairs in [`CameraRole::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (CameraRole, &T)> {
        CameraRole::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<CameraRole> for PerRole<T> {
    type Output = T;

    fn index(&self, role: CameraRole) -> &T {
        self.get(role)
    }
}

impl<T> IndexMut<CameraRole> for PerRole<T> {
    fn index_mut(&mut self, role: CameraRole) -> &mut T {
        self.get_mut(role)
    }
}
