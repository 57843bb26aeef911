//! Per-camera results accumulated across the three measurement passes.
//!
//! Every numeric field is write-once: the first value stored wins and later
//! writes to the same field are ignored. Baseline values recorded in the first
//! pass therefore survive any later update that names the same field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{CameraRole, PerRole};

/// Numeric results for one camera. `None` until measured or derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CamResult {
    pub ratio_without_offset: Option<f64>,
    pub steering_angle_without_offset: Option<f64>,
    pub ratio_with_offset: Option<f64>,
    pub steering_angle_with_offset: Option<f64>,
    pub ratio_offset: Option<f64>,
    pub steering_offset: Option<f64>,
}

/// Addressable field of a [`CamResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultField {
    RatioWithoutOffset,
    SteeringAngleWithoutOffset,
    RatioWithOffset,
    SteeringAngleWithOffset,
    RatioOffset,
    SteeringOffset,
}

impl CamResult {
    pub fn get(&self, field: ResultField) -> Option<f64> {
        *self.slot(field)
    }

    fn slot(&self, field: ResultField) -> &Option<f64> {
        match field {
            ResultField::RatioWithoutOffset => &self.ratio_without_offset,
            ResultField::SteeringAngleWithoutOffset => &self.steering_angle_without_offset,
            ResultField::RatioWithOffset => &self.ratio_with_offset,
            ResultField::SteeringAngleWithOffset => &self.steering_angle_with_offset,
            ResultField::RatioOffset => &self.ratio_offset,
            ResultField::SteeringOffset => &self.steering_offset,
        }
    }

    fn slot_mut(&mut self, field: ResultField) -> &mut Option<f64> {
        match field {
            ResultField::RatioWithoutOffset => &mut self.ratio_without_offset,
            ResultField::SteeringAngleWithoutOffset => &mut self.steering_angle_without_offset,
            ResultField::RatioWithOffset => &mut self.ratio_with_offset,
            ResultField::SteeringAngleWithOffset => &mut self.steering_angle_with_offset,
            ResultField::RatioOffset => &mut self.ratio_offset,
            ResultField::SteeringOffset => &mut self.steering_offset,
        }
    }
}

/// One role's entry in the result artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub camera_id: Option<String>,
    pub ratio_without_offset: Option<f64>,
    pub steering_angle_without_offset: Option<f64>,
    pub ratio_offset: Option<f64>,
    pub steering_angle_offset: Option<f64>,
    pub ratio_with_offset: Option<f64>,
    pub steering_angle_with_offset: Option<f64>,
}

/// Result artifact: robot id → role key (`front`/`right`/`left`) → record.
pub type ResultArtifact = BTreeMap<String, BTreeMap<String, RoleRecord>>;

/// In-memory result record for one calibration run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResultStore {
    results: PerRole<CamResult>,
    camera_ids: PerRole<Option<String>>,
    connected: PerRole<bool>,
}

impl CalibrationResultStore {
    /// Empty store with every role connected.
    pub fn new() -> Self {
        Self::with_connected(PerRole([true; 3]))
    }

    /// Empty store; disconnected roles are left out of the artifact.
    pub fn with_connected(connected: PerRole<bool>) -> Self {
        Self {
            results: PerRole::default(),
            camera_ids: PerRole::default(),
            connected,
        }
    }

    /// Store `value` unless the field is already set.
    ///
    /// Returns `true` when the value was written.
    pub fn update_result(&mut self, role: CameraRole, field: ResultField, value: f64) -> bool {
        let slot = self.results[role].slot_mut(field);
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    pub fn set_camera_id(&mut self, role: CameraRole, id: impl Into<String>) {
        self.camera_ids[role] = Some(id.into());
    }

    pub fn camera_id(&self, role: CameraRole) -> Option<&str> {
        self.camera_ids[role].as_deref()
    }

    pub fn result(&self, role: CameraRole) -> &CamResult {
        &self.results[role]
    }

    pub fn is_connected(&self, role: CameraRole) -> bool {
        self.connected[role]
    }

    pub fn connected_roles(&self) -> impl Iterator<Item = CameraRole> + '_ {
        CameraRole::ALL
            .into_iter()
            .filter(|role| self.connected[*role])
    }

    pub fn to_artifact(&self, robot_id: &str) -> ResultArtifact {
        let roles = self
            .connected_roles()
            .map(|role| {
                let r = &self.results[role];
                let record = RoleRecord {
                    camera_id: self.camera_ids[role].clone(),
                    ratio_without_offset: r.ratio_without_offset,
                    steering_angle_without_offset: r.steering_angle_without_offset,
                    ratio_offset: r.ratio_offset,
                    steering_angle_offset: r.steering_offset,
                    ratio_with_offset: r.ratio_with_offset,
                    steering_angle_with_offset: r.steering_angle_with_offset,
                };
                (role.key_prefix().to_string(), record)
            })
            .collect();
        BTreeMap::from([(robot_id.to_string(), roles)])
    }

    /// Pretty-printed JSON artifact keyed by `robot_id`.
    pub fn to_json(&self, robot_id: &str) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_artifact(robot_id))
    }
}
