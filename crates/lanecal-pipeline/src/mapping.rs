//! Mapping physical cameras to roles from fiducial marker detections.
//!
//! Each role has a predefined marker id. A marker with that id is placed in
//! front of the camera that should take the role; the detector reports the
//! ids it saw in one frame of every camera, and this module turns those
//! reports into a role → camera serial number table.

use lanecal_core::{CameraRole, PerRole};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SharedConfig;

/// Marker ids seen in one frame of one physical camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub serial_number: String,
    #[serde(default)]
    pub marker_ids: Vec<i32>,
}

/// Predefined marker id of every role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerAssignment {
    pub front: i32,
    pub right: i32,
    pub left: i32,
}

impl MarkerAssignment {
    pub fn marker(&self, role: CameraRole) -> i32 {
        match role {
            CameraRole::Front => self.front,
            CameraRole::Right => self.right,
            CameraRole::Left => self.left,
        }
    }

    pub fn role_of(&self, marker_id: i32) -> Option<CameraRole> {
        CameraRole::ALL
            .into_iter()
            .find(|role| self.marker(*role) == marker_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("marker id {0} is assigned to more than one role")]
    AmbiguousAssignment(i32),
    #[error("camera {serial_number} sees more than one marker ({ids:?})")]
    MultipleMarkers {
        serial_number: String,
        ids: Vec<i32>,
    },
    #[error("camera {serial_number} sees no predefined marker")]
    Unmapped { serial_number: String },
    #[error("cameras {first} and {second} both map to the {role} role")]
    DuplicateRole {
        role: CameraRole,
        first: String,
        second: String,
    },
    #[error("no camera found for the connected {0} role")]
    MissingRole(CameraRole),
}

/// Camera serial number per role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraMap(pub PerRole<Option<String>>);

impl CameraMap {
    /// Ids already stored in the shared config, for runs that skip detection.
    pub fn from_config(config: &SharedConfig) -> Self {
        Self(PerRole::from_fn(|role| {
            Some(config.camera_id(role))
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        }))
    }

    pub fn get(&self, role: CameraRole) -> Option<&str> {
        self.0[role].as_deref()
    }

    /// Fail on the first connected role without a camera.
    pub fn require(&self, connected: &PerRole<bool>) -> Result<(), MappingError> {
        match CameraRole::ALL
            .into_iter()
            .find(|role| connected[*role] && self.0[*role].is_none())
        {
            Some(role) => Err(MappingError::MissingRole(role)),
            None => Ok(()),
        }
    }
}

/// Assign a role to every detection record.
pub fn map_camera_ids(
    records: &[DetectionRecord],
    markers: &MarkerAssignment,
) -> Result<CameraMap, MappingError> {
    for role in CameraRole::ALL {
        let id = markers.marker(role);
        if markers.role_of(id) != Some(role) {
            return Err(MappingError::AmbiguousAssignment(id));
        }
    }

    let mut map = CameraMap::default();
    for record in records {
        let role = match record.marker_ids.as_slice() {
            [id] => markers.role_of(*id),
            [] => None,
            ids => {
                return Err(MappingError::MultipleMarkers {
                    serial_number: record.serial_number.clone(),
                    ids: ids.to_vec(),
                });
            }
        };
        let Some(role) = role else {
            return Err(MappingError::Unmapped {
                serial_number: record.serial_number.clone(),
            });
        };
        if let Some(first) = &map.0[role] {
            return Err(MappingError::DuplicateRole {
                role,
                first: first.clone(),
                second: record.serial_number.clone(),
            });
        }
        debug!(
            "marker {} seen by {}",
            markers.marker(role),
            record.serial_number
        );
        map.0[role] = Some(record.serial_number.clone());
    }

    info!(
        "mapped camera ids: front={} right={} left={}",
        map.get(CameraRole::Front).unwrap_or("-"),
        map.get(CameraRole::Right).unwrap_or("-"),
        map.get(CameraRole::Left).unwrap_or("-"),
    );
    Ok(map)
}
