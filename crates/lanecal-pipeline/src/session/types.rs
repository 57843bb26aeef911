//! Session metadata and audit log types.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Metadata about a calibration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Robot being calibrated; keys the result artifact.
    pub robot_id: String,

    /// Unix timestamp when session was created (seconds since epoch).
    pub created_at: u64,

    /// Unix timestamp when session was last modified (seconds since epoch).
    pub last_modified: u64,

    /// Optional operator-provided description.
    pub description: Option<String>,
}

impl SessionMetadata {
    pub fn new(robot_id: impl Into<String>) -> Self {
        let now = current_timestamp();
        Self {
            robot_id: robot_id.into(),
            created_at: now,
            last_modified: now,
            description: None,
        }
    }

    /// Update the last_modified timestamp to now.
    pub fn touch(&mut self) {
        self.last_modified = current_timestamp();
    }
}

/// Lightweight operation log entry.
///
/// Audit trail of the steps run on a session, written into the session dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp of the operation (seconds since epoch).
    pub timestamp: u64,

    /// Step name (e.g. "init", "measure_stage0").
    pub operation: String,

    pub success: bool,

    /// Optional notes or error message.
    pub notes: Option<String>,
}

impl LogEntry {
    pub fn success(operation: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: true,
            notes: None,
        }
    }

    pub fn success_with_notes(operation: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::success(operation)
        }
    }

    pub fn failure(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: false,
            notes: Some(error.into()),
        }
    }
}

/// Current Unix timestamp in seconds; 0 if the clock is before the epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_new() {
        let meta = SessionMetadata::new("AGV12");
        assert_eq!(meta.robot_id, "AGV12");
        assert!(meta.created_at > 0);
        assert_eq!(meta.created_at, meta.last_modified);
        assert!(meta.description.is_none());
    }

    #[test]
    fn log_entries() {
        let ok = LogEntry::success_with_notes("measure_stage0", "front: ratio=0.500");
        assert!(ok.success);
        assert_eq!(ok.notes.as_deref(), Some("front: ratio=0.500"));

        let failed = LogEntry::failure("derive_ratio_offset", "mounting out of range");
        assert!(!failed.success);
        assert_eq!(failed.operation, "derive_ratio_offset");
    }
}
