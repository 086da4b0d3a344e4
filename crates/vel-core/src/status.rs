//! # Sync Status Types
//!
//! Snapshot of the orchestrator's state, as read by the frontend.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │        sync_all()                      cycle finished                   │
//! │   Idle ───────────► Syncing ──────────────────────► Idle                │
//! │                        │                                                │
//! │                        │ sync_all() while Syncing → skipped, no fetch   │
//! │                        ▼                                                │
//! │                     (no-op)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Phase of the full-sync state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SyncPhase {
    /// No full sync is running.
    #[default]
    Idle,

    /// A full sync holds the in-progress flag.
    Syncing,
}

impl SyncPhase {
    /// Returns true while a full sync is running.
    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncPhase::Syncing)
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::Syncing => write!(f, "syncing"),
        }
    }
}

/// Status reported by `get_sync_status`.
///
/// Staleness of the cache is only observable through
/// `last_sync_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SyncStatus {
    /// Checkpoint in epoch milliseconds; `0` before the first successful sync.
    #[ts(type = "number")]
    pub last_sync_timestamp: i64,

    /// Whether a full sync currently holds the in-progress flag.
    pub sync_in_progress: bool,

    /// Current state machine phase.
    pub phase: SyncPhase,

    /// Configured collections whose cache is non-empty.
    pub cached_collections: Vec<String>,

    /// Whether the auto-sync timer is running.
    pub auto_sync_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_default() {
        let status = SyncStatus::default();
        assert_eq!(status.phase, SyncPhase::Idle);
        assert!(!status.sync_in_progress);
        assert!(status.cached_collections.is_empty());
    }

    #[test]
    fn test_status_json_uses_camel_case() {
        let status = SyncStatus {
            last_sync_timestamp: 1_700_000_000_000,
            sync_in_progress: true,
            phase: SyncPhase::Syncing,
            cached_collections: vec!["banners".into()],
            auto_sync_enabled: false,
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["lastSyncTimestamp"], 1_700_000_000_000_i64);
        assert_eq!(json["syncInProgress"], true);
        assert_eq!(json["phase"], "syncing");
        assert_eq!(json["cachedCollections"][0], "banners");
    }
}
