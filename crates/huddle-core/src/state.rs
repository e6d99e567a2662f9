//! Shared cross-platform state types.

use crate::db::QueueStats;

/// Unified sync state shown by clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}

impl SyncState {
    /// Derive the state from connectivity and the queue's status counts.
    pub const fn from_queue(online: bool, stats: &QueueStats) -> Self {
        if !online {
            Self::Offline
        } else if stats.failed > 0 {
            Self::Error
        } else if stats.pending > 0 {
            Self::Syncing
        } else {
            Self::Synced
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}
