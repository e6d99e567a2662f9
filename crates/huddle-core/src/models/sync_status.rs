//! Per-record sync status

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a record stands relative to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never synchronized
    Local,
    /// Awaiting first creation on the server
    PendingUpload,
    /// Known to the server, awaiting a patch
    PendingUpdate,
    /// Matches the last known server state
    #[default]
    Synced,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::PendingUpload => "pending_upload",
            Self::PendingUpdate => "pending_update",
            Self::Synced => "synced",
        }
    }

    /// Pending records are protected from being overwritten by pulled data.
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::PendingUpload | Self::PendingUpdate)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "pending_upload" => Ok(Self::PendingUpload),
            "pending_update" => Ok(Self::PendingUpdate),
            "synced" => Ok(Self::Synced),
            other => Err(format!("unknown sync status '{other}'")),
        }
    }
}

impl ToSql for SyncStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SyncStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}
