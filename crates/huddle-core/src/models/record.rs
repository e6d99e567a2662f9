//! Shared record shape and the traits every entity implements

use rusqlite::types::Value;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    Action, AuthorId, Comment, EntityKind, Group, Item, List, Note, Poll, RecordId, SyncStatus,
};
use crate::error::{Error, Result};

/// Columns every entity table starts with, in bind order.
pub const HEADER_COLUMNS: [&str; 7] = [
    "id",
    "author_id",
    "created_at",
    "updated_at",
    "is_deleted",
    "sync_status",
    "last_synced_at",
];

/// Fields shared by every record.
///
/// `sync_status` and `last_synced_at` are local bookkeeping: they are never
/// sent to the server, and records decoded from server payloads start out as
/// `synced`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub id: RecordId,
    pub author_id: AuthorId,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete flag for sync
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub sync_status: SyncStatus,
    #[serde(skip)]
    pub last_synced_at: Option<i64>,
}

impl RecordHeader {
    /// Header for a record born on the optimistic write path.
    #[must_use]
    pub const fn pending_upload(id: RecordId, author_id: AuthorId, now: i64) -> Self {
        Self {
            id,
            author_id,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            sync_status: SyncStatus::PendingUpload,
            last_synced_at: None,
        }
    }

    /// Record a local edit: bump `updated_at` and flag synced rows for a patch.
    pub fn touch(&mut self, now: i64) {
        self.updated_at = now;
        if self.sync_status == SyncStatus::Synced {
            self.sync_status = SyncStatus::PendingUpdate;
        }
    }

    pub(crate) fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.author_id.to_string()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
            Value::Integer(i64::from(self.is_deleted)),
            Value::Text(self.sync_status.as_str().to_string()),
            self.last_synced_at.map_or(Value::Null, Value::Integer),
        ]
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author_id: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            is_deleted: row.get::<_, i64>(4)? != 0,
            sync_status: row.get(5)?,
            last_synced_at: row.get(6)?,
        })
    }
}

/// A synchronized entity stored in its own table.
pub trait Record:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Into<AnyRecord> + 'static
{
    const KIND: EntityKind;
    /// Kind-specific columns, in bind order, following [`HEADER_COLUMNS`].
    const FIELDS: &'static [&'static str];

    fn header(&self) -> &RecordHeader;
    fn header_mut(&mut self) -> &mut RecordHeader;

    /// Foreign key to the parent record, if this kind has one.
    fn parent_id(&self) -> Option<&RecordId>;

    fn field_values(&self) -> Result<Vec<Value>>;

    /// Build the record from a row whose kind-specific columns start at `offset`.
    fn from_row(header: RecordHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self>;
}

/// User-supplied fields for a record that doesn't exist yet.
pub trait Draft: Clone + Send + 'static {
    type Record: Record;

    /// Foreign key to the parent record, if any.
    fn parent_id(&self) -> Option<&RecordId>;

    fn validate(&self) -> Result<()>;

    fn into_record(self, header: RecordHeader) -> Self::Record;

    /// The queue action that creates this record on the server.
    fn into_action(self) -> Action;
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::InvalidInput(format!("{field} cannot be empty")))
    } else {
        Ok(())
    }
}

pub(crate) fn optional_id_value(id: Option<&RecordId>) -> Value {
    id.map_or(Value::Null, |id| Value::Text(id.to_string()))
}

macro_rules! any_record {
    ($($variant:ident),+ $(,)?) => {
        /// A record of any kind, used where the kind is only known at runtime.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(untagged)]
        pub enum AnyRecord {
            $($variant($variant)),+
        }

        impl AnyRecord {
            pub const fn kind(&self) -> EntityKind {
                match self {
                    $(Self::$variant(_) => <$variant as Record>::KIND),+
                }
            }

            pub fn header(&self) -> &RecordHeader {
                match self {
                    $(Self::$variant(record) => record.header()),+
                }
            }

            pub fn header_mut(&mut self) -> &mut RecordHeader {
                match self {
                    $(Self::$variant(record) => record.header_mut()),+
                }
            }

            pub fn parent_id(&self) -> Option<&RecordId> {
                match self {
                    $(Self::$variant(record) => record.parent_id()),+
                }
            }

            /// Decode a server payload for a known kind.
            pub fn from_json(kind: EntityKind, value: serde_json::Value) -> Result<Self> {
                match kind {
                    $(EntityKind::$variant => Ok(Self::$variant(serde_json::from_value(value)?))),+
                }
            }
        }

        $(
            impl From<$variant> for AnyRecord {
                fn from(record: $variant) -> Self {
                    Self::$variant(record)
                }
            }
        )+
    };
}

any_record!(Group, List, Item, Note, Comment, Poll);
