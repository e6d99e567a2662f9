//! Queue actions and entries

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    AuthorId, CommentDraft, EntityKind, GroupDraft, ItemDraft, ListDraft, NoteDraft, PollDraft,
    RecordId,
};

/// A pending mutation, one variant per action kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    CreateGroup(GroupDraft),
    CreateList(ListDraft),
    CreateItem(ItemDraft),
    CreateNote(NoteDraft),
    CreateComment(CommentDraft),
    CreatePoll(PollDraft),
    ToggleItem { checked: bool },
    CastVote { option: usize },
    UpdateOwnership { author_id: AuthorId },
    Delete,
}

impl Action {
    /// Stable name stored alongside the payload
    pub const fn action_type(&self) -> &'static str {
        match self {
            Self::CreateGroup(_) => "CREATE_GROUP",
            Self::CreateList(_) => "CREATE_LIST",
            Self::CreateItem(_) => "CREATE_ITEM",
            Self::CreateNote(_) => "CREATE_NOTE",
            Self::CreateComment(_) => "CREATE_COMMENT",
            Self::CreatePoll(_) => "CREATE_POLL",
            Self::ToggleItem { .. } => "TOGGLE_ITEM",
            Self::CastVote { .. } => "CAST_VOTE",
            Self::UpdateOwnership { .. } => "UPDATE_OWNERSHIP",
            Self::Delete => "DELETE",
        }
    }

    pub const fn is_create(&self) -> bool {
        matches!(
            self,
            Self::CreateGroup(_)
                | Self::CreateList(_)
                | Self::CreateItem(_)
                | Self::CreateNote(_)
                | Self::CreateComment(_)
                | Self::CreatePoll(_)
        )
    }

    /// Partial update body for in-place mutations.
    pub fn patch_body(&self) -> Option<serde_json::Value> {
        match self {
            Self::ToggleItem { checked } => Some(serde_json::json!({ "checked": checked })),
            Self::CastVote { option } => Some(serde_json::json!({ "vote": option })),
            Self::UpdateOwnership { author_id } => {
                Some(serde_json::json!({ "author_id": author_id }))
            }
            _ => None,
        }
    }
}

/// Queue entry identifier; increases with every append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Completed,
    /// Terminal: rejected by the server or out of attempts
    Failed,
}

impl EntryStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable record of one pending mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub action: Action,
    /// Kind of the record the action applies to
    pub subject_kind: EntityKind,
    /// Current id of the record the action applies to. Rewritten when the
    /// record is materialized.
    pub subject_id: RecordId,
    /// Temporary id assigned by the optimistic write (creates only)
    pub temp_id: Option<RecordId>,
    /// Entry that must complete before this one may run
    pub depends_on: Option<EntryId>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    pub status: EntryStatus,
    pub retry_count: u32,
    /// Earliest time (Unix ms) the next attempt may run
    pub next_attempt_at: Option<i64>,
    pub last_error: Option<String>,
}

/// Fields for appending a new entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub action: Action,
    pub subject_kind: EntityKind,
    pub subject_id: RecordId,
    pub temp_id: Option<RecordId>,
    pub depends_on: Option<EntryId>,
    pub created_at: i64,
}
