//! Data models for Huddle

mod action;
mod comment;
mod group;
mod id;
mod item;
mod kind;
mod list;
mod note;
mod poll;
mod record;
mod sync_status;

pub use action::{Action, EntryId, EntryStatus, NewEntry, QueueEntry};
pub use comment::{Comment, CommentDraft};
pub use group::{Group, GroupDraft};
pub use id::{AuthorId, RecordId, ANONYMOUS_AUTHOR, TEMP_ID_PREFIX};
pub use item::{Item, ItemDraft};
pub use kind::{Cascade, EntityKind};
pub use list::{List, ListDraft};
pub use note::{Note, NoteDraft};
pub use poll::{Poll, PollDraft, PollOption};
pub use record::{AnyRecord, Draft, Record, RecordHeader, HEADER_COLUMNS};
pub use sync_status::SyncStatus;
