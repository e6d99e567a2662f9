//! Temporary-to-server identity swap with cascading foreign keys.

use rusqlite::Connection;

use crate::db::queue::QueueRepository;
use crate::db::records::RecordRepository;
use crate::error::Result;
use crate::models::{QueueEntry, RecordId, SyncStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Materialized {
    pub server_id: RecordId,
    pub children_rewritten: usize,
    pub entries_repointed: usize,
}

/// Replace the row created by `entry` with one keyed by `server_id`.
///
/// Must run inside the caller's transaction: the temp row, the new row, every
/// child foreign key, and the queue bookkeeping change together or not at all.
/// Returns `None` when the temp row has vanished; the entry is still completed.
pub(crate) fn materialize(
    conn: &Connection,
    entry: &QueueEntry,
    server_id: &RecordId,
    now: i64,
) -> Result<Option<Materialized>> {
    let kind = entry.subject_kind;
    let temp_id = entry.temp_id.as_ref().unwrap_or(&entry.subject_id);
    let records = RecordRepository::new(conn);
    let queue = QueueRepository::new(conn);

    queue.mark_completed(entry.id)?;

    let Some(mut record) = records.get_any(kind, temp_id)? else {
        tracing::warn!("{kind} {temp_id} disappeared before materialization");
        return Ok(None);
    };

    records.delete(kind, temp_id)?;
    let entries_repointed = queue.repoint_subject(kind, temp_id, server_id)?;
    let still_pending = queue.has_pending_for(kind, server_id)?;

    let header = record.header_mut();
    header.id = server_id.clone();
    header.sync_status = if still_pending {
        SyncStatus::PendingUpdate
    } else {
        SyncStatus::Synced
    };
    header.last_synced_at = Some(now);
    records.put_any(&record)?;

    let children_rewritten = records.repoint_children(kind, temp_id, server_id)?;

    Ok(Some(Materialized {
        server_id: server_id.clone(),
        children_rewritten,
        entries_repointed,
    }))
}
