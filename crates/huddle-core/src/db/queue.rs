//! Durable sync queue storage

use std::collections::HashSet;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{Action, EntityKind, EntryId, EntryStatus, NewEntry, QueueEntry, RecordId};

const ENTRY_COLUMNS: &str = "id, payload, subject_kind, subject_id, temp_id, depends_on, \
                             created_at, status, retry_count, next_attempt_at, last_error";

/// Entry counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

fn conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

fn parse_entry(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    let payload: String = row.get(1)?;
    let action: Action = serde_json::from_str(&payload)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(error)))?;
    let subject_kind: String = row.get(2)?;
    let status: String = row.get(7)?;

    Ok(QueueEntry {
        id: EntryId(row.get(0)?),
        action,
        subject_kind: subject_kind
            .parse()
            .map_err(|error| conversion_error(2, error))?,
        subject_id: row.get(3)?,
        temp_id: row.get(4)?,
        depends_on: row.get::<_, Option<i64>>(5)?.map(EntryId),
        created_at: row.get(6)?,
        status: EntryStatus::parse(&status)
            .ok_or_else(|| conversion_error(7, format!("unknown entry status '{status}'")))?,
        retry_count: row.get(8)?,
        next_attempt_at: row.get(9)?,
        last_error: row.get(10)?,
    })
}

/// `SQLite` access to the `sync_queue` table
pub struct QueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> QueueRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append a pending entry
    pub fn append(&self, entry: &NewEntry) -> Result<EntryId> {
        let payload = serde_json::to_string(&entry.action)?;
        self.conn.execute(
            "INSERT INTO sync_queue (action_type, payload, subject_kind, subject_id, temp_id, depends_on, created_at, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.action.action_type(),
                payload,
                entry.subject_kind.as_str(),
                entry.subject_id,
                entry.temp_id,
                entry.depends_on.map(|id| id.0),
                entry.created_at,
                EntryStatus::Pending.as_str(),
            ],
        )?;
        Ok(EntryId(self.conn.last_insert_rowid()))
    }

    pub fn get(&self, id: EntryId) -> Result<Option<QueueEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE id = ?"),
                params![id.0],
                parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn list_by_status(&self, status: EntryStatus) -> Result<Vec<QueueEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE status = ? ORDER BY created_at, id"
        ))?;
        let entries = stmt
            .query_map(params![status.as_str()], parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Pending entries in processing order
    pub fn pending(&self) -> Result<Vec<QueueEntry>> {
        self.list_by_status(EntryStatus::Pending)
    }

    /// Entries in terminal failure, oldest first
    pub fn failed(&self) -> Result<Vec<QueueEntry>> {
        self.list_by_status(EntryStatus::Failed)
    }

    pub fn status_of(&self, id: EntryId) -> Result<Option<EntryStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM sync_queue WHERE id = ?",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.as_deref().and_then(EntryStatus::parse))
    }

    /// Most recent pending entry for a subject
    pub fn latest_pending_for(&self, kind: EntityKind, subject: &RecordId) -> Result<Option<EntryId>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM sync_queue
                 WHERE subject_kind = ? AND subject_id = ? AND status = 'pending'
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![kind.as_str(), subject],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(EntryId))
    }

    /// The create entry that introduced `temp_id`, whatever its status
    pub fn create_entry_for(&self, temp_id: &RecordId) -> Result<Option<EntryId>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM sync_queue WHERE temp_id = ? ORDER BY id DESC LIMIT 1",
                params![temp_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(EntryId))
    }

    pub fn has_pending_for(&self, kind: EntityKind, subject: &RecordId) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sync_queue WHERE subject_kind = ? AND subject_id = ? AND status = 'pending')",
            params![kind.as_str(), subject],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Subjects of a kind with pending entries
    pub fn pending_subjects(&self, kind: EntityKind) -> Result<HashSet<RecordId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT subject_id FROM sync_queue WHERE subject_kind = ? AND status = 'pending'",
        )?;
        let ids = stmt
            .query_map(params![kind.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    pub fn mark_completed(&self, id: EntryId) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_queue SET status = 'completed', next_attempt_at = NULL, last_error = NULL WHERE id = ?",
            params![id.0],
        )?;
        Ok(())
    }

    /// Keep the entry pending and push its next attempt out
    pub fn schedule_retry(
        &self,
        id: EntryId,
        retry_count: u32,
        next_attempt_at: i64,
        error: &str,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_queue SET retry_count = ?, next_attempt_at = ?, last_error = ? WHERE id = ?",
            params![retry_count, next_attempt_at, error, id.0],
        )?;
        Ok(())
    }

    pub fn mark_failed(&self, id: EntryId, retry_count: u32, error: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_queue SET status = 'failed', retry_count = ?, next_attempt_at = NULL, last_error = ? WHERE id = ?",
            params![retry_count, error, id.0],
        )?;
        Ok(())
    }

    /// Fail every pending entry for a subject that no longer exists locally
    pub fn fail_pending_for(&self, kind: EntityKind, subject: &RecordId, error: &str) -> Result<usize> {
        let failed = self.conn.execute(
            "UPDATE sync_queue SET status = 'failed', next_attempt_at = NULL, last_error = ?
             WHERE subject_kind = ? AND subject_id = ? AND status = 'pending'",
            params![error, kind.as_str(), subject],
        )?;
        Ok(failed)
    }

    /// Point unfinished entries for `old` at `new`
    pub fn repoint_subject(&self, kind: EntityKind, old: &RecordId, new: &RecordId) -> Result<usize> {
        let updated = self.conn.execute(
            "UPDATE sync_queue SET subject_id = ?
             WHERE subject_kind = ? AND subject_id = ? AND status != 'completed'",
            params![new, kind.as_str(), old],
        )?;
        Ok(updated)
    }

    /// Reset failed entries to pending with a fresh attempt budget
    pub fn retry_failed(&self) -> Result<usize> {
        let reset = self.conn.execute(
            "UPDATE sync_queue SET status = 'pending', retry_count = 0, next_attempt_at = NULL, last_error = NULL
             WHERE status = 'failed'",
            [],
        )?;
        Ok(reset)
    }

    /// Remove completed entries. Dependencies on removed entries count as satisfied.
    pub fn prune_completed(&self) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM sync_queue WHERE status = 'completed'", [])?;
        Ok(removed)
    }

    pub fn stats(&self) -> Result<QueueStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM sync_queue GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = QueueStats::default();
        for row in rows {
            let (status, count) = row?;
            let count = usize::try_from(count).unwrap_or_default();
            match EntryStatus::parse(&status) {
                Some(EntryStatus::Pending) => stats.pending = count,
                Some(EntryStatus::Completed) => stats.completed = count,
                Some(EntryStatus::Failed) => stats.failed = count,
                None => {}
            }
        }
        Ok(stats)
    }
}
