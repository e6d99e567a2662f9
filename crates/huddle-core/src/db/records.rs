//! Generic record repository over the per-kind tables

use std::collections::HashSet;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{
    AnyRecord, Comment, EntityKind, Group, Item, List, Note, Poll, Record, RecordHeader,
    RecordId, SyncStatus, HEADER_COLUMNS,
};

/// Column list for a kind: the shared header followed by its own fields.
fn columns<R: Record>() -> String {
    HEADER_COLUMNS
        .iter()
        .chain(R::FIELDS.iter())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_row<R: Record>(row: &rusqlite::Row<'_>) -> rusqlite::Result<R> {
    let header = RecordHeader::from_row(row)?;
    R::from_row(header, row, HEADER_COLUMNS.len())
}

/// `SQLite` access to synchronized records of every kind
pub struct RecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> RecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace a record by primary key
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let mut values = record.header().values();
        values.extend(record.field_values()?);

        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({placeholders})",
            R::KIND.table(),
            columns::<R>(),
        );
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    /// Get a record by id, including soft-deleted rows
    pub fn get<R: Record>(&self, id: &RecordId) -> Result<Option<R>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            columns::<R>(),
            R::KIND.table()
        );
        let record = self
            .conn
            .query_row(&sql, params![id], parse_row::<R>)
            .optional()?;
        Ok(record)
    }

    /// Live (not soft-deleted) records whose `foreign_key` equals `parent`
    pub fn children<R: Record>(&self, foreign_key: &str, parent: &RecordId) -> Result<Vec<R>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {foreign_key} = ? AND is_deleted = 0 ORDER BY created_at, id",
            columns::<R>(),
            R::KIND.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![parent], parse_row::<R>)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// All live records of a kind, oldest first
    pub fn all<R: Record>(&self) -> Result<Vec<R>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE is_deleted = 0 ORDER BY created_at, id",
            columns::<R>(),
            R::KIND.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], parse_row::<R>)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn get_any(&self, kind: EntityKind, id: &RecordId) -> Result<Option<AnyRecord>> {
        Ok(match kind {
            EntityKind::Group => self.get::<Group>(id)?.map(Into::into),
            EntityKind::List => self.get::<List>(id)?.map(Into::into),
            EntityKind::Item => self.get::<Item>(id)?.map(Into::into),
            EntityKind::Note => self.get::<Note>(id)?.map(Into::into),
            EntityKind::Comment => self.get::<Comment>(id)?.map(Into::into),
            EntityKind::Poll => self.get::<Poll>(id)?.map(Into::into),
        })
    }

    pub fn put_any(&self, record: &AnyRecord) -> Result<()> {
        match record {
            AnyRecord::Group(record) => self.put(record),
            AnyRecord::List(record) => self.put(record),
            AnyRecord::Item(record) => self.put(record),
            AnyRecord::Note(record) => self.put(record),
            AnyRecord::Comment(record) => self.put(record),
            AnyRecord::Poll(record) => self.put(record),
        }
    }

    /// Hard-delete a single row. Returns the number of rows removed.
    pub fn delete(&self, kind: EntityKind, id: &RecordId) -> Result<usize> {
        let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
        Ok(self.conn.execute(&sql, params![id])?)
    }

    /// Hard-delete a record and everything below it in the cascade tree
    pub fn delete_tree(&self, kind: EntityKind, id: &RecordId) -> Result<usize> {
        let mut removed = 0;
        for cascade in kind.cascades() {
            let sql = format!(
                "SELECT id FROM {} WHERE {} = ?",
                cascade.child.table(),
                cascade.foreign_key
            );
            let child_ids = {
                let mut stmt = self.conn.prepare(&sql)?;
                let ids = stmt
                    .query_map(params![id], |row| row.get::<_, RecordId>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                ids
            };
            for child_id in child_ids {
                removed += self.delete_tree(cascade.child, &child_id)?;
            }
        }
        removed += self.delete(kind, id)?;
        Ok(removed)
    }

    /// Rewrite every child foreign key equal to `old` so it points at `new`
    pub fn repoint_children(&self, kind: EntityKind, old: &RecordId, new: &RecordId) -> Result<usize> {
        let mut rewritten = 0;
        for cascade in kind.cascades() {
            let sql = format!(
                "UPDATE {} SET {fk} = ?1 WHERE {fk} = ?2",
                cascade.child.table(),
                fk = cascade.foreign_key
            );
            rewritten += self.conn.execute(&sql, params![new, old])?;
        }
        Ok(rewritten)
    }

    pub fn set_sync_status(&self, kind: EntityKind, id: &RecordId, status: SyncStatus) -> Result<()> {
        let sql = format!("UPDATE {} SET sync_status = ? WHERE id = ?", kind.table());
        self.conn.execute(&sql, params![status, id])?;
        Ok(())
    }

    /// Flip a `pending_update` row back to `synced` after its last patch landed
    pub fn mark_synced(&self, kind: EntityKind, id: &RecordId, now: i64) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET sync_status = ?1, last_synced_at = ?2 WHERE id = ?3 AND sync_status = ?4",
            kind.table()
        );
        let updated = self.conn.execute(
            &sql,
            params![SyncStatus::Synced, now, id, SyncStatus::PendingUpdate],
        )?;
        Ok(updated > 0)
    }

    /// Ids of rows with unsynced local changes
    pub fn pending_ids(&self, kind: EntityKind) -> Result<HashSet<RecordId>> {
        let sql = format!(
            "SELECT id FROM {} WHERE sync_status IN (?, ?)",
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(
                params![SyncStatus::PendingUpload, SyncStatus::PendingUpdate],
                |row| row.get(0),
            )?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    /// Ids and statuses of rows owned by `author`, including soft-deleted rows
    pub fn owned_by(&self, kind: EntityKind, author: &str) -> Result<Vec<(RecordId, SyncStatus)>> {
        let sql = format!(
            "SELECT id, sync_status FROM {} WHERE author_id = ? ORDER BY created_at, id",
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![author], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Reassign authorship of every row owned by `from`
    pub fn reassign_author(&self, kind: EntityKind, from: &str, to: &str, now: i64) -> Result<usize> {
        let sql = format!(
            "UPDATE {} SET author_id = ?1, updated_at = ?2 WHERE author_id = ?3",
            kind.table()
        );
        Ok(self.conn.execute(&sql, params![to, now, from])?)
    }
}
