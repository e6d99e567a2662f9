//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

/// Apply a list of statements atomically
fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for stmt in statements {
        tx.execute(stmt, [])?;
    }
    tx.commit()?;
    Ok(())
}

/// Migration to version 1: one table per entity kind
///
/// Foreign keys are plain indexed columns rather than SQL constraints: a
/// child may point at a parent that only exists under a temporary id, and
/// materialization replaces the parent row before rewriting its children.
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                sync_status TEXT NOT NULL,
                last_synced_at INTEGER,
                name TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS lists (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                sync_status TEXT NOT NULL,
                last_synced_at INTEGER,
                group_id TEXT,
                title TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_lists_group ON lists(group_id)",
            "CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                sync_status TEXT NOT NULL,
                last_synced_at INTEGER,
                list_id TEXT NOT NULL,
                content TEXT NOT NULL,
                checked INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_items_list ON items(list_id)",
            "CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                sync_status TEXT NOT NULL,
                last_synced_at INTEGER,
                list_id TEXT NOT NULL,
                body TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_notes_list ON notes(list_id)",
            "CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                sync_status TEXT NOT NULL,
                last_synced_at INTEGER,
                item_id TEXT NOT NULL,
                body TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_comments_item ON comments(item_id)",
            "CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                sync_status TEXT NOT NULL,
                last_synced_at INTEGER,
                list_id TEXT NOT NULL,
                question TEXT NOT NULL,
                options TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_polls_list ON polls(list_id)",
            "CREATE INDEX IF NOT EXISTS idx_groups_status ON groups(sync_status)",
            "CREATE INDEX IF NOT EXISTS idx_lists_status ON lists(sync_status)",
            "CREATE INDEX IF NOT EXISTS idx_items_status ON items(sync_status)",
            "CREATE INDEX IF NOT EXISTS idx_notes_status ON notes(sync_status)",
            "CREATE INDEX IF NOT EXISTS idx_comments_status ON comments(sync_status)",
            "CREATE INDEX IF NOT EXISTS idx_polls_status ON polls(sync_status)",
            "CREATE INDEX IF NOT EXISTS idx_groups_author ON groups(author_id)",
            "CREATE INDEX IF NOT EXISTS idx_lists_author ON lists(author_id)",
            "CREATE INDEX IF NOT EXISTS idx_items_author ON items(author_id)",
            "CREATE INDEX IF NOT EXISTS idx_notes_author ON notes(author_id)",
            "CREATE INDEX IF NOT EXISTS idx_comments_author ON comments(author_id)",
            "CREATE INDEX IF NOT EXISTS idx_polls_author ON polls(author_id)",
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: durable sync queue
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS sync_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                subject_kind TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                temp_id TEXT,
                depends_on INTEGER,
                created_at INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                retry_count INTEGER NOT NULL DEFAULT 0,
                next_attempt_at INTEGER,
                last_error TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_queue_status ON sync_queue(status, created_at, id)",
            "CREATE INDEX IF NOT EXISTS idx_sync_queue_subject ON sync_queue(subject_kind, subject_id)",
            "CREATE INDEX IF NOT EXISTS idx_sync_queue_temp ON sync_queue(temp_id)",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
