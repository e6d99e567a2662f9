//! Pull/merge reconciler.

use rusqlite::Connection;

use super::{Session, SyncEngine};
use crate::db::queue::QueueRepository;
use crate::db::records::RecordRepository;
use crate::error::Result;
use crate::models::{AnyRecord, EntityKind, SyncStatus};
use crate::util::unix_millis_now;

/// Merge counts for one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPull {
    pub kind: EntityKind,
    /// Server records written locally
    pub pulled: usize,
    /// Server records left alone: local changes pending, or an invalid id
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub kinds: Vec<KindPull>,
    /// Kinds whose snapshot could not be fetched this pass
    pub failed_kinds: Vec<(EntityKind, String)>,
}

impl PullReport {
    pub fn pulled(&self) -> usize {
        self.kinds.iter().map(|kind| kind.pulled).sum()
    }

    pub fn skipped(&self) -> usize {
        self.kinds.iter().map(|kind| kind.skipped).sum()
    }

    pub fn for_kind(&self, kind: EntityKind) -> Option<&KindPull> {
        self.kinds.iter().find(|pull| pull.kind == kind)
    }
}

/// Fold one kind's server snapshot into the local table.
///
/// Rows with unsent local changes win until their entries are acknowledged.
/// Local rows missing from the snapshot are kept.
fn merge_snapshot(
    conn: &Connection,
    kind: EntityKind,
    snapshot: Vec<AnyRecord>,
    now: i64,
) -> Result<KindPull> {
    let records = RecordRepository::new(conn);
    let mut protected = records.pending_ids(kind)?;
    protected.extend(QueueRepository::new(conn).pending_subjects(kind)?);

    let mut pull = KindPull {
        kind,
        pulled: 0,
        skipped: 0,
    };
    for mut record in snapshot {
        let id = &record.header().id;
        if record.kind() != kind || id.is_temporary() || protected.contains(id) {
            pull.skipped += 1;
            continue;
        }

        let header = record.header_mut();
        header.sync_status = SyncStatus::Synced;
        header.last_synced_at = Some(now);
        records.put_any(&record)?;
        pull.pulled += 1;
    }
    Ok(pull)
}

impl SyncEngine {
    /// Fetch server state per kind, parents first, and merge it.
    pub async fn pull(&self, session: &Session) -> Result<PullReport> {
        let Some(remote) = self.reachable_remote() else {
            tracing::debug!("Skipping pull: offline");
            return Ok(PullReport::default());
        };
        let _guard = self.drain_lock.lock().await;

        let mut report = PullReport::default();
        for kind in EntityKind::ALL {
            let snapshot = match remote.fetch_all(session, kind).await {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    tracing::warn!("Failed to pull {kind} records: {error}");
                    report.failed_kinds.push((kind, error.to_string()));
                    continue;
                }
            };

            let now = unix_millis_now();
            let pull = self
                .store
                .write(move |tx| merge_snapshot(tx, kind, snapshot, now))
                .await?;
            report.kinds.push(pull);
        }

        tracing::info!(
            "Pull finished: {} records merged, {} skipped",
            report.pulled(),
            report.skipped()
        );
        Ok(report)
    }
}
