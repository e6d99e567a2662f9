//! Queue processor: pushes pending entries in creation order.

use std::time::Duration;

use super::materialize::materialize;
use super::{RemoteApi, RemoteError, Session, SyncEngine};
use crate::db::queue::QueueRepository;
use crate::db::records::RecordRepository;
use crate::error::Result;
use crate::models::{Action, AnyRecord, EntityKind, EntryId, EntryStatus, QueueEntry, RecordId};
use crate::util::unix_millis_now;

/// An entry that reached the terminal `failed` state during a drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub entry_id: EntryId,
    pub action_type: String,
    pub subject_kind: EntityKind,
    pub subject_id: RecordId,
    pub error: String,
}

impl FailedEntry {
    fn new(entry: &QueueEntry, error: impl Into<String>) -> Self {
        Self {
            entry_id: entry.id,
            action_type: entry.action.action_type().to_string(),
            subject_kind: entry.subject_kind,
            subject_id: entry.subject_id.clone(),
            error: error.into(),
        }
    }
}

/// What one drain did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries that reached the network
    pub attempted: usize,
    pub completed: usize,
    /// Transient failures scheduled for a later attempt
    pub retried: usize,
    /// Skipped this pass: backoff window, or an unfinished dependency
    pub deferred: usize,
    /// Records force-reconciled after the server reported them gone
    pub reconciled: usize,
    pub failed: Vec<FailedEntry>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.retried == 0
    }
}

enum Outcome {
    Completed,
    Deferred,
    Retried,
    Reconciled,
    Failed(String),
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl SyncEngine {
    /// Push pending entries. A no-op while offline or without a remote.
    pub async fn drain(&self, session: &Session) -> Result<DrainReport> {
        self.drain_at(session, unix_millis_now()).await
    }

    pub(crate) async fn drain_at(&self, session: &Session, now: i64) -> Result<DrainReport> {
        let Some(remote) = self.reachable_remote() else {
            tracing::debug!("Skipping drain: offline");
            return Ok(DrainReport::default());
        };
        let _guard = self.drain_lock.lock().await;

        let ids: Vec<EntryId> = self
            .store
            .read(|conn| {
                Ok(QueueRepository::new(conn)
                    .pending()?
                    .into_iter()
                    .map(|entry| entry.id)
                    .collect())
            })
            .await?;

        let mut report = DrainReport::default();
        for id in ids {
            if !self.is_online() {
                tracing::info!("Connectivity lost; stopping drain");
                break;
            }

            // Earlier entries in this pass may have changed or failed this one.
            let Some(entry) = self
                .store
                .read(|conn| QueueRepository::new(conn).get(id))
                .await?
            else {
                continue;
            };
            if entry.status != EntryStatus::Pending {
                continue;
            }

            match self.process(remote.as_ref(), session, &entry, now, &mut report).await? {
                Outcome::Completed => report.completed += 1,
                Outcome::Deferred => report.deferred += 1,
                Outcome::Retried => report.retried += 1,
                Outcome::Reconciled => report.reconciled += 1,
                Outcome::Failed(error) => {
                    tracing::warn!(
                        "Entry {} ({} {}) failed: {}",
                        entry.id,
                        entry.action.action_type(),
                        entry.subject_id,
                        error
                    );
                    report.failed.push(FailedEntry::new(&entry, error));
                }
            }
        }

        tracing::info!(
            "Drain finished: {} attempted, {} completed, {} retried, {} deferred, {} failed",
            report.attempted,
            report.completed,
            report.retried,
            report.deferred,
            report.failed.len()
        );
        Ok(report)
    }

    async fn process(
        &self,
        remote: &dyn RemoteApi,
        session: &Session,
        entry: &QueueEntry,
        now: i64,
        report: &mut DrainReport,
    ) -> Result<Outcome> {
        if entry.next_attempt_at.is_some_and(|at| at > now) {
            return Ok(Outcome::Deferred);
        }

        if let Some(dependency) = entry.depends_on {
            let status = self
                .store
                .read(|conn| QueueRepository::new(conn).status_of(dependency))
                .await?;
            match status {
                Some(EntryStatus::Pending) => return Ok(Outcome::Deferred),
                Some(EntryStatus::Failed) => {
                    let error = format!("dependency {dependency} failed");
                    self.fail(entry, entry.retry_count, &error).await?;
                    return Ok(Outcome::Failed(error));
                }
                // Completed, or pruned after completing
                Some(EntryStatus::Completed) | None => {}
            }
        }

        tracing::debug!("Processing entry {} ({})", entry.id, entry.action.action_type());
        if entry.action.is_create() {
            self.push_create(remote, session, entry, now, report).await
        } else {
            self.push_mutation(remote, session, entry, now, report).await
        }
    }

    async fn push_create(
        &self,
        remote: &dyn RemoteApi,
        session: &Session,
        entry: &QueueEntry,
        now: i64,
        report: &mut DrainReport,
    ) -> Result<Outcome> {
        let temp_id = entry.temp_id.clone().unwrap_or_else(|| entry.subject_id.clone());

        // Build the payload from the row as it is now, not as it was queued.
        let fresh = self
            .store
            .read(|conn| RecordRepository::new(conn).get_any(entry.subject_kind, &temp_id))
            .await?;
        let Some(mut record) = fresh else {
            let error = format!("{} {temp_id} was removed before upload", entry.subject_kind);
            self.fail(entry, entry.retry_count, &error).await?;
            return Ok(Outcome::Failed(error));
        };
        if record.parent_id().is_some_and(RecordId::is_temporary) {
            return Ok(Outcome::Deferred);
        }
        // Local votes are uploaded by their own CAST_VOTE entries.
        if let AnyRecord::Poll(poll) = &mut record {
            poll.clear_votes();
        }

        report.attempted += 1;
        match remote.create(session, &record).await {
            Ok(created) => {
                let server_id = created.header().id.clone();
                let materialized = self
                    .store
                    .write(|tx| materialize(tx, entry, &server_id, now))
                    .await?;
                if let Some(done) = materialized {
                    tracing::debug!(
                        "Materialized {} {temp_id} as {} ({} children, {} entries repointed)",
                        entry.subject_kind,
                        done.server_id,
                        done.children_rewritten,
                        done.entries_repointed
                    );
                }
                Ok(Outcome::Completed)
            }
            // The collection itself is missing: nothing to reconcile against.
            Err(RemoteError::Gone) => {
                let error = RemoteError::Gone.to_string();
                self.fail(entry, entry.retry_count, &error).await?;
                Ok(Outcome::Failed(error))
            }
            Err(error) => self.handle_failure(entry, error, now).await,
        }
    }

    async fn push_mutation(
        &self,
        remote: &dyn RemoteApi,
        session: &Session,
        entry: &QueueEntry,
        now: i64,
        report: &mut DrainReport,
    ) -> Result<Outcome> {
        let kind = entry.subject_kind;
        let subject = &entry.subject_id;
        if subject.is_temporary() {
            return Ok(Outcome::Deferred);
        }

        report.attempted += 1;
        let result = match &entry.action {
            Action::Delete => match remote.delete(session, kind, subject).await {
                // Already gone on the server counts as deleted.
                Ok(()) | Err(RemoteError::Gone) => Ok(()),
                Err(error) => Err(error),
            },
            action => match action.patch_body() {
                Some(body) => remote.update(session, kind, subject, &body).await,
                None => Err(RemoteError::InvalidPayload(format!(
                    "{} has no patch body",
                    action.action_type()
                ))),
            },
        };

        match result {
            Ok(()) if matches!(entry.action, Action::Delete) => {
                self.store
                    .write(|tx| {
                        let removed = RecordRepository::new(tx).delete_tree(kind, subject)?;
                        let queue = QueueRepository::new(tx);
                        queue.mark_completed(entry.id)?;
                        queue.fail_pending_for(kind, subject, "record was deleted")?;
                        tracing::debug!("Deleted {kind} {subject} ({removed} rows)");
                        Ok(())
                    })
                    .await?;
                Ok(Outcome::Completed)
            }
            Ok(()) => {
                self.store
                    .write(|tx| {
                        QueueRepository::new(tx).mark_completed(entry.id)?;
                        if !QueueRepository::new(tx).has_pending_for(kind, subject)? {
                            RecordRepository::new(tx).mark_synced(kind, subject, now)?;
                        }
                        Ok(())
                    })
                    .await?;
                Ok(Outcome::Completed)
            }
            Err(RemoteError::Gone) => {
                self.store
                    .write(|tx| {
                        RecordRepository::new(tx).delete_tree(kind, subject)?;
                        let queue = QueueRepository::new(tx);
                        queue.mark_completed(entry.id)?;
                        queue.fail_pending_for(kind, subject, "record no longer exists on the server")?;
                        Ok(())
                    })
                    .await?;
                tracing::info!("{kind} {subject} is gone on the server; removed locally");
                Ok(Outcome::Reconciled)
            }
            Err(error) => self.handle_failure(entry, error, now).await,
        }
    }

    /// Backoff for transient errors, terminal failure for everything else.
    async fn handle_failure(&self, entry: &QueueEntry, error: RemoteError, now: i64) -> Result<Outcome> {
        let message = error.to_string();
        if !error.is_transient() {
            self.fail(entry, entry.retry_count, &message).await?;
            return Ok(Outcome::Failed(message));
        }

        let attempt = entry.retry_count.saturating_add(1);
        let retry = self.config.retry;
        if retry.is_exhausted(attempt) {
            let error = format!("gave up after {attempt} attempts: {message}");
            self.fail(entry, attempt, &error).await?;
            return Ok(Outcome::Failed(error));
        }

        let next_attempt_at = now.saturating_add(millis(retry.backoff_for(attempt)));
        self.store
            .write(|tx| {
                QueueRepository::new(tx).schedule_retry(entry.id, attempt, next_attempt_at, &message)
            })
            .await?;
        tracing::warn!(
            "Entry {} failed (attempt {attempt}), retrying at {next_attempt_at}: {message}",
            entry.id
        );
        Ok(Outcome::Retried)
    }

    async fn fail(&self, entry: &QueueEntry, retry_count: u32, error: &str) -> Result<()> {
        self.store
            .write(|tx| QueueRepository::new(tx).mark_failed(entry.id, retry_count, error))
            .await
    }

    /// Entries in terminal failure, oldest first
    pub async fn failed_entries(&self) -> Result<Vec<QueueEntry>> {
        self.store
            .read(|conn| QueueRepository::new(conn).failed())
            .await
    }

    /// Entries still waiting to be pushed, in processing order
    pub async fn pending_entries(&self) -> Result<Vec<QueueEntry>> {
        self.store
            .read(|conn| QueueRepository::new(conn).pending())
            .await
    }

    /// Put every failed entry back in line with a fresh attempt budget.
    pub async fn retry_failed(&self) -> Result<usize> {
        let reset = self
            .store
            .write(|tx| QueueRepository::new(tx).retry_failed())
            .await?;
        tracing::info!("Reset {reset} failed entries to pending");
        Ok(reset)
    }

    /// Drop completed entries from the audit trail.
    pub async fn prune_completed(&self) -> Result<usize> {
        let _guard = self.drain_lock.lock().await;
        self.store
            .write(|tx| QueueRepository::new(tx).prune_completed())
            .await
    }
}
