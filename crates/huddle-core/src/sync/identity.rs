//! Anonymous-to-authenticated ownership transfer at login.

use rusqlite::Connection;

use super::{Session, SyncEngine};
use crate::auth::{AuthSession, SessionPersistence};
use crate::db::queue::QueueRepository;
use crate::db::records::RecordRepository;
use crate::error::{Error, Result};
use crate::models::{Action, AuthorId, EntityKind, NewEntry, SyncStatus};
use crate::util::unix_millis_now;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionReport {
    /// Rows whose author changed
    pub reassigned: usize,
    /// Rows already on the server that were queued for an ownership patch
    pub ownership_updates: usize,
}

/// Reassign every row owned by `from` to `to` inside the caller's transaction.
fn transfer_ownership(
    conn: &Connection,
    from: &AuthorId,
    to: &AuthorId,
    now: i64,
) -> Result<TransitionReport> {
    let records = RecordRepository::new(conn);
    let queue = QueueRepository::new(conn);
    let mut report = TransitionReport::default();

    for kind in EntityKind::ALL {
        let owned = records.owned_by(kind, from.as_str())?;
        report.reassigned += records.reassign_author(kind, from.as_str(), to.as_str(), now)?;

        for (id, status) in owned {
            if status == SyncStatus::Local {
                continue;
            }
            records.set_sync_status(kind, &id, SyncStatus::PendingUpdate)?;
            // Not on the server yet: the queued create re-reads the new author.
            if id.is_temporary() {
                continue;
            }
            let depends_on = queue.latest_pending_for(kind, &id)?;
            queue.append(&NewEntry {
                action: Action::UpdateOwnership {
                    author_id: to.clone(),
                },
                subject_kind: kind,
                subject_id: id,
                temp_id: None,
                depends_on,
                created_at: now,
            })?;
            report.ownership_updates += 1;
        }
    }
    Ok(report)
}

impl SyncEngine {
    /// Adopt a freshly signed-in session.
    ///
    /// When `previous` was anonymous, every anonymous-owned record moves to the
    /// new user and the credential is persisted inside one transaction. If
    /// either step fails nothing changes locally, the new credential is
    /// discarded and [`Error::IdentityTransition`] is returned.
    ///
    /// Waits for any running drain, so no create for an anonymous row can
    /// land after its ownership was rewritten.
    pub async fn complete_login<S: SessionPersistence>(
        &self,
        previous: &Session,
        auth: AuthSession,
        sessions: &S,
    ) -> Result<(Session, TransitionReport)> {
        let next = Session::authenticated(&auth);
        if !previous.is_anonymous() || next.is_anonymous() {
            sessions.save_session(&auth)?;
            return Ok((next, TransitionReport::default()));
        }

        let _guard = self.drain_lock.lock().await;
        let from = previous.author_id.clone();
        let to = next.author_id.clone();
        let now = unix_millis_now();
        let transferred = self
            .store
            .write(|tx| {
                let report = transfer_ownership(tx, &from, &to, now)?;
                sessions.save_session(&auth)?;
                Ok(report)
            })
            .await;

        let report = match transferred {
            Ok(report) => report,
            Err(error) => {
                if let Err(clear_error) = sessions.clear_session() {
                    tracing::warn!("Failed to discard session after aborted login: {clear_error}");
                }
                tracing::warn!("Identity transition rolled back: {error}");
                return Err(Error::IdentityTransition(error.to_string()));
            }
        };
        tracing::info!(
            "Transferred {} records to {} ({} ownership updates queued)",
            report.reassigned,
            next.author_id,
            report.ownership_updates
        );
        Ok((next, report))
    }

    /// Forget the stored credential and fall back to the anonymous identity.
    pub fn sign_out<S: SessionPersistence>(sessions: &S) -> Result<Session> {
        sessions.clear_session()?;
        Ok(Session::anonymous())
    }
}
