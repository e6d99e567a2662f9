//! Optimistic write path: local change and queue entry in one transaction.

use rusqlite::Connection;

use super::{Session, SyncEngine};
use crate::db::queue::QueueRepository;
use crate::db::records::RecordRepository;
use crate::error::{Error, Result};
use crate::models::{
    Action, AnyRecord, CommentDraft, Comment, Draft, EntityKind, EntryId, Group, GroupDraft,
    Item, ItemDraft, List, ListDraft, NewEntry, Note, NoteDraft, Poll, PollDraft, Record,
    RecordHeader, RecordId, SyncStatus,
};
use crate::util::unix_millis_now;

/// What a new child inherits from its parent row.
struct ParentLink {
    depends_on: Option<EntryId>,
    local: bool,
}

/// Check the parent exists and find the entry the child must wait for.
fn resolve_parent(
    conn: &Connection,
    kind: EntityKind,
    parent_id: Option<&RecordId>,
) -> Result<ParentLink> {
    let (Some(parent_id), Some(parent_kind)) = (parent_id, kind.parent()) else {
        return Ok(ParentLink {
            depends_on: None,
            local: false,
        });
    };

    let parent = RecordRepository::new(conn)
        .get_any(parent_kind, parent_id)?
        .filter(|parent| !parent.header().is_deleted)
        .ok_or_else(|| Error::NotFound(format!("{parent_kind} {parent_id}")))?;

    let depends_on = if parent_id.is_temporary() {
        QueueRepository::new(conn).create_entry_for(parent_id)?
    } else {
        None
    };

    Ok(ParentLink {
        depends_on,
        local: parent.header().sync_status == SyncStatus::Local,
    })
}

/// Entry an in-place mutation of `id` must follow.
fn previous_entry(conn: &Connection, kind: EntityKind, id: &RecordId) -> Result<Option<EntryId>> {
    let queue = QueueRepository::new(conn);
    if let Some(latest) = queue.latest_pending_for(kind, id)? {
        return Ok(Some(latest));
    }
    if id.is_temporary() {
        return queue.create_entry_for(id);
    }
    Ok(None)
}

impl SyncEngine {
    async fn create<D: Draft>(&self, session: &Session, draft: D, local: bool) -> Result<D::Record> {
        draft.validate()?;
        let kind = <D::Record as Record>::KIND;
        let author = session.author_id.clone();
        let now = unix_millis_now();

        let record = self
            .store
            .write(move |tx| {
                let link = resolve_parent(tx, kind, draft.parent_id())?;
                let local = local || link.local;

                let id = RecordId::temporary();
                let mut header = RecordHeader::pending_upload(id.clone(), author, now);
                if local {
                    header.sync_status = SyncStatus::Local;
                }

                let action = draft.clone().into_action();
                let record = draft.into_record(header);
                RecordRepository::new(tx).put(&record)?;

                if !local {
                    QueueRepository::new(tx).append(&NewEntry {
                        action,
                        subject_kind: kind,
                        subject_id: id.clone(),
                        temp_id: Some(id),
                        depends_on: link.depends_on,
                        created_at: now,
                    })?;
                }
                Ok(record)
            })
            .await?;

        tracing::debug!(
            "Created {} {} ({})",
            kind,
            record.header().id,
            record.header().sync_status
        );
        Ok(record)
    }

    pub async fn create_group(&self, session: &Session, draft: GroupDraft) -> Result<Group> {
        self.create(session, draft, false).await
    }

    pub async fn create_list(&self, session: &Session, draft: ListDraft) -> Result<List> {
        self.create(session, draft, false).await
    }

    pub async fn create_item(&self, session: &Session, draft: ItemDraft) -> Result<Item> {
        self.create(session, draft, false).await
    }

    pub async fn create_note(&self, session: &Session, draft: NoteDraft) -> Result<Note> {
        self.create(session, draft, false).await
    }

    pub async fn create_comment(&self, session: &Session, draft: CommentDraft) -> Result<Comment> {
        self.create(session, draft, false).await
    }

    pub async fn create_poll(&self, session: &Session, draft: PollDraft) -> Result<Poll> {
        self.create(session, draft, false).await
    }

    /// Create a record that is never queued for upload. Children created
    /// under a local record are local as well.
    pub async fn create_local<D: Draft>(&self, session: &Session, draft: D) -> Result<D::Record> {
        self.create(session, draft, true).await
    }

    /// Apply an in-place change to a live record and queue `action` for it.
    async fn mutate<R, F>(&self, id: &RecordId, action: Action, apply: F) -> Result<R>
    where
        R: Record,
        F: FnOnce(&mut R) -> Result<()> + Send,
    {
        let now = unix_millis_now();
        let id = id.clone();

        self.store
            .write(move |tx| {
                let records = RecordRepository::new(tx);
                let mut record = records
                    .get::<R>(&id)?
                    .filter(|record| !record.header().is_deleted)
                    .ok_or_else(|| Error::NotFound(format!("{} {id}", R::KIND)))?;

                apply(&mut record)?;
                record.header_mut().touch(now);
                records.put(&record)?;

                if record.header().sync_status != SyncStatus::Local {
                    let depends_on = previous_entry(tx, R::KIND, &id)?;
                    QueueRepository::new(tx).append(&NewEntry {
                        action,
                        subject_kind: R::KIND,
                        subject_id: id,
                        temp_id: None,
                        depends_on,
                        created_at: now,
                    })?;
                }
                Ok(record)
            })
            .await
    }

    pub async fn toggle_item(&self, session: &Session, id: &RecordId, checked: bool) -> Result<Item> {
        tracing::debug!("{} toggles item {id} -> {checked}", session.author_id);
        self.mutate(id, Action::ToggleItem { checked }, move |item: &mut Item| {
            item.checked = checked;
            Ok(())
        })
        .await
    }

    /// Count a vote for the option at index `option`.
    pub async fn cast_vote(&self, session: &Session, poll_id: &RecordId, option: usize) -> Result<Poll> {
        tracing::debug!("{} votes {option} on poll {poll_id}", session.author_id);
        self.mutate(poll_id, Action::CastVote { option }, move |poll: &mut Poll| {
            poll.record_vote(option)
        })
        .await
    }

    /// Soft-delete a record; the server delete is queued.
    pub async fn delete_record(&self, session: &Session, kind: EntityKind, id: &RecordId) -> Result<AnyRecord> {
        tracing::debug!("{} deletes {kind} {id}", session.author_id);
        let now = unix_millis_now();
        let id = id.clone();

        self.store
            .write(move |tx| {
                let records = RecordRepository::new(tx);
                let mut record = records
                    .get_any(kind, &id)?
                    .filter(|record| !record.header().is_deleted)
                    .ok_or_else(|| Error::NotFound(format!("{kind} {id}")))?;

                let header = record.header_mut();
                header.is_deleted = true;
                header.touch(now);
                records.put_any(&record)?;

                if record.header().sync_status != SyncStatus::Local {
                    let depends_on = previous_entry(tx, kind, &id)?;
                    QueueRepository::new(tx).append(&NewEntry {
                        action: Action::Delete,
                        subject_kind: kind,
                        subject_id: id,
                        temp_id: None,
                        depends_on,
                        created_at: now,
                    })?;
                }
                Ok(record)
            })
            .await
    }

    /// A live record by id
    pub async fn get<R: Record>(&self, id: &RecordId) -> Result<Option<R>> {
        let record = self
            .store
            .read(|conn| RecordRepository::new(conn).get::<R>(id))
            .await?;
        Ok(record.filter(|record| !record.header().is_deleted))
    }

    /// Live children of `parent`, oldest first
    pub async fn children<R: Record>(&self, parent: &RecordId) -> Result<Vec<R>> {
        let foreign_key = R::KIND.foreign_key().ok_or_else(|| {
            Error::InvalidInput(format!("{} records have no parent", R::KIND))
        })?;
        self.store
            .read(|conn| RecordRepository::new(conn).children::<R>(foreign_key, parent))
            .await
    }

    /// Every live record of a kind
    pub async fn all<R: Record>(&self) -> Result<Vec<R>> {
        self.store
            .read(|conn| RecordRepository::new(conn).all::<R>())
            .await
    }
}
