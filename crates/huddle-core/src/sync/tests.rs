use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::Notify;

use super::*;
use crate::auth::{
    AuthError, AuthResult, AuthSession, AuthUser, InMemorySessionStore, SessionPersistence,
};
use crate::config::{RetryPolicy, SyncConfig};
use crate::models::{
    Action, AnyRecord, AuthorId, CommentDraft, EntityKind, EntryStatus, Item, ItemDraft, List,
    ListDraft, Poll, PollDraft, RecordId, SyncStatus,
};
use crate::services::LocalStore;
use crate::state::SyncState;
use crate::util::unix_millis_now;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create {
        kind: EntityKind,
        author: AuthorId,
        parent: Option<RecordId>,
    },
    Update {
        kind: EntityKind,
        id: RecordId,
        body: Value,
    },
    Delete {
        kind: EntityKind,
        id: RecordId,
    },
    Fetch {
        kind: EntityKind,
    },
}

/// In-process server: assigns numeric ids from 100 and fails on demand.
struct FakeRemote {
    next_id: AtomicU64,
    failures: Mutex<HashMap<Op, VecDeque<RemoteError>>>,
    calls: Mutex<Vec<Call>>,
    server: Mutex<Vec<AnyRecord>>,
    hold_create: AtomicBool,
    create_started: Notify,
    create_released: Notify,
}

impl FakeRemote {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(100),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            server: Mutex::new(Vec::new()),
            hold_create: AtomicBool::new(false),
            create_started: Notify::new(),
            create_released: Notify::new(),
        })
    }

    /// The next create parks after it is recorded until `release_create`.
    fn hold_next_create(&self) {
        self.hold_create.store(true, Ordering::SeqCst);
    }

    fn release_create(&self) {
        self.create_released.notify_one();
    }

    fn fail_next(&self, op: Op, error: RemoteError) {
        self.failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(error);
    }

    fn take_failure(&self, op: Op) -> Option<RemoteError> {
        self.failures
            .lock()
            .unwrap()
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Pushes only; snapshot fetches are excluded.
    fn push_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::Fetch { .. }))
            .collect()
    }

    fn server_records(&self, kind: EntityKind) -> Vec<AnyRecord> {
        self.server
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.kind() == kind)
            .cloned()
            .collect()
    }

    fn seed(&self, record: impl Into<AnyRecord>) {
        self.server.lock().unwrap().push(record.into());
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn create(&self, _session: &Session, record: &AnyRecord) -> RemoteResult<AnyRecord> {
        self.record(Call::Create {
            kind: record.kind(),
            author: record.header().author_id.clone(),
            parent: record.parent_id().cloned(),
        });
        if self.hold_create.swap(false, Ordering::SeqCst) {
            self.create_started.notify_one();
            self.create_released.notified().await;
        }
        if let Some(error) = self.take_failure(Op::Create) {
            return Err(error);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut created = record.clone();
        let header = created.header_mut();
        header.id = RecordId::from(id.to_string());
        header.sync_status = SyncStatus::Synced;
        header.last_synced_at = None;
        self.server.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        _session: &Session,
        kind: EntityKind,
        id: &RecordId,
        patch: &Value,
    ) -> RemoteResult<()> {
        self.record(Call::Update {
            kind,
            id: id.clone(),
            body: patch.clone(),
        });
        if let Some(error) = self.take_failure(Op::Update) {
            return Err(error);
        }

        let mut server = self.server.lock().unwrap();
        let Some(stored) = server
            .iter_mut()
            .find(|record| record.kind() == kind && &record.header().id == id)
        else {
            return Err(RemoteError::Gone);
        };
        if let (AnyRecord::Poll(poll), Some(option)) =
            (&mut *stored, patch.get("vote").and_then(Value::as_u64))
        {
            poll.record_vote(option as usize).unwrap();
            return Ok(());
        }
        let mut value = serde_json::to_value(&*stored).unwrap();
        if let (Some(target), Some(fields)) = (value.as_object_mut(), patch.as_object()) {
            for (key, field) in fields {
                if target.contains_key(key) {
                    target.insert(key.clone(), field.clone());
                }
            }
        }
        *stored = AnyRecord::from_json(kind, value).unwrap();
        Ok(())
    }

    async fn delete(&self, _session: &Session, kind: EntityKind, id: &RecordId) -> RemoteResult<()> {
        self.record(Call::Delete {
            kind,
            id: id.clone(),
        });
        if let Some(error) = self.take_failure(Op::Delete) {
            return Err(error);
        }
        self.server
            .lock()
            .unwrap()
            .retain(|record| !(record.kind() == kind && &record.header().id == id));
        Ok(())
    }

    async fn fetch_all(&self, _session: &Session, kind: EntityKind) -> RemoteResult<Vec<AnyRecord>> {
        self.record(Call::Fetch { kind });
        Ok(self.server_records(kind))
    }
}

fn retry_policy() -> RetryPolicy {
    RetryPolicy {
        base_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(8),
        max_attempts: 3,
    }
}

fn engine(remote: &Arc<FakeRemote>) -> SyncEngine {
    let store = LocalStore::open_in_memory().unwrap();
    let config = SyncConfig::new()
        .with_api_base_url("https://api.test")
        .with_sync_interval(Duration::from_secs(3600))
        .with_retry(retry_policy());
    SyncEngine::new(store, remote.clone(), config)
}

fn auth_session(user_id: &str) -> AuthSession {
    AuthSession {
        access_token: "access-token".to_string(),
        expires_at: 4_102_444_800,
        user: AuthUser {
            id: user_id.to_string(),
            email: Some("ada@example.com".to_string()),
        },
    }
}

/// Keychain that refuses every write.
#[derive(Clone)]
struct LockedKeychain;

impl SessionPersistence for LockedKeychain {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(None)
    }

    fn save_session(&self, _session: &AuthSession) -> AuthResult<()> {
        Err(AuthError::SecureStorage("keychain is locked".to_string()))
    }

    fn clear_session(&self) -> AuthResult<()> {
        Ok(())
    }
}

fn network_down() -> RemoteError {
    RemoteError::Network("connection refused".to_string())
}

async fn query_i64(engine: &SyncEngine, sql: &str) -> i64 {
    engine
        .store()
        .read(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
        .await
        .unwrap()
}

async fn total_changes(engine: &SyncEngine) -> i64 {
    query_i64(engine, "SELECT total_changes()").await
}

async fn raw_list(engine: &SyncEngine, id: &RecordId) -> Option<List> {
    engine
        .store()
        .read(|conn| crate::db::records::RecordRepository::new(conn).get::<List>(id))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_create_writes_record_and_one_entry() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);
    let session = Session::anonymous();

    let list = engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();

    assert!(list.header.id.is_temporary());
    assert_eq!(list.header.sync_status, SyncStatus::PendingUpload);
    assert_eq!(list.header.author_id, AuthorId::anonymous());
    assert_eq!(raw_list(&engine, &list.header.id).await, Some(list.clone()));

    let pending = engine.pending_entries().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].action.action_type(), "CREATE_LIST");
    assert_eq!(pending[0].temp_id.as_ref(), Some(&list.header.id));
    assert_eq!(pending[0].status, EntryStatus::Pending);
    assert_eq!(pending[0].retry_count, 0);
    assert!(remote.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn child_of_unsynced_parent_references_temp_id() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);
    let session = Session::anonymous();

    let list = engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    let item = engine
        .create_item(&session, ItemDraft::new(list.header.id.clone(), "Milk"))
        .await
        .unwrap();

    assert_eq!(item.list_id, list.header.id);
    let pending = engine.pending_entries().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].temp_id.as_ref(), Some(&list.header.id));
    assert_eq!(
        pending[1].action,
        Action::CreateItem(ItemDraft::new(list.header.id.clone(), "Milk"))
    );
    assert_eq!(pending[1].depends_on, Some(pending[0].id));
}

#[tokio::test(flavor = "multi_thread")]
async fn drain_materializes_parent_before_child_create() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);
    let session = Session::anonymous();

    let list = engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    let temp_id = list.header.id.clone();
    engine
        .create_item(&session, ItemDraft::new(temp_id.clone(), "Milk"))
        .await
        .unwrap();

    engine.set_online(true);
    let report = engine.drain(&session).await.unwrap();
    assert_eq!(report.completed, 2);
    assert!(report.is_clean());

    let server_list = RecordId::from("100");
    assert_eq!(
        remote.push_calls(),
        vec![
            Call::Create {
                kind: EntityKind::List,
                author: AuthorId::anonymous(),
                parent: None,
            },
            Call::Create {
                kind: EntityKind::Item,
                author: AuthorId::anonymous(),
                parent: Some(server_list.clone()),
            },
        ]
    );

    assert!(raw_list(&engine, &temp_id).await.is_none());
    let synced = raw_list(&engine, &server_list).await.unwrap();
    assert_eq!(synced.header.sync_status, SyncStatus::Synced);
    assert!(synced.header.last_synced_at.is_some());
    assert_eq!(synced.title, "Groceries");

    let items: Vec<Item> = engine.children(&server_list).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].header.id, RecordId::from("101"));
    assert_eq!(items[0].header.sync_status, SyncStatus::Synced);
    assert_eq!(
        query_i64(
            &engine,
            "SELECT COUNT(*) FROM items WHERE list_id LIKE 'tmp_%'"
        )
        .await,
        0
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn materialization_cascades_through_every_child_table() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);
    let session = Session::anonymous();

    let group = engine
        .create_group(&session, crate::models::GroupDraft::new("Flat 4"))
        .await
        .unwrap();
    let list = engine
        .create_list(
            &session,
            ListDraft::new("Chores").in_group(group.header.id.clone()),
        )
        .await
        .unwrap();
    let item = engine
        .create_item(&session, ItemDraft::new(list.header.id.clone(), "Bins"))
        .await
        .unwrap();
    engine
        .create_note(
            &session,
            crate::models::NoteDraft::new(list.header.id.clone(), "Tuesdays"),
        )
        .await
        .unwrap();
    engine
        .create_poll(
            &session,
            PollDraft::new(list.header.id.clone(), "Rota?", ["Weekly", "Monthly"]),
        )
        .await
        .unwrap();
    engine
        .create_comment(&session, CommentDraft::new(item.header.id.clone(), "my turn"))
        .await
        .unwrap();

    engine.set_online(true);
    let report = engine.drain(&session).await.unwrap();
    assert_eq!(report.completed, 6);

    for table in ["groups", "lists", "items", "notes", "comments", "polls"] {
        let temp_rows = query_i64(
            &engine,
            &format!("SELECT COUNT(*) FROM {table} WHERE id LIKE 'tmp_%' OR sync_status != 'synced'"),
        )
        .await;
        assert_eq!(temp_rows, 0, "{table} still has unsynced rows");
    }
    assert_eq!(
        query_i64(&engine, "SELECT COUNT(*) FROM lists WHERE group_id = '100'").await,
        1
    );
    assert_eq!(
        query_i64(&engine, "SELECT COUNT(*) FROM comments WHERE item_id LIKE 'tmp_%'").await,
        0
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn network_failure_keeps_entry_pending_without_duplicates() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();
    engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();

    remote.fail_next(Op::Create, network_down());
    remote.fail_next(Op::Create, network_down());
    let now = unix_millis_now();

    let first = engine.drain_at(&session, now).await.unwrap();
    assert_eq!(first.retried, 1);
    let entry = engine.pending_entries().await.unwrap().remove(0);
    assert_eq!(entry.retry_count, 1);
    assert_eq!(entry.next_attempt_at, Some(now + 1_000));
    assert!(entry.last_error.unwrap().contains("connection refused"));

    // Inside the backoff window nothing is sent.
    let waiting = engine.drain_at(&session, now + 500).await.unwrap();
    assert_eq!(waiting.deferred, 1);
    assert_eq!(remote.push_calls().len(), 1);

    let second = engine.drain_at(&session, now + 1_000).await.unwrap();
    assert_eq!(second.retried, 1);
    let entry = engine.pending_entries().await.unwrap().remove(0);
    assert_eq!(entry.retry_count, 2);
    assert_eq!(entry.next_attempt_at, Some(now + 3_000));

    let third = engine.drain_at(&session, now + 3_000).await.unwrap();
    assert_eq!(third.completed, 1);
    assert_eq!(remote.server_records(EntityKind::List).len(), 1);
    assert_eq!(engine.all::<List>().await.unwrap().len(), 1);
    assert!(engine.pending_entries().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_retries_fail_the_entry() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();
    let list = engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();

    for _ in 0..3 {
        remote.fail_next(
            Op::Create,
            RemoteError::Server {
                status: 503,
                message: "unavailable (503)".to_string(),
            },
        );
    }
    let now = unix_millis_now();
    engine.drain_at(&session, now).await.unwrap();
    engine.drain_at(&session, now + 1_000).await.unwrap();
    let last = engine.drain_at(&session, now + 3_000).await.unwrap();

    assert_eq!(last.failed.len(), 1);
    assert!(last.failed[0].error.contains("gave up after 3 attempts"));
    let failed = engine.failed_entries().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].retry_count, 3);
    assert_eq!(engine.status().await.unwrap(), SyncState::Error);

    // The record stays visible and pending under its temp id.
    let local = raw_list(&engine, &list.header.id).await.unwrap();
    assert_eq!(local.header.sync_status, SyncStatus::PendingUpload);

    assert_eq!(engine.retry_failed().await.unwrap(), 1);
    let report = engine.drain_at(&session, now + 10_000).await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(engine.status().await.unwrap(), SyncState::Synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejection_is_terminal_and_fails_dependents() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();
    let list = engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    engine
        .create_item(&session, ItemDraft::new(list.header.id.clone(), "Milk"))
        .await
        .unwrap();

    remote.fail_next(
        Op::Create,
        RemoteError::Rejected {
            status: 422,
            message: "title too long (422)".to_string(),
        },
    );
    let report = engine.drain(&session).await.unwrap();

    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].action_type, "CREATE_LIST");
    assert_eq!(report.failed[0].entry_id.0, 1);
    assert_eq!(report.failed[1].error, "dependency #1 failed");
    // The item create never reached the network.
    assert_eq!(remote.push_calls().len(), 1);

    let failed = engine.failed_entries().await.unwrap();
    assert_eq!(failed[0].retry_count, 0);
    assert!(failed[0].last_error.as_deref().unwrap().contains("title too long"));
}

#[tokio::test(flavor = "multi_thread")]
async fn child_waits_while_parent_is_retrying() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();
    let list = engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    engine
        .create_item(&session, ItemDraft::new(list.header.id.clone(), "Milk"))
        .await
        .unwrap();

    remote.fail_next(Op::Create, network_down());
    let now = unix_millis_now();
    let report = engine.drain_at(&session, now).await.unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(report.deferred, 1);
    assert_eq!(remote.push_calls().len(), 1);

    let report = engine.drain_at(&session, now + 1_000).await.unwrap();
    assert_eq!(report.completed, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn draining_empty_or_completed_queue_does_nothing() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();

    let before = total_changes(&engine).await;
    assert_eq!(engine.drain(&session).await.unwrap(), DrainReport::default());
    assert_eq!(total_changes(&engine).await, before);
    assert!(remote.calls().is_empty());

    engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    engine.drain(&session).await.unwrap();
    let calls = remote.calls().len();

    let before = total_changes(&engine).await;
    assert_eq!(engine.drain(&session).await.unwrap(), DrainReport::default());
    assert_eq!(total_changes(&engine).await, before);
    assert_eq!(remote.calls().len(), calls);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_drain_is_a_no_op() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();
    engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();

    engine.set_online(false);
    assert_eq!(engine.drain(&session).await.unwrap(), DrainReport::default());
    assert_eq!(engine.pull(&session).await.unwrap(), PullReport::default());
    assert!(remote.calls().is_empty());
    assert_eq!(engine.status().await.unwrap(), SyncState::Offline);
}

#[tokio::test(flavor = "multi_thread")]
async fn toggle_on_temp_item_follows_its_create() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);
    let session = Session::anonymous();

    let list = engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    let item = engine
        .create_item(&session, ItemDraft::new(list.header.id.clone(), "Milk"))
        .await
        .unwrap();
    let toggled = engine
        .toggle_item(&session, &item.header.id, true)
        .await
        .unwrap();
    assert!(toggled.checked);
    assert_eq!(toggled.header.sync_status, SyncStatus::PendingUpload);

    let pending = engine.pending_entries().await.unwrap();
    assert_eq!(pending[2].depends_on, Some(pending[1].id));

    engine.set_online(true);
    let report = engine.drain(&session).await.unwrap();
    assert_eq!(report.completed, 3);
    assert_eq!(
        remote.push_calls().last(),
        Some(&Call::Update {
            kind: EntityKind::Item,
            id: RecordId::from("101"),
            body: json!({ "checked": true }),
        })
    );

    let item: Item = engine.get(&RecordId::from("101")).await.unwrap().unwrap();
    assert!(item.checked);
    assert_eq!(item.header.sync_status, SyncStatus::Synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn vote_on_unsynced_poll_is_counted_once() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);
    let session = Session::anonymous();

    let list = engine
        .create_list(&session, ListDraft::new("Dinner"))
        .await
        .unwrap();
    let poll = engine
        .create_poll(
            &session,
            PollDraft::new(list.header.id.clone(), "Where?", ["Pizza", "Tacos"]),
        )
        .await
        .unwrap();
    let voted = engine
        .cast_vote(&session, &poll.header.id, 0)
        .await
        .unwrap();
    assert_eq!(voted.options[0].votes, 1);

    engine.set_online(true);
    let report = engine.drain(&session).await.unwrap();
    assert_eq!(report.completed, 3);

    let server = remote.server_records(EntityKind::Poll);
    let AnyRecord::Poll(uploaded) = &server[0] else {
        panic!("expected a poll on the server");
    };
    assert_eq!(uploaded.options[0].votes, 1);
    assert_eq!(uploaded.total_votes(), 1);
    let vote_patches = remote
        .push_calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Update { body, .. } if body.get("vote").is_some()))
        .count();
    assert_eq!(vote_patches, 1);

    let local: Poll = engine.get(&RecordId::from("101")).await.unwrap().unwrap();
    assert_eq!(local.total_votes(), 1);
    assert_eq!(local.header.sync_status, SyncStatus::Synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn patch_on_synced_record_settles_back_to_synced() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();

    let list = engine
        .create_list(&session, ListDraft::new("Dinner"))
        .await
        .unwrap();
    engine
        .create_poll(
            &session,
            PollDraft::new(list.header.id.clone(), "Where?", ["Pizza", "Tacos"]),
        )
        .await
        .unwrap();
    engine.drain(&session).await.unwrap();

    let poll_id = RecordId::from("101");
    let voted = engine.cast_vote(&session, &poll_id, 1).await.unwrap();
    assert_eq!(voted.options[1].votes, 1);
    assert_eq!(voted.header.sync_status, SyncStatus::PendingUpdate);

    engine.drain(&session).await.unwrap();
    let poll: Poll = engine.get(&poll_id).await.unwrap().unwrap();
    assert_eq!(poll.header.sync_status, SyncStatus::Synced);
    assert_eq!(
        remote.push_calls().last(),
        Some(&Call::Update {
            kind: EntityKind::Poll,
            id: poll_id,
            body: json!({ "vote": 1 }),
        })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_mutations_write_nothing() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);
    let session = Session::anonymous();

    let missing = engine
        .create_item(&session, ItemDraft::new(RecordId::from("404"), "Milk"))
        .await
        .unwrap_err();
    assert!(matches!(missing, Error::NotFound(_)));

    let list = engine
        .create_list(&session, ListDraft::new("Dinner"))
        .await
        .unwrap();
    let poll = engine
        .create_poll(
            &session,
            PollDraft::new(list.header.id.clone(), "Where?", ["Pizza", "Tacos"]),
        )
        .await
        .unwrap();
    let before = engine.pending_entries().await.unwrap().len();

    let out_of_range = engine
        .cast_vote(&session, &poll.header.id, 7)
        .await
        .unwrap_err();
    assert!(matches!(out_of_range, Error::InvalidInput(_)));
    assert_eq!(engine.pending_entries().await.unwrap().len(), before);

    let empty = engine
        .create_list(&session, ListDraft::new("   "))
        .await
        .unwrap_err();
    assert!(matches!(empty, Error::InvalidInput(_)));
    assert_eq!(engine.all::<List>().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn gone_on_update_removes_record_and_descendants() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();

    let list = engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    let item = engine
        .create_item(&session, ItemDraft::new(list.header.id.clone(), "Milk"))
        .await
        .unwrap();
    engine
        .create_comment(&session, CommentDraft::new(item.header.id.clone(), "oat"))
        .await
        .unwrap();
    engine.drain(&session).await.unwrap();

    let item_id = RecordId::from("101");
    engine.toggle_item(&session, &item_id, true).await.unwrap();
    remote.fail_next(Op::Update, RemoteError::Gone);

    let report = engine.drain(&session).await.unwrap();
    assert_eq!(report.reconciled, 1);
    assert!(report.failed.is_empty());
    assert_eq!(query_i64(&engine, "SELECT COUNT(*) FROM items").await, 0);
    assert_eq!(query_i64(&engine, "SELECT COUNT(*) FROM comments").await, 0);
    assert!(engine.pending_entries().await.unwrap().is_empty());
    // The list itself is untouched.
    assert!(raw_list(&engine, &RecordId::from("100")).await.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_is_soft_until_pushed_and_404_counts_as_done() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();

    let list = engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    engine
        .create_item(&session, ItemDraft::new(list.header.id.clone(), "Milk"))
        .await
        .unwrap();
    engine.drain(&session).await.unwrap();

    let list_id = RecordId::from("100");
    engine.set_online(false);
    engine
        .delete_record(&session, EntityKind::List, &list_id)
        .await
        .unwrap();
    assert!(engine.get::<List>(&list_id).await.unwrap().is_none());
    assert!(engine.all::<List>().await.unwrap().is_empty());
    let soft = raw_list(&engine, &list_id).await.unwrap();
    assert!(soft.header.is_deleted);
    assert_eq!(soft.header.sync_status, SyncStatus::PendingUpdate);

    engine.set_online(true);
    remote.fail_next(Op::Delete, RemoteError::Gone);
    let report = engine.drain(&session).await.unwrap();
    assert_eq!(report.completed, 1);
    assert!(raw_list(&engine, &list_id).await.is_none());
    assert_eq!(query_i64(&engine, "SELECT COUNT(*) FROM items").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn pull_never_overwrites_pending_records() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();

    let list = engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    engine
        .create_item(&session, ItemDraft::new(list.header.id.clone(), "Milk"))
        .await
        .unwrap();
    engine.sync_now(&session).await.unwrap();

    let item_id = RecordId::from("101");
    engine.toggle_item(&session, &item_id, true).await.unwrap();

    // The server still has the unchecked item.
    let report = engine.pull(&session).await.unwrap();
    let items = report.for_kind(EntityKind::Item).unwrap();
    assert_eq!((items.pulled, items.skipped), (0, 1));
    let local: Item = engine.get(&item_id).await.unwrap().unwrap();
    assert!(local.checked);
    assert_eq!(local.header.sync_status, SyncStatus::PendingUpdate);

    // One full cycle later the acknowledged change is what the server returns.
    let cycle = engine.sync_now(&session).await.unwrap();
    assert_eq!(cycle.drain.completed, 1);
    assert_eq!(cycle.pull.for_kind(EntityKind::Item).unwrap().pulled, 1);
    let local: Item = engine.get(&item_id).await.unwrap().unwrap();
    assert!(local.checked);
    assert_eq!(local.header.sync_status, SyncStatus::Synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn pull_keeps_local_only_rows_and_ignores_temp_ids() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();

    let scratch = engine
        .create_local(&session, ListDraft::new("Scratch"))
        .await
        .unwrap();
    assert_eq!(scratch.header.sync_status, SyncStatus::Local);
    assert!(engine.pending_entries().await.unwrap().is_empty());

    let mut shared = scratch.clone();
    shared.header.id = RecordId::from("900");
    shared.header.author_id = AuthorId::from("someone-else");
    shared.title = "Shared".to_string();
    remote.seed(shared);
    let mut bogus = scratch.clone();
    bogus.header.id = RecordId::from("tmp_server_bug");
    remote.seed(bogus);

    let report = engine.pull(&session).await.unwrap();
    let lists = report.for_kind(EntityKind::List).unwrap();
    assert_eq!((lists.pulled, lists.skipped), (1, 1));
    assert_eq!(report.kinds.len(), EntityKind::ALL.len());
    assert!(report.failed_kinds.is_empty());

    let titles: Vec<String> = engine
        .all::<List>()
        .await
        .unwrap()
        .into_iter()
        .map(|list| list.title)
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Scratch".to_string()));
    assert!(titles.contains(&"Shared".to_string()));

    let pulled = raw_list(&engine, &RecordId::from("900")).await.unwrap();
    assert_eq!(pulled.header.sync_status, SyncStatus::Synced);
    assert!(pulled.header.last_synced_at.is_some());
    let fetched: Vec<EntityKind> = remote
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Fetch { kind } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(fetched, EntityKind::ALL.to_vec());
}

#[tokio::test(flavor = "multi_thread")]
async fn login_transfers_anonymous_records() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let anonymous = Session::anonymous();

    engine
        .create_list(&anonymous, ListDraft::new("Groceries"))
        .await
        .unwrap();
    engine.drain(&anonymous).await.unwrap();
    engine.set_online(false);
    let unsynced = engine
        .create_list(&anonymous, ListDraft::new("Packing"))
        .await
        .unwrap();
    let scratch = engine
        .create_local(&anonymous, ListDraft::new("Scratch"))
        .await
        .unwrap();

    let sessions = InMemorySessionStore::new();
    let (session, report) = engine
        .complete_login(&anonymous, auth_session("user-7"), &sessions)
        .await
        .unwrap();

    let user = AuthorId::from("user-7");
    assert_eq!(session.author_id, user);
    assert_eq!(report.reassigned, 3);
    assert_eq!(report.ownership_updates, 1);
    assert!(sessions.load_session().unwrap().is_some());

    let synced = raw_list(&engine, &RecordId::from("100")).await.unwrap();
    assert_eq!(synced.header.author_id, user);
    assert_eq!(synced.header.sync_status, SyncStatus::PendingUpdate);
    let unsynced = raw_list(&engine, &unsynced.header.id).await.unwrap();
    assert_eq!(unsynced.header.author_id, user);
    assert_eq!(unsynced.header.sync_status, SyncStatus::PendingUpdate);
    let scratch = raw_list(&engine, &scratch.header.id).await.unwrap();
    assert_eq!(scratch.header.author_id, user);
    assert_eq!(scratch.header.sync_status, SyncStatus::Local);

    engine.set_online(true);
    engine.drain(&session).await.unwrap();
    let pushes = remote.push_calls();
    assert!(pushes.contains(&Call::Update {
        kind: EntityKind::List,
        id: RecordId::from("100"),
        body: json!({ "author_id": "user-7" }),
    }));
    assert!(pushes.contains(&Call::Create {
        kind: EntityKind::List,
        author: user.clone(),
        parent: None,
    }));
    assert_eq!(
        query_i64(&engine, "SELECT COUNT(*) FROM lists WHERE sync_status = 'pending_update'").await,
        0
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_login_transition_rolls_back_every_table() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);
    let anonymous = Session::anonymous();

    let group = engine
        .create_group(&anonymous, crate::models::GroupDraft::new("Flat 4"))
        .await
        .unwrap();
    let list = engine
        .create_list(
            &anonymous,
            ListDraft::new("Chores").in_group(group.header.id.clone()),
        )
        .await
        .unwrap();
    engine
        .create_item(&anonymous, ItemDraft::new(list.header.id.clone(), "Bins"))
        .await
        .unwrap();
    let entries_before = engine.pending_entries().await.unwrap().len();

    // Groups and lists are rewritten before items, so the fault lands mid-way.
    engine
        .store()
        .write(|tx| {
            tx.execute_batch(
                "CREATE TRIGGER fail_item_owner BEFORE UPDATE OF author_id ON items
                 BEGIN SELECT RAISE(ABORT, 'injected fault'); END;",
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let sessions = InMemorySessionStore::new();
    sessions.save_session(&auth_session("stale")).unwrap();
    let error = engine
        .complete_login(&anonymous, auth_session("user-7"), &sessions)
        .await
        .unwrap_err();

    assert!(matches!(error, Error::IdentityTransition(_)));
    assert!(sessions.load_session().unwrap().is_none());
    for table in ["groups", "lists", "items"] {
        let moved = query_i64(
            &engine,
            &format!("SELECT COUNT(*) FROM {table} WHERE author_id != 'anonymous'"),
        )
        .await;
        assert_eq!(moved, 0, "{table} kept a partial transfer");
        let status_changed = query_i64(
            &engine,
            &format!("SELECT COUNT(*) FROM {table} WHERE sync_status != 'pending_upload'"),
        )
        .await;
        assert_eq!(status_changed, 0, "{table} kept a partial status change");
    }
    assert_eq!(engine.pending_entries().await.unwrap().len(), entries_before);
}

#[tokio::test(flavor = "multi_thread")]
async fn login_waits_for_in_flight_create() {
    let remote = FakeRemote::new();
    let engine = Arc::new(engine(&remote));
    let anonymous = Session::anonymous();
    engine
        .create_list(&anonymous, ListDraft::new("Groceries"))
        .await
        .unwrap();

    remote.hold_next_create();
    let draining = tokio::spawn({
        let engine = engine.clone();
        let session = anonymous.clone();
        async move { engine.drain(&session).await }
    });
    remote.create_started.notified().await;

    let sessions = InMemorySessionStore::new();
    let login = tokio::spawn({
        let engine = engine.clone();
        let sessions = sessions.clone();
        async move {
            engine
                .complete_login(&Session::anonymous(), auth_session("user-7"), &sessions)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!login.is_finished(), "login ran while a create was on the wire");

    remote.release_create();
    draining.await.unwrap().unwrap();
    let (session, report) = login.await.unwrap().unwrap();
    assert_eq!(report.reassigned, 1);
    assert_eq!(report.ownership_updates, 1);

    let user = AuthorId::from("user-7");
    let list = raw_list(&engine, &RecordId::from("100")).await.unwrap();
    assert_eq!(list.header.author_id, user);
    assert_eq!(list.header.sync_status, SyncStatus::PendingUpdate);

    engine.drain(&session).await.unwrap();
    let server = remote.server_records(EntityKind::List);
    assert_eq!(server[0].header().author_id, user);
    let list = raw_list(&engine, &RecordId::from("100")).await.unwrap();
    assert_eq!(list.header.sync_status, SyncStatus::Synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn login_rolls_back_when_session_cannot_be_saved() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let anonymous = Session::anonymous();
    engine
        .create_list(&anonymous, ListDraft::new("Groceries"))
        .await
        .unwrap();
    engine.drain(&anonymous).await.unwrap();
    engine.set_online(false);
    engine
        .create_list(&anonymous, ListDraft::new("Packing"))
        .await
        .unwrap();
    let entries_before = engine.pending_entries().await.unwrap();

    let error = engine
        .complete_login(&anonymous, auth_session("user-7"), &LockedKeychain)
        .await
        .unwrap_err();

    assert!(matches!(error, Error::IdentityTransition(_)));
    assert!(error.to_string().contains("keychain is locked"));
    assert_eq!(
        query_i64(&engine, "SELECT COUNT(*) FROM lists WHERE author_id != 'anonymous'").await,
        0
    );
    let synced = raw_list(&engine, &RecordId::from("100")).await.unwrap();
    assert_eq!(synced.header.sync_status, SyncStatus::Synced);
    let entries_after = engine.pending_entries().await.unwrap();
    assert_eq!(entries_after.len(), entries_before.len());
    assert!(entries_after
        .iter()
        .all(|entry| !matches!(entry.action, Action::UpdateOwnership { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn login_without_prior_anonymous_identity_moves_nothing() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);
    let anonymous = Session::anonymous();
    engine
        .create_list(&anonymous, ListDraft::new("Groceries"))
        .await
        .unwrap();

    let sessions = InMemorySessionStore::new();
    let (first, _) = engine
        .complete_login(&anonymous, auth_session("user-1"), &sessions)
        .await
        .unwrap();
    let (second, report) = engine
        .complete_login(&first, auth_session("user-2"), &sessions)
        .await
        .unwrap();

    assert_eq!(report, TransitionReport::default());
    assert_eq!(second.author_id, AuthorId::from("user-2"));
    let lists = engine.all::<List>().await.unwrap();
    assert_eq!(lists[0].header.author_id, AuthorId::from("user-1"));

    let signed_out = SyncEngine::sign_out(&sessions).unwrap();
    assert!(signed_out.is_anonymous());
    assert!(sessions.load_session().unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn prune_removes_completed_history_only() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    let session = Session::anonymous();

    engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    engine.drain(&session).await.unwrap();
    engine.set_online(false);
    engine
        .create_list(&session, ListDraft::new("Packing"))
        .await
        .unwrap();

    assert_eq!(engine.prune_completed().await.unwrap(), 1);
    let stats = engine.store().queue_stats().await.unwrap();
    assert_eq!((stats.pending, stats.completed, stats.failed), (1, 0, 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn local_only_engine_queues_without_pushing() {
    let store = LocalStore::open_in_memory().unwrap();
    let engine = SyncEngine::local_only(store, SyncConfig::new());
    let session = Session::anonymous();

    engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();
    engine.set_online(true);
    let report = engine.sync_now(&session).await.unwrap();

    assert_eq!(report, SyncReport::default());
    assert_eq!(engine.pending_entries().await.unwrap().len(), 1);
    assert_eq!(engine.status().await.unwrap(), SyncState::Offline);
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_syncs_when_connectivity_returns() {
    let remote = FakeRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);
    let session = Session::anonymous();
    engine
        .create_list(&session, ListDraft::new("Groceries"))
        .await
        .unwrap();

    let (_session_tx, session_rx) = tokio::sync::watch::channel(session);
    let (handle, shutdown) = SyncWorker::new(engine.clone(), session_rx).spawn();

    // Let the immediate first tick pass while offline.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(remote.calls().is_empty());

    engine.set_online(true);
    let synced = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if engine.pending_entries().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(synced.is_ok(), "worker did not drain after reconnect");
    assert_eq!(remote.server_records(EntityKind::List).len(), 1);

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}
