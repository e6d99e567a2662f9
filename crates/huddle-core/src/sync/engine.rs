//! Engine handle shared by clients and the background worker.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use super::{DrainReport, PullReport, RemoteApi, Session};
use crate::config::SyncConfig;
use crate::services::LocalStore;
use crate::state::SyncState;
use crate::Result;

/// Result of one drain-then-pull cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub drain: DrainReport,
    pub pull: PullReport,
}

/// Cloneable handle over the local store, the remote, and connectivity.
#[derive(Clone)]
pub struct SyncEngine {
    pub(super) store: LocalStore,
    pub(super) remote: Option<Arc<dyn RemoteApi>>,
    pub(super) config: SyncConfig,
    connectivity: Arc<watch::Sender<bool>>,
    /// Serializes drains and pulls so a single logical worker touches the queue
    pub(super) drain_lock: Arc<Mutex<()>>,
}

impl SyncEngine {
    /// Engine that pushes to and pulls from `remote`. Starts online.
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteApi>, config: SyncConfig) -> Self {
        Self::build(store, Some(remote), config, true)
    }

    /// Engine without a remote: writes queue up until a remote is configured.
    pub fn local_only(store: LocalStore, config: SyncConfig) -> Self {
        tracing::info!("Running in local-only mode (no remote configured)");
        Self::build(store, None, config, false)
    }

    fn build(
        store: LocalStore,
        remote: Option<Arc<dyn RemoteApi>>,
        config: SyncConfig,
        online: bool,
    ) -> Self {
        let (connectivity, _) = watch::channel(online);
        Self {
            store,
            remote,
            config,
            connectivity: Arc::new(connectivity),
            drain_lock: Arc::new(Mutex::new(())),
        }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Report a connectivity change. Subscribers see flips to online.
    pub fn set_online(&self, online: bool) {
        let previous = self.connectivity.send_replace(online);
        if previous != online {
            tracing::info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }

    pub fn is_online(&self) -> bool {
        *self.connectivity.borrow()
    }

    /// Connectivity signal, used by the worker to sync on reconnect
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connectivity.subscribe()
    }

    /// The remote, when one is configured and connectivity is up
    pub(super) fn reachable_remote(&self) -> Option<Arc<dyn RemoteApi>> {
        if self.is_online() {
            self.remote.clone()
        } else {
            None
        }
    }

    /// Drain the queue, then pull server state.
    pub async fn sync_now(&self, session: &Session) -> Result<SyncReport> {
        let drain = self.drain(session).await?;
        let pull = self.pull(session).await?;
        Ok(SyncReport { drain, pull })
    }

    /// Connectivity plus queue health, as shown to the user
    pub async fn status(&self) -> Result<SyncState> {
        let stats = self.store.queue_stats().await?;
        Ok(SyncState::from_queue(
            self.is_online() && self.has_remote(),
            &stats,
        ))
    }
}
