//! Background task that keeps the local store in step with the server.

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{Session, SyncEngine};

/// Drains and pulls on an interval and whenever connectivity comes back.
pub struct SyncWorker {
    engine: SyncEngine,
    session: watch::Receiver<Session>,
}

impl SyncWorker {
    /// `session` follows sign-in and sign-out so each cycle runs under the
    /// current identity.
    pub const fn new(engine: SyncEngine, session: watch::Receiver<Session>) -> Self {
        Self { engine, session }
    }

    /// Run on the current runtime until the returned sender fires or drops.
    pub fn spawn(self) -> (JoinHandle<()>, oneshot::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(self.run(shutdown_rx));
        (handle, shutdown_tx)
    }

    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.engine.config().sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut connectivity = self.engine.subscribe();

        tracing::info!(
            "Sync worker started (interval {:?})",
            self.engine.config().sync_interval
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.cycle("interval").await,
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *connectivity.borrow_and_update();
                    if online {
                        self.cycle("reconnect").await;
                    }
                }
            }
        }
        tracing::info!("Sync worker stopped");
    }

    async fn cycle(&self, reason: &str) {
        if !self.engine.is_online() || !self.engine.has_remote() {
            return;
        }
        let session = self.session.borrow().clone();
        match self.engine.sync_now(&session).await {
            Ok(report) => tracing::debug!(
                "Sync cycle ({reason}): {} pushed, {} pulled",
                report.drain.completed,
                report.pull.pulled()
            ),
            Err(error) => tracing::warn!("Sync cycle ({reason}) failed: {error}"),
        }
    }
}
