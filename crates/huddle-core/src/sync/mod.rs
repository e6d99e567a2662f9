//! Local-first sync engine.
//!
//! Mutations land in the local store immediately together with a durable
//! queue entry ([`optimistic`]). The queue processor pushes entries in
//! creation order and swaps temporary ids for server ids ([`processor`],
//! [`materialize`]); the reconciler folds server snapshots back in without
//! touching records that still have unsent changes ([`reconcile`]).

mod engine;
mod identity;
mod materialize;
mod optimistic;
mod processor;
mod reconcile;
mod remote;
mod session;
mod worker;

#[cfg(test)]
mod tests;

pub use engine::{SyncEngine, SyncReport};
pub use identity::TransitionReport;
pub use processor::{DrainReport, FailedEntry};
pub use reconcile::{KindPull, PullReport};
pub use remote::{HttpRemoteApi, RemoteApi, RemoteError, RemoteResult};
pub use session::Session;
pub use worker::SyncWorker;
