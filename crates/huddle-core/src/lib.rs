//! huddle-core - Core library for Huddle
//!
//! This crate contains the local-first synchronization engine shared by all
//! Huddle clients: the durable local store, the optimistic write path, the
//! sync queue and its processor, the pull/merge reconciler, and the
//! anonymous-to-authenticated identity transition.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::{RetryPolicy, SyncConfig};
pub use error::{Error, Result};
pub use models::{AnyRecord, AuthorId, EntityKind, RecordId, SyncStatus};
pub use services::LocalStore;
pub use state::SyncState;
pub use sync::{Session, SyncEngine};
