//! Error types for huddle-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::sync::RemoteError;

/// Result type alias using huddle-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in huddle-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local transaction failed; nothing from the call was committed
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote API error surfaced outside the drain loop
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Session or credential error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Ownership reassignment at login failed and was rolled back
    #[error("Identity transition failed: {0}")]
    IdentityTransition(String),
}
