use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] huddle_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No text provided")]
    EmptyContent,
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("{kind} not found: {id}")]
    RecordNotFound { kind: &'static str, id: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "No remote is configured. Run `huddle config init --api-base-url <URL>` or set HUDDLE_API_URL."
    )]
    RemoteNotConfigured,
}
