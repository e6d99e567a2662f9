use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use huddle_core::models::{Item, List, Note, Poll, Record};
use huddle_core::sync::HttpRemoteApi;
use huddle_core::util::normalize_text_option;
use huddle_core::{LocalStore, RecordId, Session, SyncConfig, SyncEngine};
use serde::Serialize;

use crate::auth::{restore_session, SessionStore};
use crate::config_profiles::{CliProfilesConfig, API_URL_ENV_VAR};
use crate::error::CliError;

pub const DB_PATH_ENV_VAR: &str = "HUDDLE_DB_PATH";

/// Everything a command needs: the engine, the caller's identity, and the
/// profile they were resolved from.
pub struct CommandContext {
    pub engine: SyncEngine,
    pub session: Session,
    pub sessions: SessionStore,
    pub profile_name: String,
}

#[derive(Debug, Serialize)]
pub struct RecordLine {
    pub id: String,
    pub author_id: String,
    pub sync_status: &'static str,
    pub text: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV_VAR).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("huddle").join("huddle.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Open the store at `db_path` and wire it to the remote named by the profile.
/// Without a configured remote the engine runs local-only and every write stays
/// queued.
pub fn open_context(db_path: &Path, profile: Option<&str>) -> Result<CommandContext, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let sync_config = config
        .profile(&profile_name)
        .cloned()
        .unwrap_or_default()
        .sync_config(env::var(API_URL_ENV_VAR).ok())
        .map_err(CliError::Config)?;

    let store = LocalStore::open_path(db_path)?;
    let engine = build_engine(store, sync_config)?;

    let sessions = SessionStore::new(&profile_name);
    let session = restore_session(&sessions).map_err(|error| CliError::Auth(error.to_string()))?;

    Ok(CommandContext {
        engine,
        session,
        sessions,
        profile_name,
    })
}

pub fn build_engine(store: LocalStore, config: SyncConfig) -> Result<SyncEngine, CliError> {
    match config.api_base_url.clone() {
        Some(url) => {
            let remote = HttpRemoteApi::new(url)?;
            Ok(SyncEngine::new(store, Arc::new(remote), config))
        }
        None => Ok(SyncEngine::local_only(store, config)),
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    normalize_text_option(Some(content.to_string()))
}

pub fn join_content(parts: &[String]) -> Result<String, CliError> {
    normalize_content(&parts.join(" ")).ok_or(CliError::EmptyContent)
}

pub fn normalize_record_id(id: &str) -> Result<RecordId, CliError> {
    normalize_content(id)
        .map(RecordId::from)
        .ok_or(CliError::EmptyRecordId)
}

pub fn record_line<R: Record>(record: &R, text: String) -> RecordLine {
    let header = record.header();
    RecordLine {
        id: header.id.to_string(),
        author_id: header.author_id.to_string(),
        sync_status: header.sync_status.as_str(),
        text,
    }
}

pub fn list_line(list: &List) -> RecordLine {
    record_line(list, list.title.clone())
}

pub fn item_line(item: &Item) -> RecordLine {
    let mark = if item.checked { "[x]" } else { "[ ]" };
    record_line(item, format!("{mark} {}", item.content))
}

pub fn note_line(note: &Note) -> RecordLine {
    record_line(note, note.title_preview(60))
}

pub fn poll_line(poll: &Poll) -> RecordLine {
    let options = poll
        .options
        .iter()
        .enumerate()
        .map(|(index, option)| format!("{index}:{} ({})", option.label, option.votes))
        .collect::<Vec<_>>()
        .join(", ");
    record_line(poll, format!("{} [{options}]", poll.question))
}

pub fn format_record_line(line: &RecordLine) -> String {
    format!("{:<40}  {:<14}  {}", line.id, line.sync_status, line.text)
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
