use std::path::Path;

use huddle_core::models::QueueEntry;
use serde::Serialize;

use crate::commands::common::{format_timestamp, open_context};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct QueueEntryItem {
    pub id: i64,
    pub action_type: &'static str,
    pub subject_kind: &'static str,
    pub subject_id: String,
    pub status: &'static str,
    pub retry_count: u32,
    pub next_attempt_at: Option<i64>,
    pub depends_on: Option<i64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueueReport {
    state: &'static str,
    pending: Vec<QueueEntryItem>,
    failed: Vec<QueueEntryItem>,
}

pub fn queue_entry_to_item(entry: &QueueEntry) -> QueueEntryItem {
    QueueEntryItem {
        id: entry.id.0,
        action_type: entry.action.action_type(),
        subject_kind: entry.subject_kind.as_str(),
        subject_id: entry.subject_id.to_string(),
        status: entry.status.as_str(),
        retry_count: entry.retry_count,
        next_attempt_at: entry.next_attempt_at,
        depends_on: entry.depends_on.map(|id| id.0),
        last_error: entry.last_error.clone(),
    }
}

pub fn format_queue_entry(item: &QueueEntryItem) -> String {
    let mut line = format!(
        "#{:<5} {:<16} {:<8} {}",
        item.id, item.action_type, item.subject_kind, item.subject_id
    );
    if let Some(parent) = item.depends_on {
        line.push_str(&format!("  after=#{parent}"));
    }
    if item.retry_count > 0 {
        line.push_str(&format!("  attempts={}", item.retry_count));
    }
    if let Some(next) = item.next_attempt_at {
        line.push_str(&format!("  next={}", format_timestamp(next)));
    }
    if let Some(error) = &item.last_error {
        line.push_str(&format!("  error={error}"));
    }
    line
}

pub async fn run_queue(
    db_path: &Path,
    profile: Option<&str>,
    retry_failed: bool,
    prune: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let context = open_context(db_path, profile)?;
    let engine = &context.engine;

    if retry_failed {
        let reset = engine.retry_failed().await?;
        println!("Requeued {reset} failed entries");
    }
    if prune {
        let pruned = engine.prune_completed().await?;
        println!("Pruned {pruned} completed entries");
    }

    let report = QueueReport {
        state: engine.status().await?.label(),
        pending: engine
            .pending_entries()
            .await?
            .iter()
            .map(queue_entry_to_item)
            .collect(),
        failed: engine
            .failed_entries()
            .await?
            .iter()
            .map(queue_entry_to_item)
            .collect(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Sync state: {} ({} pending, {} failed)",
        report.state,
        report.pending.len(),
        report.failed.len()
    );
    for item in report.pending.iter().chain(&report.failed) {
        println!("{} [{}]", format_queue_entry(item), item.status);
    }
    Ok(())
}
