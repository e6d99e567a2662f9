use std::path::Path;

use huddle_core::sync::{SyncReport, SyncWorker};
use tokio::sync::watch;

use crate::commands::common::open_context;
use crate::error::CliError;

pub async fn run_sync(db_path: &Path, profile: Option<&str>, watch: bool) -> Result<(), CliError> {
    let context = open_context(db_path, profile)?;
    if !context.engine.has_remote() {
        return Err(CliError::RemoteNotConfigured);
    }

    if watch {
        return run_sync_watch(context.engine, context.session).await;
    }

    let report = context.engine.sync_now(&context.session).await?;
    for line in format_sync_report(&report) {
        println!("{line}");
    }
    Ok(())
}

async fn run_sync_watch(
    engine: huddle_core::SyncEngine,
    session: huddle_core::Session,
) -> Result<(), CliError> {
    let (_session_tx, session_rx) = watch::channel(session);
    let interval = engine.config().sync_interval;
    let (handle, shutdown) = SyncWorker::new(engine, session_rx).spawn();
    println!("Syncing every {}s. Press Ctrl-C to stop.", interval.as_secs());

    tokio::signal::ctrl_c().await?;
    // The worker may already have exited; a closed channel is fine here.
    let _ = shutdown.send(());
    if let Err(error) = handle.await {
        tracing::warn!("Sync worker ended abnormally: {error}");
    }
    println!("Sync stopped");
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let drain = &report.drain;
    let mut lines = vec![format!(
        "Pushed {} of {} queued changes ({} retrying, {} waiting on a parent, {} reconciled)",
        drain.completed, drain.attempted, drain.retried, drain.deferred, drain.reconciled
    )];
    lines.extend(drain.failed.iter().map(|failure| {
        format!(
            "  failed {} {} {} {}: {}",
            failure.entry_id,
            failure.action_type,
            failure.subject_kind.as_str(),
            failure.subject_id,
            failure.error
        )
    }));

    let pull = &report.pull;
    lines.push(format!(
        "Pulled {} records ({} kept local because of pending changes)",
        pull.pulled(),
        pull.skipped()
    ));
    lines.extend(
        pull.failed_kinds
            .iter()
            .map(|(kind, error)| format!("  could not pull {}: {error}", kind.as_str())),
    );
    lines
}
