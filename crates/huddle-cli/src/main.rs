//! Huddle CLI - shared lists, notes and polls from the terminal
//!
//! Every command writes to the local database first; `huddle sync` pushes
//! queued changes and pulls the server's state.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::{CommandFactory, Parser};
use tracing_subscriber::filter::{Directive, LevelFilter};

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::comment::run_comment;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::group::run_group;
use crate::commands::item::run_item;
use crate::commands::list::run_list;
use crate::commands::note::run_note;
use crate::commands::poll::run_poll;
use crate::commands::queue::run_queue;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "huddle=info"
        .parse::<Directive>()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
        Commands::Config(command) => run_config(command, profile),
        command => {
            let db_path = resolve_db_path(cli.db_path)?;
            match command {
                Commands::Group(command) => run_group(command, &db_path, profile).await,
                Commands::List(command) => run_list(command, &db_path, profile).await,
                Commands::Item(command) => run_item(command, &db_path, profile).await,
                Commands::Note(command) => run_note(command, &db_path, profile).await,
                Commands::Comment(command) => run_comment(command, &db_path, profile).await,
                Commands::Poll(command) => run_poll(command, &db_path, profile).await,
                Commands::Delete { kind, id } => run_delete(kind, &id, &db_path, profile).await,
                Commands::Sync { watch } => run_sync(&db_path, profile, watch).await,
                Commands::Queue {
                    retry_failed,
                    prune,
                    json,
                } => run_queue(&db_path, profile, retry_failed, prune, json).await,
                Commands::Auth(command) => run_auth(command, &db_path, profile).await,
                Commands::Completions { .. } | Commands::Config(_) => Ok(()),
            }
        }
    }
}
