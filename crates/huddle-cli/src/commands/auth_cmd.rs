use std::env;
use std::path::Path;

use huddle_core::auth::{AuthClient, SessionPersistence};
use huddle_core::sync::TransitionReport;
use huddle_core::SyncEngine;

use crate::auth::SessionStore;
use crate::cli::AuthCommands;
use crate::commands::common::open_context;
use crate::config_profiles::{CliProfile, CliProfilesConfig, API_URL_ENV_VAR};
use crate::error::CliError;

pub async fn run_auth(
    command: AuthCommands,
    db_path: &Path,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            profile,
            email,
            password,
        } => run_login(db_path, profile.as_deref().or(global_profile), &email, &password).await,
        AuthCommands::Status { profile } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let stored = SessionStore::new(&profile_name)
                .load_session()
                .map_err(|error| CliError::Auth(error.to_string()))?;

            match stored {
                Some(session) if session.is_expired() => {
                    println!("Profile '{profile_name}' has an expired session. Run `huddle auth login` again.");
                }
                Some(session) => {
                    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                    println!(
                        "Profile '{}' is signed in as {} (user={}, expires_at={})",
                        profile_name, email_label, session.user.id, session.expires_at
                    );
                }
                None => println!("Profile '{profile_name}' is not signed in."),
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            SyncEngine::sign_out(&SessionStore::new(&profile_name))?;
            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}

async fn run_login(
    db_path: &Path,
    profile: Option<&str>,
    email: &str,
    password: &str,
) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let api_base_url = env::var(API_URL_ENV_VAR)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .or_else(|| config.profile(&profile_name).and_then(CliProfile::api_base_url))
        .ok_or(CliError::RemoteNotConfigured)?;

    let client =
        AuthClient::new(&api_base_url).map_err(|error| CliError::Auth(error.to_string()))?;
    let auth = client
        .sign_in(email, password)
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?;

    let context = open_context(db_path, Some(&profile_name))?;
    let (session, report) = context
        .engine
        .complete_login(&context.session, auth, &context.sessions)
        .await?;

    println!(
        "Signed in profile '{}' as {}",
        context.profile_name, session.author_id
    );
    if let Some(line) = format_transition_report(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_transition_report(report: &TransitionReport) -> Option<String> {
    if report.reassigned == 0 {
        return None;
    }
    Some(format!(
        "Took ownership of {} offline records ({} ownership updates queued)",
        report.reassigned, report.ownership_updates
    ))
}
