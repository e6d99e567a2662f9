use huddle_core::util::normalize_base_url_option;

use crate::cli::ConfigCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_base_url,
            sync_interval,
            no_activate,
        } => {
            let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = apply_config_init(
                &mut config,
                profile.as_deref().or(global_profile),
                api_base_url,
                sync_interval,
                no_activate,
            )?;
            let path = config.save().map_err(CliError::Config)?;
            println!("Saved profile '{profile_name}' to {}", path.display());
            Ok(())
        }
    }
}

/// Merge `config init` flags into the named profile and return its name.
/// Flags left out keep the stored values.
pub fn apply_config_init(
    config: &mut CliProfilesConfig,
    profile: Option<&str>,
    api_base_url: Option<String>,
    sync_interval: Option<u64>,
    no_activate: bool,
) -> Result<String, CliError> {
    let profile_name = config.resolve_profile_name(profile);
    let mut candidate = config.profile(&profile_name).cloned().unwrap_or_default();
    if let Some(url) = api_base_url {
        candidate.api_base_url = normalize_base_url_option(Some(url));
    }
    if let Some(secs) = sync_interval {
        candidate.sync_interval_secs = Some(secs);
    }
    candidate.sync_config(None).map_err(CliError::Config)?;

    *config.profile_mut_or_default(&profile_name) = candidate;
    if !no_activate || config.active_profile.is_none() {
        config.active_profile = Some(profile_name.clone());
    }
    Ok(profile_name)
}
