//! CLI-side configuration: profile selection and global-flag overrides
//! on top of `osipi_config`.
//!
//! Core never sees these types -- it receives a pre-built `ConnectionConfig`.

use std::time::Duration;

use osipi_config::{Config, Profile};
use osipi_core::{ConnectionConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use osipi_config::{config_path, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Layer `--url`, `--auth`, `--username` and `--timeout` over a profile.
fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref url) = global.url {
        profile.url.clone_from(url);
    }
    if let Some(auth) = global.auth {
        profile.auth_type = auth.as_str().into();
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
}

/// Build a `ConnectionConfig` from the config file, profile, and CLI overrides.
///
/// Without a matching profile, `--url` alone is enough; authentication then
/// defaults to anonymous unless `--auth` says otherwise.
pub fn build_connection_config(global: &GlobalOpts) -> Result<ConnectionConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.url.is_some() => Profile {
            auth_type: "anonymous".into(),
            ..Profile::default()
        },
        None if global.profile.is_some() => {
            let available: Vec<_> = cfg.profiles.keys().cloned().collect();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };
    apply_overrides(&mut profile, global);
    tracing::debug!(
        profile = %profile_name,
        url = %profile.url,
        auth = %profile.auth_type,
        "resolved profile"
    );

    let url = osipi_config::parse_url(&profile.url)?;
    let auth = osipi_config::resolve_auth(&profile, &profile_name)?;
    let tls = if global.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        osipi_config::resolve_tls(&profile, &cfg.defaults)
    };
    let timeout = Duration::from_secs(profile.timeout.unwrap_or(cfg.defaults.timeout));

    Ok(ConnectionConfig {
        url,
        auth,
        tls,
        timeout,
    })
}
