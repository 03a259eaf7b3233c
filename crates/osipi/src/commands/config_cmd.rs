//! Config subcommand handlers.

use std::fmt::Write;

use dialoguer::{Confirm, Input, Select};

use osipi_config::{Config, Profile};

use crate::cli::{AuthType, ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "verifyssl = {}", cfg.defaults.verifyssl);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "url = \"{}\"", p.url);
        let _ = writeln!(out, "auth_type = \"{}\"", p.auth_type);
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(verify) = p.verifyssl {
            let _ = writeln!(out, "verifyssl = {verify}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

/// A copy of the config with stored secrets masked, for structured output.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some("****".into());
        }
    }
    cfg
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Map a dialoguer / interactive I/O failure into `CliError`.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_secret(prompt: &str, field: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(prompt).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Offer to store a password in the system keyring or return it for
/// plaintext config.
///
/// Returns `Some(password)` if the user chose plaintext, `None` if stored
/// in the keyring.
fn prompt_keyring_storage(profile_name: &str, password: &str) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        osipi_config::store_password(profile_name, password)?;
        eprintln!("   ✓ Password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password.to_owned()))
    }
}

fn parse_flag<T: std::str::FromStr>(key: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("must be {expected}"),
    })
}

/// Apply `config set <key> <value>` to a profile.
fn set_profile_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "url" => {
            osipi_config::parse_url(&value)?;
            profile.url = value;
        }
        "auth_type" | "auth-type" => {
            if !matches!(value.as_str(), "kerberos" | "basic" | "anonymous") {
                return Err(CliError::Validation {
                    field: "auth_type".into(),
                    reason: "must be 'kerberos', 'basic', or 'anonymous'".into(),
                });
            }
            profile.auth_type = value;
        }
        "username" => profile.username = Some(value),
        "password_env" | "password-env" => profile.password_env = Some(value),
        "token_env" | "token-env" => profile.token_env = Some(value),
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        "verifyssl" => profile.verifyssl = Some(parse_flag(key, &value, "'true' or 'false'")?),
        "timeout" => profile.timeout = Some(parse_flag(key, &value, "a number (seconds)")?),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: url, auth_type, username, \
                     password_env, token_env, ca_cert, verifyssl, timeout"
                ),
            });
        }
    }
    Ok(())
}

// ── Init wizard ─────────────────────────────────────────────────────

fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("osipi configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let url: String = Input::new()
        .with_prompt("PI Web API URL")
        .default("https://localhost/piwebapi".into())
        .validate_with(|input: &String| {
            osipi_config::parse_url(input)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_err)?;

    let auth_choices = &["Kerberos", "Basic (username/password)", "Anonymous"];
    let auth = match Select::new()
        .with_prompt("Authentication method")
        .items(auth_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?
    {
        0 => AuthType::Kerberos,
        1 => AuthType::Basic,
        _ => AuthType::Anonymous,
    };

    let mut profile = Profile {
        url,
        auth_type: auth.as_str().into(),
        ..Profile::default()
    };

    match auth {
        AuthType::Basic => {
            let username: String = Input::new()
                .with_prompt("Username")
                .interact_text()
                .map_err(prompt_err)?;
            let password = prompt_secret("Password: ", "password")?;
            profile.username = Some(username);
            profile.password = prompt_keyring_storage(&profile_name, &password)?;
        }
        AuthType::Kerberos => {
            let token_env: String = Input::new()
                .with_prompt("Environment variable holding the Negotiate token")
                .default("OSIPI_TOKEN".into())
                .interact_text()
                .map_err(prompt_err)?;
            if token_env != "OSIPI_TOKEN" {
                profile.token_env = Some(token_env);
            }
        }
        AuthType::Anonymous => {}
    }

    let verify = Confirm::new()
        .with_prompt("Verify the server's TLS certificate?")
        .default(true)
        .interact()
        .map_err(prompt_err)?;
    if !verify {
        profile.verifyssl = Some(false);
    }

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: osipi info");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |c| {
                c.profiles.keys().cloned().collect::<Vec<_>>().join("\n")
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_insert_with(|| Profile {
                auth_type: "kerberos".into(),
                ..Profile::default()
            });
            set_profile_key(profile, &key, value)?;

            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: osipi config init");
            } else {
                for (name, profile) in &cfg.profiles {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}\t{}", profile.url);
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: available_profiles(&cfg),
                    name,
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            let prof = cfg
                .profiles
                .get(&profile_name)
                .ok_or_else(|| CliError::ProfileNotFound {
                    name: profile_name.clone(),
                    available: available_profiles(&cfg),
                })?;

            match prof.auth_type.as_str() {
                "basic" => {
                    let password = prompt_secret("Password: ", "password")?;
                    osipi_config::store_password(&profile_name, &password)?;
                }
                "kerberos" => {
                    let token = prompt_secret("Negotiate token: ", "token")?;
                    osipi_config::store_token(&profile_name, &token)?;
                }
                other => {
                    return Err(CliError::Validation {
                        field: "auth_type".into(),
                        reason: format!(
                            "profile '{profile_name}' uses '{other}' and has no secret"
                        ),
                    });
                }
            }

            eprintln!("✓ Secret stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}
