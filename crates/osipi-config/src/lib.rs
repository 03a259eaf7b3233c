//! Shared configuration for osipi tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `osipi_core::ConnectionConfig`. The CLI layers its
//! global flags on top of what is resolved here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use osipi_core::{AuthCredentials, ConnectionConfig, TlsVerification};

/// Keyring service name; entries are keyed `{profile}/password` and
/// `{profile}/token`.
pub const KEYRING_SERVICE: &str = "osipi";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to the default profile name.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(String::from)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|p| (name.clone(), p))
            .ok_or(ConfigError::UnknownProfile { name })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Verify server certificates unless a profile says otherwise.
    #[serde(default = "default_verifyssl")]
    pub verifyssl: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            verifyssl: default_verifyssl(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_verifyssl() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}

/// A named PI Web API server profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Root URL (e.g., "https://pi.example.com/piwebapi").
    pub url: String,

    /// "kerberos", "basic" or "anonymous".
    #[serde(default = "default_auth_type")]
    pub auth_type: String,

    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Environment variable holding a pre-negotiated Kerberos token.
    pub token_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override certificate verification.
    pub verifyssl: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,
}

fn default_auth_type() -> String {
    "kerberos".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path. `OSIPI_CONFIG` overrides the platform
/// location.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("OSIPI_CONFIG") {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "osipi", "osipi").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("osipi");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults ← TOML file at `path` ← `OSIPI_*` environment
/// (`__` separates nesting, e.g. `OSIPI_DEFAULTS__TIMEOUT`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("OSIPI_").split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Keyring ─────────────────────────────────────────────────────────

fn keyring_entry(profile_name: &str, kind: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/{kind}"),
    )?)
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "password")?.set_password(password)?;
    Ok(())
}

/// Store a profile's Kerberos token in the system keyring.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "token")?.set_password(token)?;
    Ok(())
}

fn keyring_secret(profile_name: &str, kind: &str) -> Option<SecretString> {
    keyring_entry(profile_name, kind)
        .ok()?
        .get_password()
        .ok()
        .map(SecretString::from)
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve Basic credentials: env → keyring → plaintext.
pub fn resolve_basic_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("OSIPI_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Env var (profile-specific name first)
    let env_names = profile.password_env.iter().map(String::as_str).chain(["OSIPI_PASSWORD"]);
    for name in env_names {
        if let Ok(pw) = std::env::var(name) {
            return Ok((username, SecretString::from(pw)));
        }
    }

    // 2. Keyring
    if let Some(pw) = keyring_secret(profile_name, "password") {
        return Ok((username, pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve a pre-negotiated Kerberos token: `token_env` → `OSIPI_TOKEN`
/// → keyring.
pub fn resolve_kerberos_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    let env_names = profile.token_env.iter().map(String::as_str).chain(["OSIPI_TOKEN"]);
    for name in env_names {
        if let Ok(token) = std::env::var(name) {
            return Ok(SecretString::from(token));
        }
    }

    keyring_secret(profile_name, "token").ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve `AuthCredentials` from a profile's `auth_type` field.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    match profile.auth_type.to_ascii_lowercase().as_str() {
        "kerberos" => Ok(AuthCredentials::Kerberos {
            token: resolve_kerberos_token(profile, profile_name)?,
        }),
        "basic" => {
            let (username, password) = resolve_basic_credentials(profile, profile_name)?;
            Ok(AuthCredentials::Basic { username, password })
        }
        "anonymous" => Ok(AuthCredentials::Anonymous),
        other => Err(ConfigError::Validation {
            field: "auth_type".into(),
            reason: format!("expected 'kerberos', 'basic', or 'anonymous', got '{other}'"),
        }),
    }
}

/// TLS strategy for a profile: `verifyssl = false` wins, then a custom CA,
/// then the system store.
pub fn resolve_tls(profile: &Profile, defaults: &Defaults) -> TlsVerification {
    if !profile.verifyssl.unwrap_or(defaults.verifyssl) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

pub fn parse_url(raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

/// Build a `ConnectionConfig` from a profile, with no CLI flag overrides.
pub fn profile_to_connection_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ConnectionConfig, ConfigError> {
    let defaults = Defaults::default();
    let url = parse_url(&profile.url)?;
    let auth = resolve_auth(profile, profile_name)?;

    Ok(ConnectionConfig {
        url,
        auth,
        tls: resolve_tls(profile, &defaults),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    })
}
