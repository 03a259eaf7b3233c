//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use osipi_config::ConfigError;
use osipi_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const SERVICE: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to PI Web API at {url}")]
    #[diagnostic(
        code(osipi::connection_failed),
        help(
            "Check that the server is reachable and the URL points at the PI Web API root.\n\
             URL: {url}\n\
             Self-signed certificate? Try: osipi info --insecure"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(osipi::auth_failed),
        help(
            "Verify the credentials for this profile.\n\
             Run: osipi config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(osipi::no_credentials),
        help(
            "Configure credentials with: osipi config init\n\
             Or set OSIPI_PASSWORD / OSIPI_TOKEN, or use --auth anonymous."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(osipi::not_found),
        help("Run: osipi points list \"{identifier}\" to check what the query matches")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    // ── Service ──────────────────────────────────────────────────────
    #[error("PI Web API reported {count} error(s): {}", .errors.join("; "))]
    #[diagnostic(
        code(osipi::service_error),
        help("The request reached the server but was rejected. Check the query and times.")
    )]
    Service { count: usize, errors: Vec<String> },

    #[error("API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(osipi::api_error))]
    ApiError { message: String, status: Option<u16> },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(osipi::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(osipi::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: osipi config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(osipi::no_config),
        help(
            "Create a profile with: osipi config init\n\
             Or pass --url (OSIPI_URL). Config expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("{0}")]
    #[diagnostic(code(osipi::config))]
    Config(String),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(osipi::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out")]
    #[diagnostic(
        code(osipi::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(osipi::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Service { .. } => exit_code::SERVICE,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Transport(e) if e.is_timeout() => CliError::Timeout {
                source: Box::new(e),
            },

            CoreError::Transport(e) => CliError::ConnectionFailed {
                url: e.url().map(ToString::to_string).unwrap_or_default(),
                source: Box::new(e),
            },

            CoreError::Service { errors } => CliError::Service {
                count: errors.len(),
                errors,
            },

            CoreError::Api { message, status } => CliError::ApiError { message, status },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                resource_type: entity_type,
                identifier,
            },

            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Config(message),

            err @ (CoreError::MissingLink { .. }
            | CoreError::ImmutableAttribute { .. }
            | CoreError::UnknownAttribute { .. }
            | CoreError::UnknownShape { .. }
            | CoreError::Internal(_)) => CliError::Internal(err.to_string()),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(see: osipi config profiles)".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_exit_nine() {
        let err = CliError::from(CoreError::Service {
            errors: vec!["bad tag".into(), "bad time".into()],
        });
        assert_eq!(err.exit_code(), exit_code::SERVICE);
        assert_eq!(err.to_string(), "PI Web API reported 2 error(s): bad tag; bad time");
    }

    #[test]
    fn not_found_and_auth_codes() {
        let not_found = CliError::from(CoreError::NotFound {
            entity_type: "point".into(),
            identifier: "name:nope".into(),
        });
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);

        let auth = CliError::from(CoreError::AuthenticationFailed {
            message: "401".into(),
        });
        assert_eq!(auth.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn config_errors_map_to_usage_or_auth() {
        let unknown = CliError::from(ConfigError::UnknownProfile { name: "x".into() });
        assert_eq!(unknown.exit_code(), exit_code::USAGE);

        let creds = CliError::from(ConfigError::NoCredentials {
            profile: "plant".into(),
        });
        assert_eq!(creds.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn api_error_shows_status() {
        let err = CliError::from(CoreError::Api {
            message: "Bad Request".into(),
            status: Some(400),
        });
        assert_eq!(err.to_string(), "API error (400): Bad Request");
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
