// ── Core error types ──
//
// Domain-level errors from osipi-core. Service-reported errors and
// transport failures are carried through as-is; everything else is
// translated from `osipi_api::Error` into a variant callers can match on.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to PI Web API at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Network failure, passed through unmodified from the HTTP transport.
    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    // ── Service errors ───────────────────────────────────────────────
    /// The service embedded a non-empty `Errors` list in its response.
    #[error("PI Web API returned an error: {}", errors.join("; "))]
    Service { errors: Vec<String> },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Entity not found: {entity_type} {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Materialization errors ───────────────────────────────────────
    #[error("{entity} has no link named '{name}'")]
    MissingLink { entity: String, name: String },

    #[error("Attribute '{attribute}' of {entity} is read-only")]
    ImmutableAttribute { entity: String, attribute: String },

    #[error("{entity} has no attribute '{attribute}'")]
    UnknownAttribute { entity: String, attribute: String },

    #[error("No entity shape registered under '{name}'")]
    UnknownShape { name: String },

    // ── Caller errors ────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The service-reported error list, if this is a service error.
    pub fn service_errors(&self) -> Option<&[String]> {
        match self {
            Self::Service { errors } => Some(errors),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<osipi_api::Error> for CoreError {
    fn from(err: osipi_api::Error) -> Self {
        match err {
            osipi_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            osipi_api::Error::Transport(e) => CoreError::Transport(e),
            osipi_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            osipi_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            osipi_api::Error::Service { errors, status: _ } => CoreError::Service { errors },
            osipi_api::Error::Http {
                status: 404,
                message,
            } => CoreError::NotFound {
                entity_type: "resource".into(),
                identifier: message,
            },
            osipi_api::Error::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            osipi_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            osipi_api::Error::MissingLink { name } => CoreError::MissingLink {
                entity: "resource".into(),
                name,
            },
        }
    }
}
