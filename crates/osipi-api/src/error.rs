use thiserror::Error;

/// Top-level error type for the `osipi-api` crate.
///
/// Covers every failure mode of the HTTP session wrapper: authentication,
/// transport, service-reported errors and payload decoding.
/// `osipi-core` maps these into domain-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The service rejected the supplied credentials (HTTP 401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate loading error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Service ─────────────────────────────────────────────────────
    /// The PI Web API embedded a non-empty `Errors` list in its response.
    #[error("PI Web API returned an error: {}", errors.join("; "))]
    Service { errors: Vec<String>, status: u16 },

    /// Non-success HTTP status without a structured `Errors` body.
    #[error("PI Web API error (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A hyperlink was requested that the resource does not advertise.
    #[error("Resource has no link named '{name}'")]
    MissingLink { name: String },
}

impl Error {
    /// Returns `true` if the service reported errors in the response body.
    pub fn is_service_error(&self) -> bool {
        matches!(self, Self::Service { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } | Self::Service { status: 404, .. } => true,
            _ => false,
        }
    }

    /// The errors reported by the service, if any.
    pub fn service_errors(&self) -> Option<&[String]> {
        match self {
            Self::Service { errors, .. } => Some(errors),
            _ => None,
        }
    }
}
