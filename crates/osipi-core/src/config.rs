// ── Runtime connection configuration ──
//
// These types describe *how* to reach a PI Web API server. They carry
// credential data and connection tuning, but never touch disk.
// The CLI constructs a `ConnectionConfig` and hands it to `connect()`.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use osipi_api::{Credentials, TlsMode, TransportConfig};

/// How to authenticate with the server.
///
/// Carries the actual credential data, unlike `osipi_api::AuthStrategy`
/// which is a zero-data marker.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Pre-negotiated Kerberos/SPNEGO token.
    Kerberos { token: SecretString },
    /// HTTP Basic.
    Basic {
        username: String,
        password: SecretString,
    },
    Anonymous,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (`verifyssl = false`).
    DangerAcceptInvalid,
}

/// Configuration for connecting to a single PI Web API server.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Root URL, e.g. `https://pi.example.com/piwebapi`.
    pub url: Url,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(url: Url, auth: AuthCredentials) -> Self {
        Self {
            url,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub(crate) fn credentials(&self) -> Credentials {
        match &self.auth {
            AuthCredentials::Kerberos { token } => Credentials::Negotiate {
                token: token.clone(),
            },
            AuthCredentials::Basic { username, password } => Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            AuthCredentials::Anonymous => Credentials::Anonymous,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            ..TransportConfig::default()
        }
        .with_timeout(self.timeout)
    }
}
