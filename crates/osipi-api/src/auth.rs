use secrecy::{ExposeSecret, SecretString};

/// Which authentication strategy a session uses.
///
/// Marker enum (no data) -- the actual secret material lives in [`Credentials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Kerberos / SPNEGO (`Authorization: Negotiate ...`).
    Kerberos,
    /// HTTP Basic.
    Basic,
    /// No credentials at all (anonymous PI Web API instances).
    Anonymous,
}

/// Credentials for authenticating with a PI Web API server.
///
/// Kerberos negotiation is performed by the host platform; the client only
/// carries the resulting token and replays it on every request.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Pre-acquired SPNEGO token, sent as `Authorization: Negotiate <token>`.
    Negotiate { token: SecretString },

    /// Username/password sent as HTTP Basic auth.
    Basic {
        username: String,
        password: SecretString,
    },

    /// No `Authorization` header.
    Anonymous,
}

impl Credentials {
    pub fn strategy(&self) -> AuthStrategy {
        match self {
            Self::Negotiate { .. } => AuthStrategy::Kerberos,
            Self::Basic { .. } => AuthStrategy::Basic,
            Self::Anonymous => AuthStrategy::Anonymous,
        }
    }

    /// Attach these credentials to an outgoing request.
    pub(crate) fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Negotiate { token } => builder.header(
                reqwest::header::AUTHORIZATION,
                format!("Negotiate {}", token.expose_secret()),
            ),
            Self::Basic { username, password } => {
                builder.basic_auth(username, Some(password.expose_secret()))
            }
            Self::Anonymous => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_matches_variant() {
        let basic = Credentials::Basic {
            username: "piuser".into(),
            password: SecretString::from("secret".to_string()),
        };
        assert_eq!(basic.strategy(), AuthStrategy::Basic);
        assert_eq!(Credentials::Anonymous.strategy(), AuthStrategy::Anonymous);
        let negotiate = Credentials::Negotiate {
            token: SecretString::from("YIIG".to_string()),
        };
        assert_eq!(negotiate.strategy(), AuthStrategy::Kerberos);
    }

    #[test]
    fn debug_output_does_not_leak_secrets() {
        let basic = Credentials::Basic {
            username: "piuser".into(),
            password: SecretString::from("hunter2".to_string()),
        };
        let rendered = format!("{basic:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
