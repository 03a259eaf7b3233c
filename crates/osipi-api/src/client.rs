// PI Web API HTTP client
//
// Wraps `reqwest::Client` with credential injection, query-parameter
// merging and the PI Web API error conventions. The service reports
// failures by embedding an `Errors` list in an otherwise ordinary JSON
// body, sometimes alongside HTTP 200, so every response is inspected.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{AuthStrategy, Credentials};
use crate::error::Error;
use crate::links::service_errors;
use crate::transport::TransportConfig;

// ── Query parameters ─────────────────────────────────────────────────

/// Ordered query parameters. Repeated keys are allowed (`time=a&time=b`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    /// Append a parameter only when `value` is present.
    pub fn with_opt(mut self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    pub fn extend(&mut self, other: &Params) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge into `url`'s own query string. Keys supplied here replace any
    /// same-named keys already present on the URL.
    pub fn merged_into(&self, mut url: Url) -> Url {
        if self.is_empty() {
            return url;
        }
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !self.0.iter().any(|(p, _)| p.eq_ignore_ascii_case(k)))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (k, v) in kept.iter().chain(self.0.iter()) {
                pairs.append_pair(k, v);
            }
        }
        url
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }
}

// ── Client ───────────────────────────────────────────────────────────

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

/// Authenticated session against one PI Web API server.
///
/// Cloning is cheap and shares the underlying connection pool, so the same
/// session can be handed to every entity materialized from its responses.
#[derive(Clone)]
pub struct PiClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for PiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("auth", &self.inner.credentials.strategy())
            .finish_non_exhaustive()
    }
}

impl PiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the PI Web API root, e.g. `https://pi.example.com/piwebapi`.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                credentials,
            }),
        }
    }

    /// The PI Web API root URL this session was opened against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn auth_strategy(&self) -> AuthStrategy {
        self.inner.credentials.strategy()
    }

    /// Resolve a path relative to the root URL (`{base}/{path}`).
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET `url` with `params` merged into its query and return the JSON body.
    pub async fn get(&self, url: Url, params: &Params) -> Result<Value, Error> {
        let url = params.merged_into(url);
        debug!("GET {}", url);

        let builder = self.inner.credentials.apply(self.inner.http.get(url));
        let resp = builder.send().await.map_err(Error::Transport)?;

        self.parse_response(resp)
            .await?
            .ok_or_else(|| Error::Deserialization {
                message: "empty response body".into(),
                body: String::new(),
            })
    }

    /// POST a JSON body. Write endpoints usually answer 202/204 with no
    /// body, in which case `None` is returned.
    pub async fn post(
        &self,
        url: Url,
        params: &Params,
        body: &(impl Serialize + Sync),
    ) -> Result<Option<Value>, Error> {
        let url = params.merged_into(url);
        debug!("POST {}", url);

        let builder = self.inner.credentials.apply(self.inner.http.post(url).json(body));
        let resp = builder.send().await.map_err(Error::Transport)?;

        self.parse_response(resp).await
    }

    /// Inspect status and body, surfacing embedded `Errors` lists.
    async fn parse_response(&self, resp: reqwest::Response) -> Result<Option<Value>, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: format!(
                    "credentials rejected ({:?} auth)",
                    self.inner.credentials.strategy()
                ),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        trace!(status = status.as_u16(), len = body.len(), "response received");

        if body.trim().is_empty() {
            if status.is_success() {
                return Ok(None);
            }
            return Err(Error::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("no response body")
                    .into(),
            });
        }

        let json: Value = match serde_json::from_str(&body) {
            Ok(json) => json,
            Err(e) if status.is_success() => {
                let preview: String = body.chars().take(200).collect();
                return Err(Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                });
            }
            Err(_) => {
                return Err(Error::Http {
                    status: status.as_u16(),
                    message: body.chars().take(200).collect(),
                });
            }
        };

        if let Some(errors) = service_errors(&json) {
            warn!(?errors, "PI Web API returned an error");
            return Err(Error::Service {
                errors,
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let message = json
                .get("Message")
                .and_then(Value::as_str)
                .map_or_else(|| json.to_string(), String::from);
            return Err(Error::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Some(json))
    }
}
