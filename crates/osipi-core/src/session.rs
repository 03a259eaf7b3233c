// ── Session ──
//
// A `Session` bundles the HTTP client, the shape registry and the
// subscription manager. Every entity materialized from a response keeps a
// clone, so link traversal and stream reads go through the same
// credentials and feed the same change detection.

use std::sync::Arc;

use serde_json::Value as Json;
use tracing::{debug, info};
use url::Url;

use osipi_api::{Links, Params, PiClient};

use crate::config::ConnectionConfig;
use crate::error::CoreError;
use crate::materialize::{Resource, Shape, ShapeRegistry};
use crate::model::WebApi;
use crate::subscription::SubscriptionManager;

struct SessionInner {
    client: PiClient,
    registry: ShapeRegistry,
    subscriptions: SubscriptionManager,
}

/// Shared handle to an authenticated PI Web API session.
///
/// Cheaply cloneable via `Arc<SessionInner>`.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("client", &self.inner.client)
            .field("subscriptions", &self.inner.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(client: PiClient) -> Self {
        Self::with_registry(client, ShapeRegistry::default())
    }

    /// Create a session that materializes with a custom registry.
    pub fn with_registry(client: PiClient, registry: ShapeRegistry) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                client,
                registry,
                subscriptions: SubscriptionManager::new(),
            }),
        }
    }

    pub fn client(&self) -> &PiClient {
        &self.inner.client
    }

    pub fn registry(&self) -> &ShapeRegistry {
        &self.inner.registry
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.inner.subscriptions
    }

    /// Whether two handles share one session.
    pub fn same_session(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub async fn get(&self, url: Url, params: &Params) -> Result<Json, CoreError> {
        Ok(self.inner.client.get(url, params).await?)
    }

    /// GET the URL behind link `name` of an entity of shape `owner`.
    pub async fn follow(
        &self,
        owner: Shape,
        links: &Links,
        name: &str,
        params: &Params,
    ) -> Result<Json, CoreError> {
        let url = links
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::MissingLink {
                entity: owner.to_string(),
                name: name.to_owned(),
            })?;
        self.get(url, params).await
    }

    /// Materialize a payload with this session's registry.
    pub fn materialize(&self, json: &Json, hint: Option<&str>) -> Result<Resource, CoreError> {
        self.inner.registry.materialize(json, self, hint)
    }
}

// ── Entry point ──────────────────────────────────────────────────────

/// Open a session and materialize the service root.
pub async fn connect(config: &ConnectionConfig) -> Result<WebApi, CoreError> {
    let client = PiClient::new(config.url.clone(), config.credentials(), &config.transport())?;
    connect_with(client).await
}

/// Like [`connect`], around an already-built client.
pub async fn connect_with(client: PiClient) -> Result<WebApi, CoreError> {
    let session = Session::new(client);
    let root = session.client().base_url().clone();
    debug!(url = %root, auth = ?session.client().auth_strategy(), "connecting");

    let json = session.get(root, &Params::new()).await?;

    let web_api = WebApi::from_json(&json, &session);
    info!(url = %web_api.url(), "connected to PI Web API");
    Ok(web_api)
}
