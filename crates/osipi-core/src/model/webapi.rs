// ── Service root ──

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, warn};
use url::Url;

use osipi_api::{Links, Params, SELF_LINK};

use super::point::Point;
use crate::error::CoreError;
use crate::materialize::{Attributes, Materialized, Resource, Shape};
use crate::session::Session;
use crate::stream::{StreamArgs, StreamKind};
use crate::subscription::Subscriptions;

/// Raw indexed-search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResults {
    #[serde(default)]
    pub total_hits: u64,
    #[serde(default)]
    pub items: Vec<Json>,
}

/// The PI Web API service root: entry point for search and subscriptions.
#[derive(Debug, Clone)]
pub struct WebApi {
    url: Url,
    attributes: Attributes,
    links: Links,
    session: Session,
}

impl WebApi {
    pub fn from_json(json: &Json, session: &Session) -> Self {
        let attributes = Attributes::capture_all(json);
        let declared: Vec<&str> = attributes.names().collect();
        let links = Links::extract_excluding(json, &declared);
        let url = links
            .get(SELF_LINK)
            .cloned()
            .unwrap_or_else(|| session.client().base_url().clone());
        Self {
            url,
            attributes,
            links,
            session: session.clone(),
        }
    }

    /// The root URL (its `Self` link, or the URL it was requested from).
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // ── Search ───────────────────────────────────────────────────────

    /// Run an indexed-search query, e.g. `name:sinusoid`.
    pub async fn search(
        &self,
        query: &str,
        count: Option<u32>,
    ) -> Result<SearchResults, CoreError> {
        let url = match self.links.get("Search") {
            Some(search) => {
                let mut url = search.clone();
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push("query");
                }
                url
            }
            None => self.session.client().url("search/query")?,
        };
        let params = Params::new().with("q", query).with_opt("count", count);

        let json = self.session.get(url, &params).await?;
        let results: SearchResults = serde_json::from_value(json)
            .map_err(|e| CoreError::Internal(format!("unexpected search response: {e}")))?;
        debug!(query, hits = results.total_hits, items = results.items.len(), "search");
        Ok(results)
    }

    /// Search and materialize each hit as a [`Point`]. Hits that do not
    /// carry point attributes are fetched through their `Self` link.
    pub async fn points(
        &self,
        query: &str,
        count: Option<u32>,
    ) -> Result<Vec<Arc<Point>>, CoreError> {
        let results = self.search(query, count).await?;
        let registry = self.session.registry();
        let mut points = Vec::with_capacity(results.items.len());

        for item in &results.items {
            if registry.detect(item).is_some_and(|e| e.name() == "Point") {
                points.push(Arc::new(Point::from_json(item, &self.session)));
                continue;
            }

            let links = Links::extract(item);
            let Some(url) = links.get(SELF_LINK).cloned() else {
                warn!(?item, "search hit without a Self link skipped");
                continue;
            };
            let json = self.session.get(url, &Params::new()).await?;
            match self.session.materialize(&json, Some("Point"))? {
                Resource::Point(point) => points.push(point),
                other => points.extend(other.into_points()),
            }
        }

        Ok(points)
    }

    /// `GET points?path=...` for a full point path such as `\\server\tag`.
    pub async fn point_by_path(&self, path: &str) -> Result<Arc<Point>, CoreError> {
        let url = self.session.client().url("points")?;
        let json = self.session.get(url, &Params::new().with("path", path)).await?;
        Ok(Arc::new(Point::from_json(&json, &self.session)))
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register `callback` for changes on `stream` of every point given.
    pub fn subscribe<I, P>(
        &self,
        points: I,
        stream: StreamKind,
        callback: impl Fn(&Point) + Send + Sync + 'static,
        args: StreamArgs,
    ) -> Subscriptions
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Point>,
    {
        self.session
            .subscriptions()
            .subscribe(points, stream, callback, args)
    }

    /// Drop every registration for `stream` on the given points.
    pub fn unsubscribe<I, P>(&self, points: I, stream: StreamKind) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Point>,
    {
        self.session.subscriptions().unsubscribe(points, stream)
    }
}

impl Materialized for WebApi {
    fn shape(&self) -> Shape {
        Shape::WebApi
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn links(&self) -> &Links {
        &self.links
    }

    fn session(&self) -> Option<&Session> {
        Some(&self.session)
    }
}

impl fmt::Display for WebApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<OSIsoft PI Web API [{}]>", self.url)
    }
}
