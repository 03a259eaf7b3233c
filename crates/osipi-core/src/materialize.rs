// ── Object materializer ──
//
// Turns raw JSON payloads into typed, read-only entities. Shapes are kept
// in an ordered registry of (name, detect, parse) entries; a payload is
// resolved by explicit hint first, then by the first entry whose detector
// accepts it. `{"Items": [...]}` containers materialize element-wise.

use std::future::Future;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value as Json};
use tracing::trace;

use osipi_api::{LINKS_KEY, Links, Params};

use crate::error::CoreError;
use crate::model::{Point, Value, WebApi};
use crate::session::Session;

static NULL: Json = Json::Null;

// ── Attributes ───────────────────────────────────────────────────────

/// Declared attributes of an entity, copied verbatim from its payload.
/// A declared attribute missing from the payload is stored as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(IndexMap<String, Json>);

impl Attributes {
    pub fn capture(json: &Json, declared: &[&str]) -> Self {
        Self(
            declared
                .iter()
                .map(|name| {
                    let value = json.get(*name).cloned().unwrap_or(Json::Null);
                    ((*name).to_owned(), value)
                })
                .collect(),
        )
    }

    /// Capture every top-level field except `Links`.
    pub fn capture_all(json: &Json) -> Self {
        let Some(map) = json.as_object() else {
            return Self::default();
        };
        Self(
            map.iter()
                .filter(|(k, _)| k.as_str() != LINKS_KEY)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Json> {
        self.0.get(name)
    }

    /// Like [`get`](Self::get), but `null` for undeclared names.
    pub fn value(&self, name: &str) -> &Json {
        self.0.get(name).unwrap_or(&NULL)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Json)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Materialized ─────────────────────────────────────────────────────

/// Built-in entity shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Shape {
    WebApi,
    Point,
    Value,
    Generic,
}

/// Read-only view shared by every materialized entity.
///
/// Attributes cannot be reassigned after construction: [`set_attribute`]
/// exists only to report that, and leaves the entity untouched.
///
/// [`set_attribute`]: Materialized::set_attribute
pub trait Materialized {
    fn shape(&self) -> Shape;

    fn attributes(&self) -> &Attributes;

    fn links(&self) -> &Links;

    /// The session this entity was fetched through, if any.
    fn session(&self) -> Option<&Session> {
        None
    }

    /// A declared attribute (`Some(null)` when the payload omitted it),
    /// or `None` when the name is not declared for this shape.
    fn attribute(&self, name: &str) -> Option<&Json> {
        self.attributes().get(name)
    }

    /// Always fails: `ImmutableAttribute` for declared names,
    /// `UnknownAttribute` otherwise.
    fn set_attribute(&self, name: &str, _value: Json) -> Result<(), CoreError> {
        let entity = self.shape().to_string();
        if self.attributes().contains(name) {
            Err(CoreError::ImmutableAttribute {
                entity,
                attribute: name.to_owned(),
            })
        } else {
            Err(CoreError::UnknownAttribute {
                entity,
                attribute: name.to_owned(),
            })
        }
    }

    /// GET the URL behind one of this entity's links.
    fn follow(
        &self,
        link: &str,
        params: &Params,
    ) -> impl Future<Output = Result<Json, CoreError>> + Send
    where
        Self: Sync,
    {
        async move {
            let session = detached(self)?;
            session.follow(self.shape(), self.links(), link, params).await
        }
    }

    /// [`follow`](Self::follow) a link and materialize the response.
    fn follow_resource(
        &self,
        link: &str,
        params: &Params,
    ) -> impl Future<Output = Result<Resource, CoreError>> + Send
    where
        Self: Sync,
    {
        async move {
            let session = detached(self)?;
            let json = session.follow(self.shape(), self.links(), link, params).await?;
            session.materialize(&json, None)
        }
    }
}

fn detached<M: Materialized + ?Sized>(entity: &M) -> Result<&Session, CoreError> {
    entity.session().ok_or_else(|| CoreError::Validation {
        message: format!("{} is not attached to a session", entity.shape()),
    })
}

// ── Generic entity ───────────────────────────────────────────────────

/// Fallback for payloads no registered shape recognizes. Every top-level
/// field is an attribute.
#[derive(Debug, Clone)]
pub struct Generic {
    attributes: Attributes,
    links: Links,
    session: Session,
}

impl Generic {
    pub fn from_json(json: &Json, session: &Session) -> Self {
        let attributes = Attributes::capture_all(json);
        let declared: Vec<&str> = attributes.names().collect();
        let links = Links::extract_excluding(json, &declared);
        Self {
            attributes,
            links,
            session: session.clone(),
        }
    }
}

impl Materialized for Generic {
    fn shape(&self) -> Shape {
        Shape::Generic
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

impl Serialize for Generic {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.attributes.serialize(serializer)
    }
}

// ── Resource ─────────────────────────────────────────────────────────

/// The result of materializing a payload.
#[derive(Debug, Clone)]
pub enum Resource {
    WebApi(WebApi),
    Point(Arc<Point>),
    Value(Value),
    Points(Vec<Arc<Point>>),
    Values(Vec<Value>),
    /// A heterogeneous `Items` collection.
    Items(Vec<Resource>),
    Generic(Generic),
}

impl Resource {
    pub fn into_points(self) -> Vec<Arc<Point>> {
        match self {
            Self::Point(p) => vec![p],
            Self::Points(ps) => ps,
            Self::Items(items) => items.into_iter().flat_map(Self::into_points).collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            Self::Value(v) => vec![v],
            Self::Values(vs) => vs,
            Self::Items(items) => items.into_iter().flat_map(Self::into_values).collect(),
            _ => Vec::new(),
        }
    }

    fn collapse(items: Vec<Resource>) -> Self {
        if !items.is_empty() && items.iter().all(|r| matches!(r, Self::Point(_))) {
            return Self::Points(items.into_iter().flat_map(Self::into_points).collect());
        }
        if !items.is_empty() && items.iter().all(|r| matches!(r, Self::Value(_))) {
            return Self::Values(items.into_iter().flat_map(Self::into_values).collect());
        }
        Self::Items(items)
    }
}

// ── Shape registry ───────────────────────────────────────────────────

pub type DetectFn = fn(&Map<String, Json>) -> bool;
pub type ParseFn = fn(&Json, &Session) -> Resource;

/// One registered shape.
#[derive(Clone)]
pub struct ShapeEntry {
    name: String,
    detect: DetectFn,
    parse: ParseFn,
}

impl ShapeEntry {
    pub fn new(name: impl Into<String>, detect: DetectFn, parse: ParseFn) -> Self {
        Self {
            name: name.into(),
            detect,
            parse,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ShapeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered shape registry. The generic fallback always stays last.
#[derive(Debug, Clone)]
pub struct ShapeRegistry {
    entries: Vec<ShapeEntry>,
    fallback: ShapeEntry,
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self {
            entries: vec![
                ShapeEntry::new("Point", is_point, |json, session| {
                    Resource::Point(Arc::new(Point::from_json(json, session)))
                }),
                ShapeEntry::new("Value", is_value, |json, _| {
                    Resource::Value(Value::from_json(json, None))
                }),
                ShapeEntry::new("WebApi", is_web_api, |json, session| {
                    Resource::WebApi(WebApi::from_json(json, session))
                }),
            ],
            fallback: ShapeEntry::new("Generic", |_| true, |json, session| {
                Resource::Generic(Generic::from_json(json, session))
            }),
        }
    }
}

impl ShapeRegistry {
    /// Register an additional shape, checked after the built-in ones.
    pub fn register(&mut self, entry: ShapeEntry) {
        self.entries.push(entry);
    }

    pub fn entry(&self, name: &str) -> Option<&ShapeEntry> {
        self.entries
            .iter()
            .chain(std::iter::once(&self.fallback))
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .chain(std::iter::once(&self.fallback))
            .map(ShapeEntry::name)
    }

    /// First non-fallback entry whose detector accepts `json`.
    pub fn detect(&self, json: &Json) -> Option<&ShapeEntry> {
        let map = json.as_object()?;
        self.entries.iter().find(|e| (e.detect)(map))
    }

    /// Materialize `json`, by `hint` when given, otherwise by detection.
    ///
    /// Only an unknown hint fails; unrecognized payloads become
    /// [`Resource::Generic`].
    pub fn materialize(
        &self,
        json: &Json,
        session: &Session,
        hint: Option<&str>,
    ) -> Result<Resource, CoreError> {
        match hint {
            Some(name) => {
                let entry = self.entry(name).ok_or_else(|| CoreError::UnknownShape {
                    name: name.to_owned(),
                })?;
                Ok(self.apply(entry, json, session))
            }
            None => Ok(self.resolve(json, session)),
        }
    }

    fn apply(&self, entry: &ShapeEntry, json: &Json, session: &Session) -> Resource {
        let own_shape = json.as_object().is_some_and(|m| (entry.detect)(m));
        match items(json) {
            Some(items) if !own_shape => Resource::collapse(
                items
                    .iter()
                    .map(|item| (entry.parse)(item, session))
                    .collect(),
            ),
            _ => (entry.parse)(json, session),
        }
    }

    fn resolve(&self, json: &Json, session: &Session) -> Resource {
        if let Some(entry) = self.detect(json) {
            trace!(shape = entry.name(), "detected shape");
            return (entry.parse)(json, session);
        }
        match items(json) {
            Some(items) => Resource::collapse(
                items
                    .iter()
                    .map(|item| self.resolve(item, session))
                    .collect(),
            ),
            None => (self.fallback.parse)(json, session),
        }
    }
}

fn items(json: &Json) -> Option<&Vec<Json>> {
    match json {
        Json::Array(items) => Some(items),
        Json::Object(map) => map.get("Items").and_then(Json::as_array),
        _ => None,
    }
}

fn is_point(map: &Map<String, Json>) -> bool {
    map.contains_key("PointType") || map.contains_key("PointClass")
}

fn is_value(map: &Map<String, Json>) -> bool {
    map.contains_key("Timestamp") && map.contains_key("Value")
}

fn is_web_api(map: &Map<String, Json>) -> bool {
    map.get(LINKS_KEY)
        .and_then(Json::as_object)
        .is_some_and(|links| links.contains_key("Search"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;

    fn session() -> Session {
        Session::new(osipi_api::PiClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://pi.example.com/piwebapi").unwrap(),
            osipi_api::Credentials::Anonymous,
        ))
    }

    fn point_json(name: &str) -> Json {
        json!({
            "WebId": format!("P0{name}"),
            "Id": 12,
            "Name": name,
            "PointClass": "classic",
            "PointType": "Float32",
            "Links": { "Self": format!("https://pi.example.com/piwebapi/points/P0{name}") }
        })
    }

    #[test]
    fn detects_point() {
        let resource = ShapeRegistry::default()
            .materialize(&point_json("sinusoid"), &session(), None)
            .unwrap();
        let Resource::Point(point) = resource else {
            panic!("expected point, got {resource:?}");
        };
        assert_eq!(point.name(), "sinusoid");
    }

    #[test]
    fn detects_web_api_root() {
        let root = json!({ "Links": {
            "Self": "https://pi.example.com/piwebapi/",
            "Search": "https://pi.example.com/piwebapi/search"
        }});
        let resource = ShapeRegistry::default()
            .materialize(&root, &session(), None)
            .unwrap();
        assert!(matches!(resource, Resource::WebApi(_)));
    }

    #[test]
    fn homogeneous_items_collapse_to_points() {
        let body = json!({ "Items": [point_json("a"), point_json("b")] });
        let resource = ShapeRegistry::default()
            .materialize(&body, &session(), None)
            .unwrap();
        let Resource::Points(points) = resource else {
            panic!("expected points, got {resource:?}");
        };
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn items_collapse_to_values() {
        let body = json!({ "Items": [
            { "Timestamp": "2017-05-16T07:00:00Z", "Value": 1 },
            { "Timestamp": "2017-05-16T08:00:00Z", "Value": 2 }
        ]});
        let values = ShapeRegistry::default()
            .materialize(&body, &session(), None)
            .unwrap()
            .into_values();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn hint_overrides_detection() {
        let body = json!({ "Timestamp": "2017-05-16T07:00:00Z", "Value": 1 });
        let resource = ShapeRegistry::default()
            .materialize(&body, &session(), Some("generic"))
            .unwrap();
        assert!(matches!(resource, Resource::Generic(_)));
    }

    #[test]
    fn unknown_hint_is_an_error() {
        let err = ShapeRegistry::default()
            .materialize(&json!({}), &session(), Some("Table"))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownShape { .. }));
    }

    #[test]
    fn unrecognized_payload_is_generic() {
        let body = json!({ "Name": "x", "Links": { "Self": "https://pi/x" } });
        let Resource::Generic(generic) = ShapeRegistry::default()
            .materialize(&body, &session(), None)
            .unwrap()
        else {
            panic!("expected generic");
        };
        assert_eq!(generic.attribute("Name").unwrap(), "x");
        assert!(generic.links().contains("Self"));
        assert!(generic.attribute("Links").is_none());
    }

    #[test]
    fn registered_shapes_are_checked_before_fallback() {
        let mut registry = ShapeRegistry::default();
        registry.register(ShapeEntry::new(
            "Server",
            |m| m.contains_key("ServerVersion"),
            |json, session| Resource::Generic(Generic::from_json(json, session)),
        ));
        assert_eq!(
            registry.detect(&json!({ "ServerVersion": "2017" })).unwrap().name(),
            "Server"
        );
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["Point", "Value", "WebApi", "Server", "Generic"]
        );
    }

    #[test]
    fn declared_attributes_cannot_be_set() {
        let point = Point::from_json(&point_json("sinusoid"), &session());
        let err = point.set_attribute("Name", json!("cdt158")).unwrap_err();
        assert!(matches!(err, CoreError::ImmutableAttribute { .. }));
        assert_eq!(point.attribute("Name").unwrap(), "sinusoid");

        let err = point.set_attribute("Nonsense", json!(1)).unwrap_err();
        assert!(matches!(err, CoreError::UnknownAttribute { .. }));
    }

    #[test]
    fn absent_declared_attribute_is_null() {
        let point = Point::from_json(&point_json("sinusoid"), &session());
        assert_eq!(point.attribute("Descriptor"), Some(&Json::Null));
    }
}
