// ── PI points ──
//
// A point's descriptive attributes are fixed at materialization. Its
// current value lives in an atomically swapped slot: reads never block,
// and a refresh replaces the whole `Value` rather than mutating it.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::Serialize;
use serde_json::{Value as Json, json};
use tracing::debug;
use url::Url;

use osipi_api::{Links, Params};

use super::datatype::DataType;
use super::value::Value;
use crate::error::CoreError;
use crate::materialize::{Attributes, Materialized, Shape};
use crate::session::Session;
use crate::stream::{InterpolatedQuery, PlotQuery, RecordedQuery, StreamKind, UpdateOption};

/// Attribute names a point payload declares.
pub const POINT_ATTRIBUTES: &[&str] = &[
    "WebId",
    "Id",
    "Name",
    "Path",
    "Descriptor",
    "PointClass",
    "PointType",
    "DigitalSetName",
    "EngineeringUnits",
    "Span",
    "Zero",
    "Step",
    "Future",
    "DisplayDigits",
];

/// A PI point (tag).
#[derive(Debug, Serialize)]
pub struct Point {
    web_id: String,
    id: Option<i64>,
    name: String,
    path: Option<String>,
    descriptor: Option<String>,
    point_class: Option<String>,
    datatype: DataType,
    engineering_units: Option<String>,
    step: bool,
    future: bool,
    #[serde(skip)]
    current: ArcSwapOption<Value>,
    #[serde(skip)]
    attributes: Attributes,
    #[serde(skip)]
    links: Links,
    #[serde(skip)]
    session: Session,
}

impl Point {
    /// Build a point from a service payload. An embedded `Value` or
    /// `Current` object seeds the current-value slot.
    pub fn from_json(json: &Json, session: &Session) -> Self {
        let attributes = Attributes::capture(json, POINT_ATTRIBUTES);
        let text = |name: &str| {
            json.get(name)
                .and_then(Json::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        let flag = |name: &str| json.get(name).and_then(Json::as_bool).unwrap_or(false);

        let datatype = json
            .get("PointType")
            .and_then(Json::as_str)
            .map_or_else(DataType::untyped, DataType::parse);

        let current = ["Value", "Current"]
            .iter()
            .filter_map(|key| json.get(*key))
            .find(|v| v.is_object())
            .map(|v| Arc::new(Value::from_json(v, Some(datatype.family()))));

        Self {
            web_id: text("WebId").unwrap_or_default(),
            id: json.get("Id").and_then(Json::as_i64),
            name: text("Name").unwrap_or_default(),
            path: text("Path"),
            descriptor: text("Descriptor"),
            point_class: text("PointClass"),
            engineering_units: text("EngineeringUnits"),
            step: flag("Step"),
            future: flag("Future"),
            current: ArcSwapOption::new(current),
            links: Links::extract_excluding(json, POINT_ATTRIBUTES),
            attributes,
            datatype,
            session: session.clone(),
        }
    }

    pub fn web_id(&self) -> &str {
        &self.web_id
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn descriptor(&self) -> Option<&str> {
        self.descriptor.as_deref()
    }

    pub fn point_class(&self) -> Option<&str> {
        self.point_class.as_deref()
    }

    pub fn datatype(&self) -> &DataType {
        &self.datatype
    }

    pub fn engineering_units(&self) -> Option<&str> {
        self.engineering_units.as_deref()
    }

    pub fn step(&self) -> bool {
        self.step
    }

    pub fn future(&self) -> bool {
        self.future
    }

    /// The most recently fetched current value, if any.
    pub fn current_value(&self) -> Option<Arc<Value>> {
        self.current.load_full()
    }

    // ── Stream reads ─────────────────────────────────────────────────

    /// Snapshot value, or the value at `time` when given.
    pub async fn current(&self, time: Option<&str>) -> Result<Value, CoreError> {
        let params = Params::new().with_opt("time", time);
        let times: Vec<String> = time.map(String::from).into_iter().collect();
        self.read_one(StreamKind::Current, &params, &times).await
    }

    /// Last recorded value.
    pub async fn end(&self) -> Result<Value, CoreError> {
        self.read_one(StreamKind::End, &Params::new(), &[]).await
    }

    /// Recorded value at exactly `time` (service retrieval mode applies).
    pub async fn recorded_at_time(&self, time: &str) -> Result<Value, CoreError> {
        let params = Params::new().with("time", time);
        self.read_one(StreamKind::RecordedAtTime, &params, &[time.to_owned()])
            .await
    }

    pub async fn recorded(&self, query: &RecordedQuery) -> Result<Vec<Value>, CoreError> {
        self.read(StreamKind::Recorded, &query.to_params(), &[]).await
    }

    pub async fn interpolated(&self, query: &InterpolatedQuery) -> Result<Vec<Value>, CoreError> {
        self.read(StreamKind::Interpolated, &query.to_params(), &[]).await
    }

    /// Interpolated values at each of `times`, in request order.
    pub async fn interpolated_at_times<S: AsRef<str>>(
        &self,
        times: &[S],
    ) -> Result<Vec<Value>, CoreError> {
        let times: Vec<String> = times.iter().map(|t| t.as_ref().to_owned()).collect();
        let params: Params = times.iter().map(|t| ("time", t.as_str())).collect();
        self.read(StreamKind::InterpolatedAtTimes, &params, &times).await
    }

    pub async fn plot(&self, query: &PlotQuery) -> Result<Vec<Value>, CoreError> {
        self.read(StreamKind::Plot, &query.to_params(), &[]).await
    }

    async fn read_one(
        &self,
        stream: StreamKind,
        params: &Params,
        times: &[String],
    ) -> Result<Value, CoreError> {
        self.read(stream, params, times)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Api {
                message: format!("{stream} read of {} returned no value", self.name),
                status: None,
            })
    }

    /// One GET, then the value slot and change detection are updated.
    async fn read(
        &self,
        stream: StreamKind,
        params: &Params,
        times: &[String],
    ) -> Result<Vec<Value>, CoreError> {
        let url = self.stream_url(stream)?;
        let json = self.session.get(url, params).await?;
        let values = Value::many_from_json(&json, Some(self.datatype.family()));
        debug!(point = %self.name, %stream, count = values.len(), "stream read");

        if stream == StreamKind::Current && times.is_empty() {
            if let Some(latest) = values.first() {
                self.current.store(Some(Arc::new(latest.clone())));
            }
        }

        self.session
            .subscriptions()
            .observe(self, stream, &values, times);
        Ok(values)
    }

    /// Resolve a stream endpoint: the advertised link when present,
    /// otherwise a sibling of the `Value` link, otherwise
    /// `{root}/streams/{webId}/{endpoint}`.
    pub fn stream_url(&self, stream: StreamKind) -> Result<Url, CoreError> {
        if let Some(url) = stream.link_name().and_then(|name| self.links.get(name)) {
            return Ok(url.clone());
        }

        if let Some(value_link) = self.links.get("Value") {
            let mut url = value_link.clone();
            url.set_query(None);
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().pop().push(stream.endpoint());
            }
            return Ok(url);
        }

        if self.web_id.is_empty() {
            return Err(CoreError::MissingLink {
                entity: Shape::Point.to_string(),
                name: stream.link_name().unwrap_or(stream.endpoint()).to_owned(),
            });
        }
        Ok(self
            .session
            .client()
            .url(&format!("streams/{}/{}", self.web_id, stream.endpoint()))?)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Write one value at `timestamp` (a PI time expression, `*` = now).
    pub async fn update_value(
        &self,
        timestamp: &str,
        value: impl Into<Json>,
        option: UpdateOption,
    ) -> Result<(), CoreError> {
        let url = self.stream_url(StreamKind::Current)?;
        let body = json!({ "Timestamp": timestamp, "Value": value.into() });
        let params = Params::new().with("updateOption", option);

        self.session.client().post(url, &params, &body).await?;
        debug!(point = %self.name, timestamp, %option, "value written");
        Ok(())
    }

    /// Write several values in one request. `timestamps` and `values`
    /// pair up by position and must have the same length.
    pub async fn update_values<S: AsRef<str>>(
        &self,
        timestamps: &[S],
        values: &[Json],
        option: UpdateOption,
    ) -> Result<(), CoreError> {
        if timestamps.len() != values.len() {
            return Err(CoreError::Validation {
                message: format!(
                    "{} timestamps but {} values",
                    timestamps.len(),
                    values.len()
                ),
            });
        }

        let url = self.stream_url(StreamKind::Recorded)?;
        let body: Vec<Json> = timestamps
            .iter()
            .zip(values)
            .map(|(ts, v)| json!({ "Timestamp": ts.as_ref(), "Value": v }))
            .collect();
        let params = Params::new().with("updateOption", option);

        self.session.client().post(url, &params, &body).await?;
        debug!(point = %self.name, count = body.len(), %option, "values written");
        Ok(())
    }
}

impl AsRef<Point> for Point {
    fn as_ref(&self) -> &Point {
        self
    }
}

impl Materialized for Point {
    fn shape(&self) -> Shape {
        Shape::Point
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

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<OSIsoft PI Point [{} - {}]>", self.name, self.datatype)
    }
}
