//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as Json;
use tabled::Tabled;

use osipi_core::{Point, Value, WebApi};

use crate::cli::PointQuery;
use crate::error::CliError;

/// Run the search and materialize the hits, failing when nothing matches.
pub async fn resolve_points(
    api: &WebApi,
    select: &PointQuery,
) -> Result<Vec<Arc<Point>>, CliError> {
    let points = api.points(&select.query, select.count).await?;
    if points.is_empty() {
        return Err(CliError::NotFound {
            resource_type: "point".into(),
            identifier: select.query.clone(),
        });
    }
    tracing::debug!(query = %select.query, matched = points.len(), "resolved points");
    Ok(points)
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Interpret a command-line value: integers and floats are sent as JSON
/// numbers, `true`/`false` as booleans, anything else as text.
pub fn parse_write_value(raw: &str) -> Json {
    if let Ok(i) = raw.parse::<i64>() {
        return Json::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Json::from(f);
        }
    }
    match raw {
        "true" => Json::Bool(true),
        "false" => Json::Bool(false),
        _ => Json::String(raw.to_owned()),
    }
}

// ── Value records ────────────────────────────────────────────────────

/// One value tagged with the point it came from; the unit of every
/// read command's structured output.
#[derive(Debug, Serialize)]
pub struct PointValue {
    pub point: String,
    #[serde(flatten)]
    pub value: Value,
}

impl PointValue {
    pub fn new(point: &Point, value: Value) -> Self {
        Self {
            point: point.name().to_owned(),
            value,
        }
    }

    pub fn many(point: &Point, values: Vec<Value>) -> Vec<Self> {
        values.into_iter().map(|v| Self::new(point, v)).collect()
    }
}

#[derive(Tabled)]
pub struct ValueRow {
    #[tabled(rename = "Point")]
    point: String,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Units")]
    units: String,
    #[tabled(rename = "Quality")]
    quality: String,
}

pub fn value_row(record: &PointValue) -> ValueRow {
    let v = &record.value;
    ValueRow {
        point: record.point.clone(),
        timestamp: format_timestamp(v),
        value: v.payload().to_string(),
        units: v.units_abbreviation().unwrap_or_default().to_owned(),
        quality: quality_label(v).into(),
    }
}

/// `point<TAB>timestamp<TAB>value` for plain output.
pub fn value_line(record: &PointValue) -> String {
    format!(
        "{}\t{}\t{}",
        record.point,
        format_timestamp(&record.value),
        record.value.payload()
    )
}

pub fn format_timestamp(value: &Value) -> String {
    value
        .timestamp()
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_default()
}

pub fn quality_label(value: &Value) -> &'static str {
    match (value.good(), value.questionable(), value.substituted()) {
        (false, ..) => "bad",
        (true, true, _) => "questionable",
        (true, false, true) => "substituted",
        (true, false, false) => "good",
    }
}
