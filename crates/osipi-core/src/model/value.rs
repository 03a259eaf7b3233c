// ── Stream values ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as Json;
use tracing::{trace, warn};

use osipi_api::Links;

use super::datatype::DataTypeFamily;
use crate::materialize::{Attributes, Materialized, Shape};

/// Attribute names a value payload declares.
pub const VALUE_ATTRIBUTES: &[&str] = &[
    "Timestamp",
    "Value",
    "UnitsAbbreviation",
    "Good",
    "Questionable",
    "Substituted",
    "Annotated",
];

/// The recorded quantity of a value, coerced to its point's type family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Int(i64),
    Float(f64),
    Text(String),
    /// Digital state: state name plus its offset in the digital set.
    Digital {
        name: String,
        value: i64,
    },
    Null,
}

impl Payload {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Coerce a raw JSON `Value` field. With no family the JSON encoding
    /// decides: integral numbers become `Int`, others `Float`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn coerce(raw: &Json, family: Option<DataTypeFamily>) -> Self {
        match raw {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Int(i64::from(*b)),
            Json::Number(n) => match family {
                Some(DataTypeFamily::Integer) => match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => Self::Int(i),
                    (None, Some(f)) if f.fract() == 0.0 && f.abs() < 9.2e18 => Self::Int(f as i64),
                    (_, f) => {
                        warn!(%n, "non-integral value for integer point");
                        Self::Float(f.unwrap_or(f64::NAN))
                    }
                },
                Some(DataTypeFamily::Floating) => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
                _ => match n.as_i64() {
                    Some(i) => Self::Int(i),
                    None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
            },
            Json::String(s) => Self::Text(s.clone()),
            Json::Object(map) if map.contains_key("Name") => Self::Digital {
                name: map
                    .get("Name")
                    .and_then(Json::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                value: map.get("Value").and_then(Json::as_i64).unwrap_or_default(),
            },
            other => Self::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Digital { name, .. } => f.write_str(name),
            Self::Null => Ok(()),
        }
    }
}

/// A single time-stamped observation from a point's stream.
///
/// Two values are equal when timestamp, payload and quality agree; the
/// remaining attributes do not participate in change detection.
#[derive(Debug, Clone, Serialize)]
pub struct Value {
    timestamp: Option<DateTime<Utc>>,
    payload: Payload,
    good: bool,
    questionable: bool,
    substituted: bool,
    units_abbreviation: Option<String>,
    #[serde(skip)]
    attributes: Attributes,
    #[serde(skip)]
    links: Links,
}

impl Value {
    /// Build a value from a service payload. Missing fields default
    /// (`Good` defaults to `true`); this never fails.
    pub fn from_json(json: &Json, family: Option<DataTypeFamily>) -> Self {
        let attributes = Attributes::capture(json, VALUE_ATTRIBUTES);
        let timestamp = json
            .get("Timestamp")
            .and_then(Json::as_str)
            .and_then(parse_timestamp);

        Self {
            timestamp,
            payload: Payload::coerce(attributes.value("Value"), family),
            good: json.get("Good").and_then(Json::as_bool).unwrap_or(true),
            questionable: json
                .get("Questionable")
                .and_then(Json::as_bool)
                .unwrap_or(false),
            substituted: json
                .get("Substituted")
                .and_then(Json::as_bool)
                .unwrap_or(false),
            units_abbreviation: json
                .get("UnitsAbbreviation")
                .and_then(Json::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from),
            links: Links::extract_excluding(json, VALUE_ATTRIBUTES),
            attributes,
        }
    }

    /// Materialize every element of an `Items` array, or the body itself
    /// when it is a single value.
    pub fn many_from_json(json: &Json, family: Option<DataTypeFamily>) -> Vec<Self> {
        match json.get("Items").and_then(Json::as_array) {
            Some(items) => items.iter().map(|i| Self::from_json(i, family)).collect(),
            None => vec![Self::from_json(json, family)],
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn good(&self) -> bool {
        self.good
    }

    pub fn questionable(&self) -> bool {
        self.questionable
    }

    pub fn substituted(&self) -> bool {
        self.substituted
    }

    pub fn units_abbreviation(&self) -> Option<&str> {
        self.units_abbreviation.as_deref()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.payload == other.payload
            && self.good == other.good
    }
}

impl Materialized for Value {
    fn shape(&self) -> Shape {
        Shape::Value
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn links(&self) -> &Links {
        &self.links
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp {
            Some(ts) => write!(f, "{} {}", ts.to_rfc3339(), self.payload)?,
            None => write!(f, "- {}", self.payload)?,
        }
        if let Some(units) = &self.units_abbreviation {
            write!(f, " {units}")?;
        }
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            trace!(raw, error = %e, "unparseable timestamp");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_family_coerces_float_encoding() {
        let v = Value::from_json(
            &json!({ "Timestamp": "2017-05-16T07:00:00Z", "Value": 12.0 }),
            Some(DataTypeFamily::Integer),
        );
        assert_eq!(v.payload(), &Payload::Int(12));
    }

    #[test]
    fn floating_family_coerces_integer_encoding() {
        let v = Value::from_json(
            &json!({ "Timestamp": "2017-05-16T07:00:00Z", "Value": 12 }),
            Some(DataTypeFamily::Floating),
        );
        assert_eq!(v.payload(), &Payload::Float(12.0));
    }

    #[test]
    fn digital_state_payload() {
        let v = Value::from_json(
            &json!({
                "Timestamp": "2017-05-16T07:00:00Z",
                "Value": { "Name": "Shutdown", "Value": 248 }
            }),
            Some(DataTypeFamily::Digital),
        );
        assert_eq!(
            v.payload(),
            &Payload::Digital {
                name: "Shutdown".into(),
                value: 248
            }
        );
        assert_eq!(v.payload().to_string(), "Shutdown");
    }

    #[test]
    fn missing_fields_default() {
        let v = Value::from_json(&json!({}), None);
        assert!(v.timestamp().is_none());
        assert!(v.payload().is_null());
        assert!(v.good());
        assert!(!v.questionable());
        assert!(v.attribute("UnitsAbbreviation").unwrap().is_null());
    }

    #[test]
    fn fractional_seconds_parse() {
        let v = Value::from_json(
            &json!({ "Timestamp": "2017-05-16T07:00:00.1234567Z", "Value": 1 }),
            None,
        );
        assert!(v.timestamp().is_some());
    }

    #[test]
    fn equality_ignores_non_observed_fields() {
        let a = Value::from_json(
            &json!({ "Timestamp": "2017-05-16T07:00:00Z", "Value": 1.5, "UnitsAbbreviation": "m" }),
            None,
        );
        let b = Value::from_json(
            &json!({ "Timestamp": "2017-05-16T07:00:00Z", "Value": 1.5, "Substituted": true }),
            None,
        );
        let c = Value::from_json(
            &json!({ "Timestamp": "2017-05-16T07:00:00Z", "Value": 1.6 }),
            None,
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn items_array_yields_many() {
        let body = json!({ "Items": [
            { "Timestamp": "2017-05-16T07:00:00Z", "Value": 1 },
            { "Timestamp": "2017-05-16T08:00:00Z", "Value": 2 }
        ]});
        assert_eq!(Value::many_from_json(&body, None).len(), 2);
    }
}
