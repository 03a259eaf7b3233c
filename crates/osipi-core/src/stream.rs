// ── Stream kinds and query parameters ──

use serde::{Deserialize, Serialize};

use osipi_api::Params;

/// The read endpoints of a point's data stream.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Current,
    End,
    Recorded,
    RecordedAtTime,
    Interpolated,
    InterpolatedAtTimes,
    Plot,
}

impl StreamKind {
    /// Name of the point link advertising this stream's URL, if any.
    pub fn link_name(self) -> Option<&'static str> {
        match self {
            Self::Current => Some("Value"),
            Self::End => Some("EndValue"),
            Self::Recorded => Some("RecordedData"),
            Self::Interpolated => Some("InterpolatedData"),
            Self::Plot => Some("PlotData"),
            Self::RecordedAtTime | Self::InterpolatedAtTimes => None,
        }
    }

    /// Last path segment of the stream endpoint under `streams/{webId}/`.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Current => "value",
            Self::End => "end",
            Self::Recorded => "recorded",
            Self::RecordedAtTime => "recordedattime",
            Self::Interpolated => "interpolated",
            Self::InterpolatedAtTimes => "interpolatedattimes",
            Self::Plot => "plot",
        }
    }

    /// Whether one fetch yields a single value rather than a series.
    pub fn is_single_value(self) -> bool {
        matches!(self, Self::Current | Self::End | Self::RecordedAtTime)
    }
}

/// Per-subscription arguments captured at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StreamArgs {
    /// Observe only the value at this timestamp (as sent on the wire).
    pub at: Option<String>,
}

impl StreamArgs {
    pub fn at(time: impl Into<String>) -> Self {
        Self {
            at: Some(time.into()),
        }
    }
}

// ── Queries ──────────────────────────────────────────────────────────
//
// Time strings are passed through verbatim, so PI time expressions such
// as `*-1d` or `t+8h` work as well as ISO-8601 timestamps.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum BoundaryType {
    Inside,
    Outside,
    Interpolated,
}

/// Parameters of a recorded-values read.
#[derive(Debug, Clone, Default)]
pub struct RecordedQuery {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub boundary_type: Option<BoundaryType>,
    pub filter_expression: Option<String>,
    pub include_filtered_values: Option<bool>,
    pub max_count: Option<u32>,
}

impl RecordedQuery {
    pub fn to_params(&self) -> Params {
        Params::new()
            .with_opt("startTime", self.start_time.as_deref())
            .with_opt("endTime", self.end_time.as_deref())
            .with_opt("boundaryType", self.boundary_type)
            .with_opt("filterExpression", self.filter_expression.as_deref())
            .with_opt("includeFilteredValues", self.include_filtered_values)
            .with_opt("maxCount", self.max_count)
    }
}

/// Parameters of an interpolated read. `interval` is a PI time span
/// such as `1h` or `30m`.
#[derive(Debug, Clone, Default)]
pub struct InterpolatedQuery {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub interval: Option<String>,
    pub filter_expression: Option<String>,
    pub include_filtered_values: Option<bool>,
}

impl InterpolatedQuery {
    pub fn to_params(&self) -> Params {
        Params::new()
            .with_opt("startTime", self.start_time.as_deref())
            .with_opt("endTime", self.end_time.as_deref())
            .with_opt("interval", self.interval.as_deref())
            .with_opt("filterExpression", self.filter_expression.as_deref())
            .with_opt("includeFilteredValues", self.include_filtered_values)
    }
}

/// Parameters of a plot read.
#[derive(Debug, Clone, Default)]
pub struct PlotQuery {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Number of plot intervals (the service default is 24).
    pub intervals: Option<u32>,
}

impl PlotQuery {
    pub fn to_params(&self) -> Params {
        Params::new()
            .with_opt("startTime", self.start_time.as_deref())
            .with_opt("endTime", self.end_time.as_deref())
            .with_opt("intervals", self.intervals)
    }
}

/// How a write treats an existing value at the same timestamp.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum UpdateOption {
    #[default]
    Replace,
    Insert,
    NoReplace,
    ReplaceOnly,
    InsertNoCompression,
    Remove,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn wire_names_round_trip_case_insensitively() {
        assert_eq!(StreamKind::InterpolatedAtTimes.to_string(), "interpolatedattimes");
        assert_eq!(
            StreamKind::from_str("RecordedAtTime").unwrap(),
            StreamKind::RecordedAtTime
        );
        assert_eq!(StreamKind::from_str("CURRENT").unwrap(), StreamKind::Current);
        assert!(StreamKind::from_str("summary").is_err());
    }

    #[test]
    fn every_stream_has_an_endpoint() {
        for kind in StreamKind::iter() {
            assert!(!kind.endpoint().is_empty());
        }
        assert_eq!(StreamKind::iter().filter(|k| k.is_single_value()).count(), 3);
    }

    #[test]
    fn interpolated_params_skip_unset_fields() {
        let params = InterpolatedQuery {
            interval: Some("2h".into()),
            ..InterpolatedQuery::default()
        }
        .to_params();
        assert_eq!(params.get("interval"), Some("2h"));
        assert!(params.get("startTime").is_none());
    }

    #[test]
    fn recorded_params_render_enums() {
        let params = RecordedQuery {
            start_time: Some("*-1d".into()),
            boundary_type: Some(BoundaryType::Outside),
            max_count: Some(500),
            ..RecordedQuery::default()
        }
        .to_params();
        assert_eq!(params.get("boundaryType"), Some("Outside"));
        assert_eq!(params.get("maxCount"), Some("500"));
    }

    #[test]
    fn update_option_parses() {
        assert_eq!(UpdateOption::from_str("noreplace").unwrap(), UpdateOption::NoReplace);
        assert_eq!(UpdateOption::default().to_string(), "Replace");
    }
}
