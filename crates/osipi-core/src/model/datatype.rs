// ── Point data types ──

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Broad family a point's data type belongs to. Drives payload coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum DataTypeFamily {
    Integer,
    Floating,
    Text,
    Digital,
    Other,
}

/// A point's data-type tag (`PointType` in the service payload).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DataType {
    Int16,
    Int32,
    Int64,
    Float16,
    Float32,
    Float64,
    String,
    Digital,
    Timestamp,
    Blob,
    /// Any tag not in the table, kept verbatim. Empty when the payload
    /// carried no tag.
    Other(std::string::String),
}

// Tag → (type, family). Lookups are case-insensitive.
const TABLE: &[(&str, DataType, DataTypeFamily)] = &[
    ("Int16", DataType::Int16, DataTypeFamily::Integer),
    ("Int32", DataType::Int32, DataTypeFamily::Integer),
    ("Int64", DataType::Int64, DataTypeFamily::Integer),
    ("Float16", DataType::Float16, DataTypeFamily::Floating),
    ("Float32", DataType::Float32, DataTypeFamily::Floating),
    ("Float64", DataType::Float64, DataTypeFamily::Floating),
    ("String", DataType::String, DataTypeFamily::Text),
    ("Digital", DataType::Digital, DataTypeFamily::Digital),
    ("Timestamp", DataType::Timestamp, DataTypeFamily::Other),
    ("Blob", DataType::Blob, DataTypeFamily::Other),
];

impl DataType {
    /// Parse a service tag. Unknown tags become [`DataType::Other`].
    pub fn parse(tag: &str) -> Self {
        TABLE
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(tag))
            .map_or_else(|| Self::Other(tag.to_owned()), |(_, ty, _)| ty.clone())
    }

    /// Placeholder for a point whose payload carried no `PointType`.
    pub fn untyped() -> Self {
        Self::Other(std::string::String::new())
    }

    pub fn family(&self) -> DataTypeFamily {
        TABLE
            .iter()
            .find(|(_, ty, _)| ty == self)
            .map_or(DataTypeFamily::Other, |(_, _, family)| *family)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Other(tag) => tag,
            known => TABLE
                .iter()
                .find(|(_, ty, _)| ty == known)
                .map_or("Other", |(name, _, _)| name),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = std::string::String::deserialize(deserializer)?;
        Ok(Self::parse(&tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(DataType::parse("float32"), DataType::Float32);
        assert_eq!(DataType::parse("INT16"), DataType::Int16);
    }

    #[test]
    fn families_follow_table() {
        assert_eq!(DataType::Int32.family(), DataTypeFamily::Integer);
        assert_eq!(DataType::Float64.family(), DataTypeFamily::Floating);
        assert_eq!(DataType::String.family(), DataTypeFamily::Text);
        assert_eq!(DataType::Digital.family(), DataTypeFamily::Digital);
        assert_eq!(DataType::Blob.family(), DataTypeFamily::Other);
    }

    #[test]
    fn unknown_tag_is_kept_verbatim() {
        let ty = DataType::parse("EnumerationValue");
        assert_eq!(ty, DataType::Other("EnumerationValue".into()));
        assert_eq!(ty.family(), DataTypeFamily::Other);
        assert_eq!(ty.to_string(), "EnumerationValue");
    }

    #[test]
    fn missing_tag_is_untyped() {
        let ty = DataType::untyped();
        assert_eq!(ty, DataType::Other(String::new()));
        assert_eq!(ty.family(), DataTypeFamily::Other);
        assert_eq!(ty.to_string(), "");
    }

    #[test]
    fn display_uses_canonical_tag() {
        assert_eq!(DataType::parse("float16").to_string(), "Float16");
    }
}
