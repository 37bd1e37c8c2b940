//! Query-related data models.
//!
//! This module defines bound parameter values and the row/batch shapes the
//! paginator produces.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default number of rows per batch when the caller does not choose one.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// One result row: column values in select-list order.
pub type Row = Vec<JsonValue>;

/// One page of results, in the order the query produced them.
pub type Batch = Vec<Row>;

/// Named parameters for a query, keyed by placeholder name (without the colon).
pub type QueryParams = BTreeMap<String, QueryParam>;

/// A parameter value for parameterized queries.
///
/// JSON strings always deserialize as [`QueryParam::String`]; the temporal and
/// uuid variants are built from typed values or by [`QueryParam::infer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// Bound as `date`
    Date(NaiveDate),
    /// Bound as `time`
    Time(NaiveTime),
    /// Bound as `timestamp`
    Timestamp(NaiveDateTime),
    /// Bound as `timestamptz`
    TimestampTz(DateTime<FixedOffset>),
    Uuid(Uuid),
    /// Arbitrary JSON, bound as `jsonb`
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Timestamp(_) => "timestamp",
            Self::TimestampTz(_) => "timestamptz",
            Self::Uuid(_) => "uuid",
            Self::Json(_) => "json",
        }
    }

    /// Infer a parameter from command-line text.
    ///
    /// `null`, booleans, integers, floats, hyphenated UUIDs and ISO 8601
    /// dates, times and timestamps are recognised; anything else is a string.
    pub fn infer(text: &str) -> Self {
        if text.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        if text.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(v) = text.parse::<i64>() {
            return Self::Int(v);
        }
        if let Ok(v) = text.parse::<f64>() {
            if v.is_finite() {
                return Self::Float(v);
            }
        }
        if text.len() == 36 {
            if let Ok(v) = Uuid::parse_str(text) {
                return Self::Uuid(v);
            }
        }
        Self::infer_temporal(text).unwrap_or_else(|| Self::String(text.to_string()))
    }

    fn infer_temporal(text: &str) -> Option<Self> {
        if let Ok(v) = DateTime::parse_from_rfc3339(text) {
            return Some(Self::TimestampTz(v));
        }
        if let Ok(v) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
            return Some(Self::TimestampTz(v));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(v) = NaiveDateTime::parse_from_str(text, format) {
                return Some(Self::Timestamp(v));
            }
        }
        if let Ok(v) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(Self::Date(v));
        }
        for format in ["%H:%M:%S%.f", "%H:%M"] {
            if let Ok(v) = NaiveTime::parse_from_str(text, format) {
                return Some(Self::Time(v));
            }
        }
        None
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<NaiveDate> for QueryParam {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveTime> for QueryParam {
    fn from(v: NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<NaiveDateTime> for QueryParam {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl From<DateTime<FixedOffset>> for QueryParam {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Self::TimestampTz(v)
    }
}

impl From<DateTime<Utc>> for QueryParam {
    fn from(v: DateTime<Utc>) -> Self {
        Self::TimestampTz(v.fixed_offset())
    }
}

impl From<Uuid> for QueryParam {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
