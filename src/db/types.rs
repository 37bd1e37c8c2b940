//! PostgreSQL type mappings.
//!
//! Rows come back from the driver as `PgRow`; pagination hands them to the
//! caller as [`Row`]s of JSON values in select-list order.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies the column's type name
//! 2. A decoder per category extracts the value
//!
//! One-dimensional arrays of any supported element type decode to JSON arrays
//! and enum labels decode to strings. A column whose type has no mapping fails
//! the row with a decode error naming the column and its type; SQL `NULL` is
//! the only value that becomes JSON `null`.

use crate::models::Row;
use serde_json::Value as JsonValue;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgHasArrayType, PgRow, PgTypeInfo, PgTypeKind, PgValueFormat, PgValueRef};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo, ValueRef};

/// Logical category for PostgreSQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,
    Network,
    Unknown,
}

/// Classify a PostgreSQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.to_lowercase().as_str() {
        "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "smallserial"
        | "serial" | "bigserial" | "oid" => TypeCategory::Integer,
        "float4" | "float8" | "real" | "double precision" => TypeCategory::Float,
        "numeric" | "decimal" => TypeCategory::Decimal,
        "bool" | "boolean" => TypeCategory::Boolean,
        "text" | "varchar" | "character varying" | "bpchar" | "char" | "character" | "name"
        | "citext" => TypeCategory::Text,
        "bytea" => TypeCategory::Binary,
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        "timestamp" => TypeCategory::Timestamp,
        "timestamptz" => TypeCategory::TimestampTz,
        "interval" => TypeCategory::Interval,
        "inet" | "cidr" => TypeCategory::Network,
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Raw NUMERIC value rendered as a decimal string.
///
/// Preserves the exact database representation without pulling in a decimal
/// arithmetic crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        categorize_type(ty.name()) == TypeCategory::Decimal
    }
}

impl PgHasArrayType for RawDecimal {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_NUMERIC")
    }

    fn array_compatible(ty: &PgTypeInfo) -> bool {
        matches!(ty.kind(), PgTypeKind::Array(element) if Self::compatible(element))
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawDecimal(value.as_str()?.to_string())),
            PgValueFormat::Binary => numeric_to_string(value.as_bytes()?).map(RawDecimal),
        }
    }
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render the binary NUMERIC wire format (base-10000 digits) as text.
pub(crate) fn numeric_to_string(bytes: &[u8]) -> Result<String, sqlx::error::BoxDynError> {
    let word = |i: usize| -> Result<[u8; 2], sqlx::error::BoxDynError> {
        bytes
            .get(i * 2..i * 2 + 2)
            .map(|b| [b[0], b[1]])
            .ok_or_else(|| "truncated NUMERIC value".into())
    };

    let ndigits = i16::from_be_bytes(word(0)?).max(0) as usize;
    let weight = i16::from_be_bytes(word(1)?) as i32;
    let sign = u16::from_be_bytes(word(2)?);
    let dscale = u16::from_be_bytes(word(3)?) as usize;
    let digits = (0..ndigits)
        .map(|i| word(4 + i).map(i16::from_be_bytes))
        .collect::<Result<Vec<_>, _>>()?;

    let negative = match sign {
        NUMERIC_POS => false,
        NUMERIC_NEG => true,
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        other => return Err(format!("invalid NUMERIC sign 0x{other:04x}").into()),
    };
    let digit = |idx: i32| -> i16 {
        usize::try_from(idx)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for idx in 0..=weight {
            if idx == 0 {
                out.push_str(&digit(idx).to_string());
            } else {
                out.push_str(&format!("{:04}", digit(idx)));
            }
        }
    }

    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut idx = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", digit(idx)));
            idx += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Ok(out)
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Encode binary data as a base64 JSON string.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

// =============================================================================
// Interval and Network Rendering
// =============================================================================

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

/// Render an interval in ISO 8601 duration form, e.g. `P1Y2M3DT4H5M6.5S`.
///
/// Each component keeps its own sign, matching the server's
/// `IntervalStyle = iso_8601` output.
pub fn interval_to_iso(interval: &PgInterval) -> String {
    let years = interval.months / 12;
    let months = interval.months % 12;
    let hours = interval.microseconds / MICROS_PER_HOUR;
    let minutes = interval.microseconds % MICROS_PER_HOUR / MICROS_PER_MINUTE;
    let micros = interval.microseconds % MICROS_PER_MINUTE;

    let mut out = String::from("P");
    for (value, unit) in [(years, 'Y'), (months, 'M'), (interval.days, 'D')] {
        if value != 0 {
            out.push_str(&format!("{value}{unit}"));
        }
    }
    if interval.microseconds != 0 {
        out.push('T');
        for (value, unit) in [(hours, 'H'), (minutes, 'M')] {
            if value != 0 {
                out.push_str(&format!("{value}{unit}"));
            }
        }
        if micros != 0 {
            let sign = if micros < 0 { "-" } else { "" };
            let abs = micros.unsigned_abs();
            let whole = abs / MICROS_PER_SECOND as u64;
            let frac = abs % MICROS_PER_SECOND as u64;
            out.push_str(&format!("{sign}{whole}"));
            if frac != 0 {
                let digits = format!("{frac:06}");
                out.push('.');
                out.push_str(digits.trim_end_matches('0'));
            }
            out.push('S');
        }
    }
    if out.len() == 1 {
        out.push_str("T0S");
    }
    out
}

/// Render an `inet` or `cidr` value the way the server prints it.
///
/// `inet` hides a full-length prefix (`10.0.0.1`); `cidr` always shows it.
pub fn format_network(net: &IpNetwork, cidr: bool) -> String {
    let full = match net {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    if !cidr && net.prefix() == full {
        net.ip().to_string()
    } else {
        net.to_string()
    }
}

fn float_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

// =============================================================================
// Row Conversion
// =============================================================================

/// Convert a driver row into column values in select-list order.
///
/// Fails with [`sqlx::Error::ColumnDecode`] on the first column whose value
/// cannot be represented.
pub fn row_values(row: &PgRow) -> Result<Row, sqlx::Error> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            if row.try_get_raw(idx)?.is_null() {
                return Ok(JsonValue::Null);
            }
            decode_column(row, idx, col.type_info())
        })
        .collect()
}

/// Decode one column as `$ty`, or as a one-dimensional array of `$ty` when
/// `$array` is set, mapping each present value through `$to_json`.
macro_rules! decode {
    ($row:expr, $idx:expr, $array:expr, $ty:ty, $to_json:expr) => {
        if $array {
            decode_array::<$ty>($row, $idx, $to_json)
        } else {
            $row.try_get::<$ty, _>($idx).map($to_json)
        }
    };
}

fn decode_column(row: &PgRow, idx: usize, type_info: &PgTypeInfo) -> Result<JsonValue, sqlx::Error> {
    let (element, array) = match type_info.kind() {
        PgTypeKind::Array(element) => (element, true),
        _ => (type_info, false),
    };

    if matches!(element.kind(), PgTypeKind::Enum(_)) {
        if array {
            return Err(unsupported(row, idx, type_info));
        }
        let label = row
            .try_get_raw(idx)?
            .as_str()
            .map_err(|e| column_error(row, idx, e))?;
        return Ok(JsonValue::String(label.to_string()));
    }

    let name = element.name().to_ascii_lowercase();
    match categorize_type(&name) {
        TypeCategory::Integer => match name.as_str() {
            "int2" | "smallint" => decode!(row, idx, array, i16, JsonValue::from),
            "int4" | "integer" => decode!(row, idx, array, i32, JsonValue::from),
            "oid" => decode!(row, idx, array, Oid, |v: Oid| JsonValue::from(v.0)),
            _ => decode!(row, idx, array, i64, JsonValue::from),
        },
        TypeCategory::Float => match name.as_str() {
            "float4" | "real" => decode!(row, idx, array, f32, |v: f32| float_json(f64::from(v))),
            _ => decode!(row, idx, array, f64, float_json),
        },
        TypeCategory::Decimal => {
            decode!(row, idx, array, RawDecimal, |v: RawDecimal| JsonValue::String(v.0))
        }
        TypeCategory::Boolean => decode!(row, idx, array, bool, JsonValue::Bool),
        TypeCategory::Text => decode!(row, idx, array, String, JsonValue::String),
        TypeCategory::Binary => {
            decode!(row, idx, array, Vec<u8>, |v: Vec<u8>| decode_binary_value(&v))
        }
        TypeCategory::Json => decode!(row, idx, array, JsonValue, |v: JsonValue| v),
        TypeCategory::Uuid => decode!(row, idx, array, sqlx::types::Uuid, |v: sqlx::types::Uuid| {
            JsonValue::String(v.to_string())
        }),
        TypeCategory::Date => decode!(row, idx, array, chrono::NaiveDate, |v: chrono::NaiveDate| {
            JsonValue::String(v.format("%Y-%m-%d").to_string())
        }),
        TypeCategory::Time => decode!(row, idx, array, chrono::NaiveTime, |v: chrono::NaiveTime| {
            JsonValue::String(v.format("%H:%M:%S%.f").to_string())
        }),
        TypeCategory::Timestamp => {
            decode!(row, idx, array, chrono::NaiveDateTime, |v: chrono::NaiveDateTime| {
                JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            })
        }
        TypeCategory::TimestampTz => decode!(
            row,
            idx,
            array,
            chrono::DateTime<chrono::Utc>,
            |v: chrono::DateTime<chrono::Utc>| JsonValue::String(v.to_rfc3339())
        ),
        TypeCategory::Interval => decode!(row, idx, array, PgInterval, |v: PgInterval| {
            JsonValue::String(interval_to_iso(&v))
        }),
        TypeCategory::Network => {
            let cidr = name == "cidr";
            decode!(row, idx, array, IpNetwork, |v: IpNetwork| {
                JsonValue::String(format_network(&v, cidr))
            })
        }
        TypeCategory::Unknown => Err(unsupported(row, idx, type_info)),
    }
}

fn decode_array<'r, T>(
    row: &'r PgRow,
    idx: usize,
    to_json: impl Fn(T) -> JsonValue,
) -> Result<JsonValue, sqlx::Error>
where
    T: for<'a> Decode<'a, sqlx::Postgres> + Type<sqlx::Postgres> + PgHasArrayType,
{
    let values: Vec<Option<T>> = row.try_get(idx)?;
    Ok(JsonValue::Array(
        values
            .into_iter()
            .map(|v| v.map(&to_json).unwrap_or(JsonValue::Null))
            .collect(),
    ))
}

fn column_error(row: &PgRow, idx: usize, source: impl Into<BoxDynError>) -> sqlx::Error {
    let column = row.columns().get(idx).map_or("?", |c| c.name());
    sqlx::Error::ColumnDecode {
        index: format!("{column:?}"),
        source: source.into(),
    }
}

fn unsupported(row: &PgRow, idx: usize, type_info: &PgTypeInfo) -> sqlx::Error {
    column_error(
        row,
        idx,
        format!("unsupported PostgreSQL type {}", type_info.name()),
    )
}
