//! # Owned Field Values
//!
//! `Value` is the fully-owned representation of a single field value. Query
//! results, predicate operands, command parameters, transaction log entries
//! and binary stream records all carry `Value`s.
//!
//! ## Design
//!
//! One variant per [`DataType`]; values are plain data with no identity
//! beyond their content. Decimals are carried as unscaled 128-bit digits plus
//! a scale byte; temporals use chrono with tick conversion helpers
//! (1 tick = 100 ns, tick zero at 0001-01-01T00:00:00 UTC). Sub-microsecond
//! tick digits are not representable and round toward zero.
//!
//! ## Conversion
//!
//! ```ignore
//! let v: Value = 42i64.into();
//! assert_eq!(v.to_i64()?, 42);
//! ```

use chrono::{DateTime, Duration, Utc};
use eyre::Result;

use super::data_type::{DataType, UNIX_EPOCH_TICKS};
use crate::error;

/// A single owned field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Char(char),
    Float32(f32),
    Float64(f64),
    /// Unscaled digits and decimal scale: the numeric value is
    /// `digits / 10^scale`.
    Decimal { digits: i128, scale: u8 },
    String(String),
    Binary(Vec<u8>),
    DateTime(DateTime<Utc>),
    TimeSpan(Duration),
    Guid([u8; 16]),
    /// The underlying integer of an enum value.
    Enum(i64),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the data type this value carries. `Null` reports `Unknown`.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Unknown,
            Value::Bool(_) => DataType::Bool,
            Value::Int8(_) => DataType::Int8,
            Value::UInt8(_) => DataType::UInt8,
            Value::Int16(_) => DataType::Int16,
            Value::UInt16(_) => DataType::UInt16,
            Value::Int32(_) => DataType::Int32,
            Value::UInt32(_) => DataType::UInt32,
            Value::Int64(_) => DataType::Int64,
            Value::UInt64(_) => DataType::UInt64,
            Value::Char(_) => DataType::Char,
            Value::Float32(_) => DataType::Float32,
            Value::Float64(_) => DataType::Float64,
            Value::Decimal { .. } => DataType::Decimal,
            Value::String(_) => DataType::String,
            Value::Binary(_) => DataType::Binary,
            Value::DateTime(_) => DataType::DateTime,
            Value::TimeSpan(_) => DataType::TimeSpan,
            Value::Guid(_) => DataType::Guid,
            Value::Enum(_) => DataType::Enum,
        }
    }

    /// Converts an integer-like value to i64. `Null` converts to 0 so that
    /// unset identifiers read as "needs assignment".
    pub fn to_i64(&self) -> Result<i64> {
        match self {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(*b as i64),
            Value::Int8(v) => Ok(*v as i64),
            Value::UInt8(v) => Ok(*v as i64),
            Value::Int16(v) => Ok(*v as i64),
            Value::UInt16(v) => Ok(*v as i64),
            Value::Int32(v) => Ok(*v as i64),
            Value::UInt32(v) => Ok(*v as i64),
            Value::Int64(v) => Ok(*v),
            Value::UInt64(v) => i64::try_from(*v)
                .map_err(|_| error::conversion("", format!("{v} does not fit into i64"))),
            Value::Enum(v) => Ok(*v),
            other => Err(error::conversion(
                "",
                format!("cannot read {:?} as integer", other.data_type()),
            )),
        }
    }

    /// Formats the value as a display string.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Int8(v) => v.to_string(),
            Value::UInt8(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::UInt16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::UInt32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::UInt64(v) => v.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Float32(f) => f.to_string(),
            Value::Float64(f) => f.to_string(),
            Value::Decimal { digits, scale } => format_decimal(*digits, *scale),
            Value::String(s) => s.clone(),
            Value::Binary(b) => b.iter().map(|b| format!("{b:02x}")).collect(),
            Value::DateTime(dt) => dt.to_rfc3339(),
            Value::TimeSpan(d) => format!("{}s", d.num_milliseconds() as f64 / 1000.0),
            Value::Guid(g) => format_guid(g),
            Value::Enum(v) => v.to_string(),
        }
    }
}

fn format_decimal(digits: i128, scale: u8) -> String {
    if scale == 0 {
        return digits.to_string();
    }
    let divisor = 10i128.pow(scale as u32);
    let int_part = digits / divisor;
    let frac_part = (digits % divisor).abs();
    format!("{}.{:0>width$}", int_part, frac_part, width = scale as usize)
}

fn format_guid(bytes: &[u8; 16]) -> String {
    let h: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &h[0..8],
        &h[8..12],
        &h[12..16],
        &h[16..20],
        &h[20..32]
    )
}

/// Converts a datetime to 100 ns ticks since 0001-01-01T00:00:00 UTC.
pub fn datetime_to_ticks(dt: &DateTime<Utc>) -> Result<i64> {
    dt.timestamp_micros()
        .checked_mul(10)
        .and_then(|t| t.checked_add(UNIX_EPOCH_TICKS))
        .ok_or_else(|| error::conversion("", "datetime out of tick range"))
}

/// Converts 100 ns ticks since 0001-01-01T00:00:00 UTC to a datetime.
pub fn datetime_from_ticks(ticks: i64) -> Result<DateTime<Utc>> {
    let micros = (ticks - UNIX_EPOCH_TICKS) / 10;
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| error::conversion("", format!("tick value {ticks} out of datetime range")))
}

/// Converts a timespan to signed 100 ns ticks.
pub fn timespan_to_ticks(span: &Duration) -> Result<i64> {
    span.num_microseconds()
        .and_then(|us| us.checked_mul(10))
        .ok_or_else(|| error::conversion("", "timespan out of tick range"))
}

/// Converts signed 100 ns ticks to a timespan.
pub fn timespan_from_ticks(ticks: i64) -> Duration {
    Duration::microseconds(ticks / 10)
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::TimeSpan(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn null_reads_as_zero_identifier() {
        assert_eq!(Value::Null.to_i64().unwrap(), 0);
    }

    #[test]
    fn integer_conversions() {
        assert_eq!(Value::Int16(-3).to_i64().unwrap(), -3);
        assert_eq!(Value::UInt32(7).to_i64().unwrap(), 7);
        assert!(Value::UInt64(u64::MAX).to_i64().is_err());
        assert!(Value::String("x".into()).to_i64().is_err());
    }

    #[test]
    fn decimal_display() {
        let v = Value::Decimal {
            digits: -123456,
            scale: 2,
        };
        assert_eq!(v.display_string(), "-1234.56");
        let v = Value::Decimal {
            digits: 5,
            scale: 3,
        };
        assert_eq!(v.display_string(), "0.005");
    }

    #[test]
    fn guid_display() {
        let v = Value::Guid([0x12; 16]);
        assert_eq!(
            v.display_string(),
            "12121212-1212-1212-1212-121212121212"
        );
    }

    #[test]
    fn epoch_tick_constant() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(datetime_to_ticks(&epoch).unwrap(), UNIX_EPOCH_TICKS);
    }

    #[test]
    fn datetime_ticks_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 45).unwrap()
            + Duration::milliseconds(125);
        let ticks = datetime_to_ticks(&dt).unwrap();
        assert_eq!(datetime_from_ticks(ticks).unwrap(), dt);
    }

    #[test]
    fn timespan_ticks_roundtrip() {
        let span = Duration::seconds(-90) + Duration::milliseconds(-250);
        let ticks = timespan_to_ticks(&span).unwrap();
        assert_eq!(timespan_from_ticks(ticks), span);
        assert_eq!(ticks, -902_500_000);
    }
}
