//! # Value Marshaling
//!
//! Translation between the local value representation and what a backend
//! actually stores, driven by each field's declared type, temporal sub-kind,
//! and the capability-derived [`MarshalOptions`].
//!
//! ## Rules
//!
//! | Declared type | Database representation |
//! |---------------|------------------------|
//! | Enum | 64-bit integer |
//! | DateTime/TimeSpan, `Native` | native temporal value |
//! | DateTime/TimeSpan, `BigIntTicks` | signed 100 ns ticks |
//! | DateTime/TimeSpan, `BigIntSeconds` / `BigIntMilliseconds` | whole seconds / milliseconds |
//! | DateTime/TimeSpan, `BigIntEpoch` | ticks minus the Unix epoch tick constant |
//! | DateTime/TimeSpan, `BigIntHumanReadable` | digit-pattern timestamp parsed as integer |
//! | DateTime/TimeSpan, `DecimalSeconds` | seconds as decimal, scale 7 |
//! | DateTime/TimeSpan, `DoubleSeconds` / `DoubleEpoch` | seconds as double |
//! | Float32/Float64 | ±∞ clamped to min/max on backends without IEEE specials |
//! | String/User | validated against 4-byte characters on narrow backends |
//!
//! Negative timespans under `BigIntHumanReadable` negate the formatted
//! magnitude, so `-90.25s` becomes `-000130250` rather than a wrapped
//! positive pattern.

use chrono::{DateTime, NaiveDateTime, Utc};
use eyre::Result;

use crate::types::value::{
    datetime_from_ticks, datetime_to_ticks, timespan_from_ticks, timespan_to_ticks,
};
use crate::types::{
    DataType, DateTimeType, FieldProperties, Value, TICKS_PER_MILLISECOND, TICKS_PER_SECOND,
    UNIX_EPOCH_TICKS,
};
use crate::error;

/// Digit pattern for the human-readable big-integer datetime representation.
pub const DEFAULT_DATE_TIME_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Capability- and configuration-derived marshaling switches.
#[derive(Debug, Clone)]
pub struct MarshalOptions {
    /// Clamp ±∞ to the finite min/max instead of storing IEEE specials.
    pub clamp_non_finite: bool,
    /// Reject characters needing more than 3 UTF-8 bytes.
    pub force_narrow_strings: bool,
    /// chrono pattern for `BigIntHumanReadable` datetimes.
    pub date_time_format: String,
}

impl Default for MarshalOptions {
    fn default() -> Self {
        Self {
            clamp_non_finite: false,
            force_narrow_strings: false,
            date_time_format: DEFAULT_DATE_TIME_FORMAT.to_string(),
        }
    }
}

/// Maps declared field metadata to what the database stores.
pub fn database_field_properties(field: &FieldProperties) -> FieldProperties {
    let database_type = match field.data_type() {
        DataType::Enum => DataType::Int64,
        DataType::DateTime | DataType::TimeSpan => match field.date_time_type() {
            DateTimeType::Native => field.data_type(),
            DateTimeType::BigIntTicks
            | DateTimeType::BigIntSeconds
            | DateTimeType::BigIntMilliseconds
            | DateTimeType::BigIntEpoch
            | DateTimeType::BigIntHumanReadable => DataType::Int64,
            DateTimeType::DecimalSeconds => DataType::Decimal,
            DateTimeType::DoubleSeconds | DateTimeType::DoubleEpoch => DataType::Float64,
        },
        other => other,
    };
    field.clone().with_type_at_database(database_type)
}

/// Marshals a local value into its database representation for `field`.
pub fn to_database(field: &FieldProperties, value: Value, options: &MarshalOptions) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match field.data_type() {
        DataType::Enum => Ok(Value::Int64(value.to_i64().map_err(rename(field))?)),
        DataType::DateTime => {
            let dt = match value {
                Value::DateTime(dt) => dt,
                other => return Err(type_error(field, &other)),
            };
            let ticks = datetime_to_ticks(&dt).map_err(rename(field))?;
            datetime_representation(field, ticks, || {
                dt.format(&options.date_time_format)
                    .to_string()
                    .parse::<i64>()
                    .map_err(|e| error::conversion(field.name(), e.to_string()))
            })
        }
        DataType::TimeSpan => {
            let span = match value {
                Value::TimeSpan(span) => span,
                other => return Err(type_error(field, &other)),
            };
            let ticks = timespan_to_ticks(&span).map_err(rename(field))?;
            datetime_representation(field, ticks, || Ok(human_readable_timespan(ticks)))
        }
        DataType::Float64 => {
            let f = match value {
                Value::Float64(f) => f,
                Value::Float32(f) => f as f64,
                other => return Err(type_error(field, &other)),
            };
            Ok(Value::Float64(clamp_f64(f, options)))
        }
        DataType::Float32 => {
            let f = match value {
                Value::Float32(f) => f,
                other => return Err(type_error(field, &other)),
            };
            Ok(Value::Float32(clamp_f32(f, options)))
        }
        DataType::String | DataType::User => {
            let s = match value {
                Value::String(s) => s,
                other => return Err(type_error(field, &other)),
            };
            if options.force_narrow_strings {
                if let Some(c) = s.chars().find(|c| c.len_utf8() > 3) {
                    return Err(error::conversion(
                        field.name(),
                        format!("character {c:?} needs 4 UTF-8 bytes, backend stores at most 3"),
                    ));
                }
            }
            Ok(Value::String(s))
        }
        DataType::Decimal => {
            let (digits, scale) = match value {
                Value::Decimal { digits, scale } => (digits, scale),
                other => return Err(type_error(field, &other)),
            };
            if let Some((precision, max_scale)) = field.decimal_precision_scale() {
                if scale > max_scale {
                    return Err(error::conversion(
                        field.name(),
                        format!("scale {scale} exceeds declared scale {max_scale}"),
                    ));
                }
                let limit = 10i128.pow(precision as u32);
                if digits.abs() >= limit {
                    return Err(error::conversion(
                        field.name(),
                        format!("value exceeds declared precision {precision}"),
                    ));
                }
            }
            Ok(Value::Decimal { digits, scale })
        }
        _ => Ok(value),
    }
}

/// Marshals a database value back into the local representation of `field`.
pub fn to_local(field: &FieldProperties, value: Value, options: &MarshalOptions) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match field.data_type() {
        DataType::Enum => Ok(Value::Enum(value.to_i64().map_err(rename(field))?)),
        DataType::DateTime => {
            if field.date_time_type() == DateTimeType::Native {
                return match value {
                    Value::DateTime(dt) => Ok(Value::DateTime(dt)),
                    other => Err(type_error(field, &other)),
                };
            }
            let ticks = representation_to_ticks(field, value, |formatted| {
                let text = format!("{:017}", formatted);
                NaiveDateTime::parse_from_str(&text, &options.date_time_format)
                    .map(|naive| datetime_to_ticks(&naive.and_utc()))
                    .map_err(|e| error::conversion(field.name(), e.to_string()))?
            })?;
            Ok(Value::DateTime(
                datetime_from_ticks(ticks).map_err(rename(field))?,
            ))
        }
        DataType::TimeSpan => {
            if field.date_time_type() == DateTimeType::Native {
                return match value {
                    Value::TimeSpan(span) => Ok(Value::TimeSpan(span)),
                    other => Err(type_error(field, &other)),
                };
            }
            let ticks =
                representation_to_ticks(field, value, |n| Ok(human_readable_timespan_ticks(n)))?;
            Ok(Value::TimeSpan(timespan_from_ticks(ticks)))
        }
        dt if dt.is_integer() => coerce_integer(field, value),
        DataType::Float32 => match value {
            Value::Float32(f) => Ok(Value::Float32(f)),
            Value::Float64(f) => Ok(Value::Float32(f as f32)),
            other => Err(type_error(field, &other)),
        },
        DataType::Float64 => match value {
            Value::Float64(f) => Ok(Value::Float64(f)),
            Value::Float32(f) => Ok(Value::Float64(f as f64)),
            other => Err(type_error(field, &other)),
        },
        DataType::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Ok(Value::Bool(other.to_i64().map_err(rename(field))? != 0)),
        },
        _ => Ok(value),
    }
}

/// Encodes ticks into the representation selected by the field's temporal
/// sub-kind. `human` supplies the formatted digit integer for
/// `BigIntHumanReadable`.
fn datetime_representation(
    field: &FieldProperties,
    ticks: i64,
    human: impl FnOnce() -> Result<i64>,
) -> Result<Value> {
    match field.date_time_type() {
        DateTimeType::Native => match field.data_type() {
            DataType::TimeSpan => Ok(Value::TimeSpan(timespan_from_ticks(ticks))),
            _ => Ok(Value::DateTime(datetime_from_ticks(ticks).map_err(rename(field))?)),
        },
        DateTimeType::BigIntTicks => Ok(Value::Int64(ticks)),
        DateTimeType::BigIntSeconds => Ok(Value::Int64(ticks / TICKS_PER_SECOND)),
        DateTimeType::BigIntMilliseconds => Ok(Value::Int64(ticks / TICKS_PER_MILLISECOND)),
        DateTimeType::BigIntEpoch => ticks
            .checked_sub(UNIX_EPOCH_TICKS)
            .map(Value::Int64)
            .ok_or_else(|| error::conversion(field.name(), "epoch offset out of range")),
        DateTimeType::BigIntHumanReadable => Ok(Value::Int64(human()?)),
        DateTimeType::DecimalSeconds => Ok(Value::Decimal {
            digits: ticks as i128,
            scale: 7,
        }),
        DateTimeType::DoubleSeconds => Ok(Value::Float64(ticks as f64 / TICKS_PER_SECOND as f64)),
        DateTimeType::DoubleEpoch => Ok(Value::Float64(
            (ticks - UNIX_EPOCH_TICKS) as f64 / TICKS_PER_SECOND as f64,
        )),
    }
}

/// Decodes a database representation back to ticks. `human` parses the
/// formatted digit integer of `BigIntHumanReadable`.
fn representation_to_ticks(
    field: &FieldProperties,
    value: Value,
    human: impl FnOnce(i64) -> Result<i64>,
) -> Result<i64> {
    let date_time_type = field.date_time_type();
    match date_time_type {
        DateTimeType::Native => Err(error::conversion(
            field.name(),
            "native temporal value has no integer representation",
        )),
        DateTimeType::BigIntTicks
        | DateTimeType::BigIntSeconds
        | DateTimeType::BigIntMilliseconds
        | DateTimeType::BigIntEpoch
        | DateTimeType::BigIntHumanReadable => {
            let n = value.to_i64().map_err(rename(field))?;
            match date_time_type {
                DateTimeType::BigIntTicks => Ok(n),
                DateTimeType::BigIntSeconds => n
                    .checked_mul(TICKS_PER_SECOND)
                    .ok_or_else(|| error::conversion(field.name(), "second count out of range")),
                DateTimeType::BigIntMilliseconds => n
                    .checked_mul(TICKS_PER_MILLISECOND)
                    .ok_or_else(|| error::conversion(field.name(), "millisecond count out of range")),
                DateTimeType::BigIntEpoch => n
                    .checked_add(UNIX_EPOCH_TICKS)
                    .ok_or_else(|| error::conversion(field.name(), "epoch offset out of range")),
                DateTimeType::BigIntHumanReadable => human(n),
                _ => unreachable!(),
            }
        }
        DateTimeType::DecimalSeconds => match value {
            Value::Decimal { digits, scale } => {
                let ticks = if scale <= 7 {
                    digits.checked_mul(10i128.pow((7 - scale) as u32))
                } else {
                    Some(digits / 10i128.pow((scale - 7) as u32))
                };
                ticks
                    .and_then(|t| i64::try_from(t).ok())
                    .ok_or_else(|| error::conversion(field.name(), "decimal seconds out of range"))
            }
            other => Err(type_error(field, &other)),
        },
        DateTimeType::DoubleSeconds => match value {
            Value::Float64(f) => Ok((f * TICKS_PER_SECOND as f64).round() as i64),
            other => Err(type_error(field, &other)),
        },
        DateTimeType::DoubleEpoch => match value {
            Value::Float64(f) => Ok((f * TICKS_PER_SECOND as f64).round() as i64 + UNIX_EPOCH_TICKS),
            other => Err(type_error(field, &other)),
        },
    }
}

/// Formats timespan ticks as the `±hhmmssfff` digit magnitude (hours may
/// exceed two digits).
fn human_readable_timespan(ticks: i64) -> i64 {
    let negative = ticks < 0;
    let abs = ticks.unsigned_abs() as i64;
    let millis = (abs / TICKS_PER_MILLISECOND) % 1000;
    let seconds = (abs / TICKS_PER_SECOND) % 60;
    let minutes = (abs / (60 * TICKS_PER_SECOND)) % 60;
    let hours = abs / (3600 * TICKS_PER_SECOND);
    let magnitude = ((hours * 100 + minutes) * 100 + seconds) * 1000 + millis;
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

fn human_readable_timespan_ticks(formatted: i64) -> i64 {
    let negative = formatted < 0;
    let abs = formatted.unsigned_abs() as i64;
    let millis = abs % 1000;
    let seconds = (abs / 1000) % 100;
    let minutes = (abs / 100_000) % 100;
    let hours = abs / 10_000_000;
    let ticks = ((hours * 3600 + minutes * 60 + seconds) * TICKS_PER_SECOND)
        + millis * TICKS_PER_MILLISECOND;
    if negative {
        -ticks
    } else {
        ticks
    }
}

fn clamp_f64(f: f64, options: &MarshalOptions) -> f64 {
    if options.clamp_non_finite && f.is_infinite() {
        if f.is_sign_positive() {
            f64::MAX
        } else {
            f64::MIN
        }
    } else {
        f
    }
}

fn clamp_f32(f: f32, options: &MarshalOptions) -> f32 {
    if options.clamp_non_finite && f.is_infinite() {
        if f.is_sign_positive() {
            f32::MAX
        } else {
            f32::MIN
        }
    } else {
        f
    }
}

/// Narrows an integer database value to the declared local width, failing on
/// range overflow.
fn coerce_integer(field: &FieldProperties, value: Value) -> Result<Value> {
    if field.data_type() == DataType::UInt64 {
        return match value {
            Value::UInt64(v) => Ok(Value::UInt64(v)),
            other => {
                let n = other.to_i64().map_err(rename(field))?;
                u64::try_from(n).map(Value::UInt64).map_err(|_| {
                    error::conversion(field.name(), format!("{n} out of range for UInt64"))
                })
            }
        };
    }
    let n = value.to_i64().map_err(rename(field))?;
    let out_of_range = || error::conversion(
        field.name(),
        format!("{n} out of range for {:?}", field.data_type()),
    );
    match field.data_type() {
        DataType::Int8 => i8::try_from(n).map(Value::Int8).map_err(|_| out_of_range()),
        DataType::UInt8 => u8::try_from(n).map(Value::UInt8).map_err(|_| out_of_range()),
        DataType::Int16 => i16::try_from(n).map(Value::Int16).map_err(|_| out_of_range()),
        DataType::UInt16 => u16::try_from(n).map(Value::UInt16).map_err(|_| out_of_range()),
        DataType::Int32 => i32::try_from(n).map(Value::Int32).map_err(|_| out_of_range()),
        DataType::UInt32 => u32::try_from(n).map(Value::UInt32).map_err(|_| out_of_range()),
        DataType::Int64 => Ok(Value::Int64(n)),
        other => Err(error::conversion(
            field.name(),
            format!("{other:?} is not an integer type"),
        )),
    }
}

fn type_error(field: &FieldProperties, value: &Value) -> eyre::Report {
    error::conversion(
        field.name(),
        format!(
            "got {:?} where {:?} was declared",
            value.data_type(),
            field.data_type()
        ),
    )
}

/// Re-attributes a conversion error to the field being marshaled.
fn rename(field: &FieldProperties) -> impl FnOnce(eyre::Report) -> eyre::Report + '_ {
    move |e| e.wrap_err(format!("field `{}`", field.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DateTimeKind, FieldFlags};
    use chrono::{Duration, TimeZone};

    fn temporal_field(data_type: DataType, dt_type: DateTimeType) -> FieldProperties {
        FieldProperties::new(0, "when", data_type)
            .with_date_time(DateTimeKind::Utc, dt_type)
    }

    fn sample_datetime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 45).unwrap() + Duration::milliseconds(125)
    }

    #[test]
    fn enum_marshals_to_int64() {
        let field = FieldProperties::new(0, "state", DataType::Enum).with_value_type("State");
        let opts = MarshalOptions::default();
        let db = to_database(&field, Value::Enum(3), &opts).unwrap();
        assert_eq!(db, Value::Int64(3));
        let local = to_local(&field, Value::Int64(3), &opts).unwrap();
        assert_eq!(local, Value::Enum(3));
    }

    #[test]
    fn ticks_representation_roundtrip() {
        let opts = MarshalOptions::default();
        for dt_type in [
            DateTimeType::BigIntTicks,
            DateTimeType::BigIntEpoch,
            DateTimeType::BigIntMilliseconds,
            DateTimeType::DecimalSeconds,
            DateTimeType::DoubleEpoch,
        ] {
            let field = temporal_field(DataType::DateTime, dt_type);
            let dt = sample_datetime();
            let db = to_database(&field, Value::DateTime(dt), &opts).unwrap();
            let back = to_local(&field, db, &opts).unwrap();
            assert_eq!(back, Value::DateTime(dt), "{dt_type:?}");
        }
    }

    #[test]
    fn seconds_representation_truncates() {
        let opts = MarshalOptions::default();
        let field = temporal_field(DataType::DateTime, DateTimeType::BigIntSeconds);
        let dt = sample_datetime();
        let db = to_database(&field, Value::DateTime(dt), &opts).unwrap();
        let back = to_local(&field, db, &opts).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 45).unwrap();
        assert_eq!(back, Value::DateTime(expected));
    }

    #[test]
    fn human_readable_datetime() {
        let opts = MarshalOptions::default();
        let field = temporal_field(DataType::DateTime, DateTimeType::BigIntHumanReadable);
        let dt = sample_datetime();
        let db = to_database(&field, Value::DateTime(dt), &opts).unwrap();
        assert_eq!(db, Value::Int64(20240615123045125));
        let back = to_local(&field, db, &opts).unwrap();
        assert_eq!(back, Value::DateTime(dt));
    }

    #[test]
    fn human_readable_negative_timespan() {
        let opts = MarshalOptions::default();
        let field = temporal_field(DataType::TimeSpan, DateTimeType::BigIntHumanReadable);
        let span = Duration::seconds(-90) + Duration::milliseconds(-250);
        let db = to_database(&field, Value::TimeSpan(span), &opts).unwrap();
        assert_eq!(db, Value::Int64(-130250));
        let back = to_local(&field, db, &opts).unwrap();
        assert_eq!(back, Value::TimeSpan(span));
    }

    #[test]
    fn infinity_clamped_without_ieee_support() {
        let field = FieldProperties::new(0, "ratio", DataType::Float64);
        let clamping = MarshalOptions {
            clamp_non_finite: true,
            ..Default::default()
        };
        assert_eq!(
            to_database(&field, Value::Float64(f64::INFINITY), &clamping).unwrap(),
            Value::Float64(f64::MAX)
        );
        assert_eq!(
            to_database(&field, Value::Float64(f64::NEG_INFINITY), &clamping).unwrap(),
            Value::Float64(f64::MIN)
        );
        let passthrough = MarshalOptions::default();
        assert_eq!(
            to_database(&field, Value::Float64(f64::INFINITY), &passthrough).unwrap(),
            Value::Float64(f64::INFINITY)
        );
    }

    #[test]
    fn narrow_strings_reject_four_byte_characters() {
        let field = FieldProperties::new(0, "name", DataType::String);
        let narrow = MarshalOptions {
            force_narrow_strings: true,
            ..Default::default()
        };
        assert!(to_database(&field, Value::String("ok: ümlaut".into()), &narrow).is_ok());
        assert!(to_database(&field, Value::String("emoji: 🦀".into()), &narrow).is_err());
    }

    #[test]
    fn decimal_precision_enforced() {
        let field = FieldProperties::new(0, "price", DataType::Decimal).with_maximum_length(5.02);
        let opts = MarshalOptions::default();
        to_database(
            &field,
            Value::Decimal {
                digits: 99999,
                scale: 2,
            },
            &opts,
        )
        .unwrap();
        assert!(to_database(
            &field,
            Value::Decimal {
                digits: 100000,
                scale: 2,
            },
            &opts,
        )
        .is_err());
        assert!(to_database(
            &field,
            Value::Decimal {
                digits: 1,
                scale: 3,
            },
            &opts,
        )
        .is_err());
    }

    #[test]
    fn integers_narrow_with_range_check() {
        let opts = MarshalOptions::default();
        let field = FieldProperties::new(0, "n", DataType::Int16).with_flags(FieldFlags::NONE);
        assert_eq!(
            to_local(&field, Value::Int64(-300), &opts).unwrap(),
            Value::Int16(-300)
        );
        assert!(to_local(&field, Value::Int64(70000), &opts).is_err());
    }

    #[test]
    fn null_passes_through() {
        let opts = MarshalOptions::default();
        let field = temporal_field(DataType::DateTime, DateTimeType::BigIntTicks);
        assert_eq!(to_database(&field, Value::Null, &opts).unwrap(), Value::Null);
        assert_eq!(to_local(&field, Value::Null, &opts).unwrap(), Value::Null);
    }
}
