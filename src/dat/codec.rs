//! # Per-Field Encodings
//!
//! The encoding of one field value is a total function of the declared
//! [`DataType`], the stream version, and the field's nullability —
//! [`codec_for`] is a lookup table, never branch fallthrough:
//!
//! | Version | Non-nullable numerics | Nullable numerics |
//! |---------|-----------------------|-------------------|
//! | 1 | fixed native width, little-endian | unsupported, null is a data error |
//! | 2-4 | 7-bit var-int (signed via zigzag, floats via bit pattern) | unsupported |
//! | 5 | the 2-4 rule | marker byte 0=null / 1=value, then the 2-4 encoding |
//!
//! "Numerics" covers integers, floats, decimal, char, enum, and the tick
//! representation of datetime/timespan. Strings, binary, guids, and
//! user-typed values are length-prefixed in every version with a
//! zigzag-signed length where -1 means null; booleans are one byte
//! (0, 1, or 0xFF for null). Null sentinels in a non-nullable field are
//! data errors regardless of version.

use std::io::{Read, Write};

use eyre::Result;

use crate::encoding::varint::{
    read_7bit_i64, read_7bit_u64, read_7bit_u128, unzigzag, unzigzag128, write_7bit_i64,
    write_7bit_u64, write_7bit_u128, zigzag, zigzag128,
};
use crate::error;
use crate::types::value::{
    datetime_from_ticks, datetime_to_ticks, timespan_from_ticks, timespan_to_ticks,
};
use crate::types::{DataType, FieldProperties, Value};

use super::{MAX_VERSION, MIN_VERSION};

/// Encoding strategy for one field at one stream version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCodec {
    /// Fixed native width, little-endian (version 1 numerics).
    FixedWidth,
    /// 7-bit var-int (versions 2-4, and 5 when non-nullable).
    SevenBit,
    /// Null-marker byte then the 7-bit encoding (version 5 nullable).
    PrefixedSevenBit,
    /// Zigzag length prefix, -1 meaning null (strings, binary, guid, user).
    LengthPrefixed,
    /// Single byte: 0, 1, or 0xFF for null (booleans).
    Byte,
}

/// Resolves the encoding for `(data_type, version, nullable)`.
pub fn codec_for(data_type: DataType, version: u8, nullable: bool) -> Result<FieldCodec> {
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(error::corruption(format!(
            "unsupported stream version {version}"
        )));
    }
    match data_type {
        DataType::Bool => Ok(FieldCodec::Byte),
        DataType::String | DataType::Binary | DataType::Guid | DataType::User => {
            Ok(FieldCodec::LengthPrefixed)
        }
        DataType::Int8
        | DataType::UInt8
        | DataType::Int16
        | DataType::UInt16
        | DataType::Int32
        | DataType::UInt32
        | DataType::Int64
        | DataType::UInt64
        | DataType::Char
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal
        | DataType::DateTime
        | DataType::TimeSpan
        | DataType::Enum => Ok(match version {
            1 => FieldCodec::FixedWidth,
            2..=4 => FieldCodec::SevenBit,
            _ => {
                if nullable {
                    FieldCodec::PrefixedSevenBit
                } else {
                    FieldCodec::SevenBit
                }
            }
        }),
        DataType::Unknown => Err(error::unsupported(
            "fields of unknown type cannot be encoded",
        )),
    }
}

fn null_error(field: &FieldProperties) -> eyre::Report {
    error::corruption(format!(
        "null value in non-nullable field `{}`",
        field.name()
    ))
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

/// Encodes one field value with `codec`.
pub fn encode_field<W: Write>(
    out: &mut W,
    field: &FieldProperties,
    value: &Value,
    codec: FieldCodec,
) -> Result<()> {
    match codec {
        FieldCodec::Byte => {
            let byte = match value {
                Value::Null if field.is_nullable() => 0xFF,
                Value::Null => return Err(null_error(field)),
                Value::Bool(true) => 1,
                Value::Bool(false) => 0,
                other => return Err(type_error(field, other)),
            };
            out.write_all(&[byte])?;
            Ok(())
        }
        FieldCodec::LengthPrefixed => {
            let bytes: &[u8] = match value {
                Value::Null => {
                    if !field.is_nullable() {
                        return Err(null_error(field));
                    }
                    write_7bit_u64(out, zigzag(-1))?;
                    return Ok(());
                }
                Value::String(s) => s.as_bytes(),
                Value::Binary(b) => b.as_slice(),
                Value::Guid(g) => g.as_slice(),
                other => return Err(type_error(field, other)),
            };
            write_7bit_u64(out, zigzag(bytes.len() as i64))?;
            out.write_all(bytes)?;
            Ok(())
        }
        FieldCodec::FixedWidth => {
            if value.is_null() {
                return Err(null_error(field));
            }
            encode_fixed(out, field, value)
        }
        FieldCodec::SevenBit => {
            if value.is_null() {
                return Err(null_error(field));
            }
            encode_seven_bit(out, field, value)
        }
        FieldCodec::PrefixedSevenBit => {
            if value.is_null() {
                out.write_all(&[0])?;
                return Ok(());
            }
            out.write_all(&[1])?;
            encode_seven_bit(out, field, value)
        }
    }
}

/// Decodes one field value with `codec`.
pub fn decode_field<R: Read>(
    input: &mut R,
    field: &FieldProperties,
    codec: FieldCodec,
) -> Result<Value> {
    match codec {
        FieldCodec::Byte => match read_byte(input)? {
            0 => Ok(Value::Bool(false)),
            1 => Ok(Value::Bool(true)),
            0xFF if field.is_nullable() => Ok(Value::Null),
            0xFF => Err(null_error(field)),
            b => Err(error::corruption(format!(
                "invalid boolean byte {b:#x} in field `{}`",
                field.name()
            ))),
        },
        FieldCodec::LengthPrefixed => {
            let len = unzigzag(read_7bit_u64(input)?);
            if len < 0 {
                if len != -1 {
                    return Err(error::corruption(format!(
                        "invalid length {len} in field `{}`",
                        field.name()
                    )));
                }
                if !field.is_nullable() {
                    return Err(null_error(field));
                }
                return Ok(Value::Null);
            }
            let bytes = read_bytes(input, len as usize)?;
            match field.data_type() {
                DataType::String | DataType::User => String::from_utf8(bytes)
                    .map(Value::String)
                    .map_err(|_| {
                        error::corruption(format!(
                            "field `{}` carries invalid UTF-8",
                            field.name()
                        ))
                    }),
                DataType::Binary => Ok(Value::Binary(bytes)),
                DataType::Guid => {
                    let guid: [u8; 16] = bytes.as_slice().try_into().map_err(|_| {
                        error::corruption(format!(
                            "guid field `{}` carries {} byte(s)",
                            field.name(),
                            bytes.len()
                        ))
                    })?;
                    Ok(Value::Guid(guid))
                }
                other => Err(error::corruption(format!(
                    "length-prefixed payload for {other:?} field `{}`",
                    field.name()
                ))),
            }
        }
        FieldCodec::FixedWidth => decode_fixed(input, field),
        FieldCodec::SevenBit => decode_seven_bit(input, field),
        FieldCodec::PrefixedSevenBit => match read_byte(input)? {
            0 => Ok(Value::Null),
            1 => decode_seven_bit(input, field),
            b => Err(error::corruption(format!(
                "invalid null marker {b:#x} in field `{}`",
                field.name()
            ))),
        },
    }
}

fn encode_fixed<W: Write>(out: &mut W, field: &FieldProperties, value: &Value) -> Result<()> {
    match (field.data_type(), value) {
        (DataType::Int8, Value::Int8(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::UInt8, Value::UInt8(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::Int16, Value::Int16(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::UInt16, Value::UInt16(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::Int32, Value::Int32(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::UInt32, Value::UInt32(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::Int64, Value::Int64(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::UInt64, Value::UInt64(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::Float32, Value::Float32(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::Float64, Value::Float64(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::Char, Value::Char(c)) => out.write_all(&(*c as u32).to_le_bytes())?,
        (DataType::Enum, Value::Enum(v)) => out.write_all(&v.to_le_bytes())?,
        (DataType::DateTime, Value::DateTime(dt)) => {
            out.write_all(&datetime_to_ticks(dt)?.to_le_bytes())?
        }
        (DataType::TimeSpan, Value::TimeSpan(span)) => {
            out.write_all(&timespan_to_ticks(span)?.to_le_bytes())?
        }
        (DataType::Decimal, Value::Decimal { digits, scale }) => {
            out.write_all(&[*scale])?;
            out.write_all(&digits.to_le_bytes())?;
        }
        (_, other) => return Err(type_error(field, other)),
    }
    Ok(())
}

fn decode_fixed<R: Read>(input: &mut R, field: &FieldProperties) -> Result<Value> {
    match field.data_type() {
        DataType::Int8 => Ok(Value::Int8(i8::from_le_bytes(read_array(input)?))),
        DataType::UInt8 => Ok(Value::UInt8(u8::from_le_bytes(read_array(input)?))),
        DataType::Int16 => Ok(Value::Int16(i16::from_le_bytes(read_array(input)?))),
        DataType::UInt16 => Ok(Value::UInt16(u16::from_le_bytes(read_array(input)?))),
        DataType::Int32 => Ok(Value::Int32(i32::from_le_bytes(read_array(input)?))),
        DataType::UInt32 => Ok(Value::UInt32(u32::from_le_bytes(read_array(input)?))),
        DataType::Int64 => Ok(Value::Int64(i64::from_le_bytes(read_array(input)?))),
        DataType::UInt64 => Ok(Value::UInt64(u64::from_le_bytes(read_array(input)?))),
        DataType::Float32 => Ok(Value::Float32(f32::from_le_bytes(read_array(input)?))),
        DataType::Float64 => Ok(Value::Float64(f64::from_le_bytes(read_array(input)?))),
        DataType::Char => decode_char(u32::from_le_bytes(read_array(input)?), field),
        DataType::Enum => Ok(Value::Enum(i64::from_le_bytes(read_array(input)?))),
        DataType::DateTime => {
            Ok(Value::DateTime(datetime_from_ticks(i64::from_le_bytes(
                read_array(input)?,
            ))?))
        }
        DataType::TimeSpan => Ok(Value::TimeSpan(timespan_from_ticks(i64::from_le_bytes(
            read_array(input)?,
        )))),
        DataType::Decimal => {
            let scale = read_byte(input)?;
            let digits = i128::from_le_bytes(read_array(input)?);
            Ok(Value::Decimal { digits, scale })
        }
        other => Err(error::corruption(format!(
            "fixed-width payload for {other:?} field `{}`",
            field.name()
        ))),
    }
}

fn encode_seven_bit<W: Write>(out: &mut W, field: &FieldProperties, value: &Value) -> Result<()> {
    match (field.data_type(), value) {
        (DataType::Int8, Value::Int8(v)) => write_7bit_i64(out, *v as i64),
        (DataType::Int16, Value::Int16(v)) => write_7bit_i64(out, *v as i64),
        (DataType::Int32, Value::Int32(v)) => write_7bit_i64(out, *v as i64),
        (DataType::Int64, Value::Int64(v)) => write_7bit_i64(out, *v),
        (DataType::UInt8, Value::UInt8(v)) => write_7bit_u64(out, *v as u64),
        (DataType::UInt16, Value::UInt16(v)) => write_7bit_u64(out, *v as u64),
        (DataType::UInt32, Value::UInt32(v)) => write_7bit_u64(out, *v as u64),
        (DataType::UInt64, Value::UInt64(v)) => write_7bit_u64(out, *v),
        (DataType::Float32, Value::Float32(v)) => write_7bit_u64(out, v.to_bits() as u64),
        (DataType::Float64, Value::Float64(v)) => write_7bit_u64(out, v.to_bits()),
        (DataType::Char, Value::Char(c)) => write_7bit_u64(out, *c as u64),
        (DataType::Enum, Value::Enum(v)) => write_7bit_i64(out, *v),
        (DataType::DateTime, Value::DateTime(dt)) => write_7bit_i64(out, datetime_to_ticks(dt)?),
        (DataType::TimeSpan, Value::TimeSpan(span)) => {
            write_7bit_i64(out, timespan_to_ticks(span)?)
        }
        (DataType::Decimal, Value::Decimal { digits, scale }) => {
            out.write_all(&[*scale])?;
            write_7bit_u128(out, zigzag128(*digits))
        }
        (_, other) => Err(type_error(field, other)),
    }
}

fn decode_seven_bit<R: Read>(input: &mut R, field: &FieldProperties) -> Result<Value> {
    match field.data_type() {
        DataType::Int8 => narrow_signed(read_7bit_i64(input)?, field, Value::Int8),
        DataType::Int16 => narrow_signed(read_7bit_i64(input)?, field, Value::Int16),
        DataType::Int32 => narrow_signed(read_7bit_i64(input)?, field, Value::Int32),
        DataType::Int64 => Ok(Value::Int64(read_7bit_i64(input)?)),
        DataType::UInt8 => narrow_unsigned(read_7bit_u64(input)?, field, Value::UInt8),
        DataType::UInt16 => narrow_unsigned(read_7bit_u64(input)?, field, Value::UInt16),
        DataType::UInt32 => narrow_unsigned(read_7bit_u64(input)?, field, Value::UInt32),
        DataType::UInt64 => Ok(Value::UInt64(read_7bit_u64(input)?)),
        DataType::Float32 => {
            let bits = read_7bit_u64(input)?;
            let bits = u32::try_from(bits).map_err(|_| {
                error::corruption(format!(
                    "float bit pattern out of range in field `{}`",
                    field.name()
                ))
            })?;
            Ok(Value::Float32(f32::from_bits(bits)))
        }
        DataType::Float64 => Ok(Value::Float64(f64::from_bits(read_7bit_u64(input)?))),
        DataType::Char => {
            let scalar = read_7bit_u64(input)?;
            let scalar = u32::try_from(scalar).map_err(|_| {
                error::corruption(format!(
                    "char scalar out of range in field `{}`",
                    field.name()
                ))
            })?;
            decode_char(scalar, field)
        }
        DataType::Enum => Ok(Value::Enum(read_7bit_i64(input)?)),
        DataType::DateTime => Ok(Value::DateTime(datetime_from_ticks(read_7bit_i64(input)?)?)),
        DataType::TimeSpan => Ok(Value::TimeSpan(timespan_from_ticks(read_7bit_i64(input)?))),
        DataType::Decimal => {
            let scale = read_byte(input)?;
            let digits = unzigzag128(read_7bit_u128(input)?);
            Ok(Value::Decimal { digits, scale })
        }
        other => Err(error::corruption(format!(
            "7-bit payload for {other:?} field `{}`",
            field.name()
        ))),
    }
}

fn decode_char(scalar: u32, field: &FieldProperties) -> Result<Value> {
    char::from_u32(scalar).map(Value::Char).ok_or_else(|| {
        error::corruption(format!(
            "invalid char scalar {scalar:#x} in field `{}`",
            field.name()
        ))
    })
}

fn narrow_signed<T: TryFrom<i64>>(
    value: i64,
    field: &FieldProperties,
    wrap: impl FnOnce(T) -> Value,
) -> Result<Value> {
    T::try_from(value).map(wrap).map_err(|_| {
        error::corruption(format!(
            "{value} out of range for field `{}`",
            field.name()
        ))
    })
}

fn narrow_unsigned<T: TryFrom<u64>>(
    value: u64,
    field: &FieldProperties,
    wrap: impl FnOnce(T) -> Value,
) -> Result<Value> {
    T::try_from(value).map(wrap).map_err(|_| {
        error::corruption(format!(
            "{value} out of range for field `{}`",
            field.name()
        ))
    })
}

pub(crate) fn read_byte<R: Read>(input: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    input
        .read_exact(&mut byte)
        .map_err(|_| error::corruption("truncated field payload"))?;
    Ok(byte[0])
}

fn read_array<R: Read, const N: usize>(input: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    input
        .read_exact(&mut buf)
        .map_err(|_| error::corruption("truncated field payload"))?;
    Ok(buf)
}

fn read_bytes<R: Read>(input: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    input
        .read_exact(&mut buf)
        .map_err(|_| error::corruption("truncated field payload"))?;
    Ok(buf)
}
