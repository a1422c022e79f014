//! # Data Type System
//!
//! Canonical `DataType` enum used across layouts, value marshaling, predicate
//! compilation, and the binary row codec.
//!
//! ## Design Principles
//!
//! 1. **Single source of truth**: one `DataType` enum used everywhere
//! 2. **Storage-stable**: `#[repr(u8)]` discriminants double as the on-stream
//!    type codes of the binary row format and must never be renumbered
//! 3. **Metadata-free**: lengths, precision, temporal sub-kinds and string
//!    encodings live in `FieldProperties`, not in the enum
//!
//! ## Type Categories
//!
//! | Category | Types | Fixed Size |
//! |----------|-------|------------|
//! | **Boolean** | Bool | 1 byte |
//! | **Integer** | Int8..Int64, UInt8..UInt64 | 1, 2, 4, 8 bytes |
//! | **Float** | Float32, Float64 | 4, 8 bytes |
//! | **Numeric** | Decimal | 17 bytes (scale + 128-bit digits) |
//! | **Temporal** | DateTime, TimeSpan | 8 bytes (ticks) |
//! | **Text** | Char (4), String (variable) | mixed |
//! | **Binary** | Binary (variable), Guid (16) | mixed |
//! | **Typed** | Enum (8), User (variable) | mixed |
//!
//! A *tick* is 100 nanoseconds; tick zero is 0001-01-01T00:00:00 UTC.
//!
//! ## Temporal Sub-Kinds
//!
//! `DateTimeType` selects the database representation of a temporal field:
//! the native column type, a big integer (ticks, seconds, milliseconds,
//! epoch-offset ticks, or a human-readable digit string parsed back as an
//! integer), a decimal second count, or a double second count.

use eyre::Result;

use crate::error;

/// Number of 100 ns ticks per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Number of 100 ns ticks per millisecond.
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Tick count at 1970-01-01T00:00:00 UTC, the fixed epoch offset used by the
/// `BigIntEpoch` and `DoubleEpoch` representations.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Canonical data type for all dattable operations.
///
/// The `#[repr(u8)]` discriminants are written to binary streams as type
/// codes; they are append-only.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Unknown = 0,
    Bool = 1,
    Int8 = 2,
    UInt8 = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Char = 10,
    Float32 = 11,
    Float64 = 12,
    Decimal = 13,
    String = 14,
    Binary = 15,
    DateTime = 16,
    TimeSpan = 17,
    Guid = 18,
    Enum = 19,
    User = 20,
}

impl DataType {
    /// Returns true for the signed integer types.
    pub fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    /// Returns true for the unsigned integer types.
    pub fn is_unsigned_integer(&self) -> bool {
        matches!(
            self,
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
        )
    }

    /// Returns true for any integer type.
    pub fn is_integer(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    /// Returns true for integer, float, and decimal types.
    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(self, DataType::Float32 | DataType::Float64 | DataType::Decimal)
    }

    /// Returns true for the temporal types.
    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::DateTime | DataType::TimeSpan)
    }

    /// Returns the fixed encoded byte width of this type at binary format
    /// version 1, or None for length-prefixed types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            DataType::Bool | DataType::Int8 | DataType::UInt8 => Some(1),
            DataType::Int16 | DataType::UInt16 => Some(2),
            DataType::Int32 | DataType::UInt32 | DataType::Float32 | DataType::Char => Some(4),
            DataType::Int64
            | DataType::UInt64
            | DataType::Float64
            | DataType::DateTime
            | DataType::TimeSpan
            | DataType::Enum => Some(8),
            DataType::Decimal => Some(17),
            DataType::Guid => Some(16),
            DataType::Unknown | DataType::String | DataType::Binary | DataType::User => None,
        }
    }

    /// Returns true if fields of this type carry a value-type descriptor
    /// string (the name of the enum or user type).
    pub fn requires_value_type(&self) -> bool {
        matches!(self, DataType::Enum | DataType::User)
    }
}

impl TryFrom<u8> for DataType {
    type Error = eyre::Report;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DataType::Unknown),
            1 => Ok(DataType::Bool),
            2 => Ok(DataType::Int8),
            3 => Ok(DataType::UInt8),
            4 => Ok(DataType::Int16),
            5 => Ok(DataType::UInt16),
            6 => Ok(DataType::Int32),
            7 => Ok(DataType::UInt32),
            8 => Ok(DataType::Int64),
            9 => Ok(DataType::UInt64),
            10 => Ok(DataType::Char),
            11 => Ok(DataType::Float32),
            12 => Ok(DataType::Float64),
            13 => Ok(DataType::Decimal),
            14 => Ok(DataType::String),
            15 => Ok(DataType::Binary),
            16 => Ok(DataType::DateTime),
            17 => Ok(DataType::TimeSpan),
            18 => Ok(DataType::Guid),
            19 => Ok(DataType::Enum),
            20 => Ok(DataType::User),
            _ => Err(error::corruption(format!("invalid DataType code: {value}"))),
        }
    }
}

/// Calendar semantics of a stored datetime value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DateTimeKind {
    #[default]
    Unspecified = 0,
    Utc = 1,
    Local = 2,
}

impl TryFrom<u8> for DateTimeKind {
    type Error = eyre::Report;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DateTimeKind::Unspecified),
            1 => Ok(DateTimeKind::Utc),
            2 => Ok(DateTimeKind::Local),
            _ => Err(error::corruption(format!(
                "invalid DateTimeKind code: {value}"
            ))),
        }
    }
}

/// Database representation of a temporal field, orthogonal to
/// [`DateTimeKind`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DateTimeType {
    /// The backend's native temporal column type.
    #[default]
    Native = 0,
    /// Signed 100 ns ticks since 0001-01-01.
    BigIntTicks = 1,
    /// Whole seconds as a big integer.
    BigIntSeconds = 2,
    /// Whole milliseconds as a big integer.
    BigIntMilliseconds = 3,
    /// Ticks offset by [`UNIX_EPOCH_TICKS`].
    BigIntEpoch = 4,
    /// The timestamp formatted with a fixed digit pattern and parsed back as
    /// an integer. Negative timespans negate the formatted magnitude.
    BigIntHumanReadable = 5,
    /// Seconds as a decimal with tick precision.
    DecimalSeconds = 6,
    /// Seconds as a double.
    DoubleSeconds = 7,
    /// Seconds since the Unix epoch as a double.
    DoubleEpoch = 8,
}

impl TryFrom<u8> for DateTimeType {
    type Error = eyre::Report;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DateTimeType::Native),
            1 => Ok(DateTimeType::BigIntTicks),
            2 => Ok(DateTimeType::BigIntSeconds),
            3 => Ok(DateTimeType::BigIntMilliseconds),
            4 => Ok(DateTimeType::BigIntEpoch),
            5 => Ok(DateTimeType::BigIntHumanReadable),
            6 => Ok(DateTimeType::DecimalSeconds),
            7 => Ok(DateTimeType::DoubleSeconds),
            8 => Ok(DateTimeType::DoubleEpoch),
            _ => Err(error::corruption(format!(
                "invalid DateTimeType code: {value}"
            ))),
        }
    }
}

/// Declared character encoding of a string field at the database.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StringEncoding {
    Ascii = 0,
    #[default]
    Utf8 = 1,
    Utf16 = 2,
    Utf32 = 3,
}

impl TryFrom<u8> for StringEncoding {
    type Error = eyre::Report;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(StringEncoding::Ascii),
            1 => Ok(StringEncoding::Utf8),
            2 => Ok(StringEncoding::Utf16),
            3 => Ok(StringEncoding::Utf32),
            _ => Err(error::corruption(format!(
                "invalid StringEncoding code: {value}"
            ))),
        }
    }
}
