//! # Field Metadata
//!
//! `FieldProperties` describes one field of a row layout: its ordinal index,
//! logical and wire names, local and database-side data types, flag bitset,
//! length/precision, temporal sub-kinds, string encoding, and optional
//! descriptive metadata.
//!
//! ## Flags
//!
//! `FieldFlags` is a combinable bitset:
//!
//! | Flag | Meaning |
//! |------|---------|
//! | ID | part of the identifier set |
//! | AUTO_INCREMENT | the backend assigns values on insert |
//! | UNIQUE | values are unique across rows |
//! | INDEX | an index exists on the field |
//! | NULLABLE | NULL is a legal value |
//!
//! ## Length Semantics
//!
//! `maximum_length` is the size for strings/binary fields (0 = unbounded)
//! and packs precision and scale for decimals as `precision + scale / 100`,
//! e.g. `10.02` for DECIMAL(10,2).

use std::ops::BitOr;

use eyre::Result;

use super::data_type::{DataType, DateTimeKind, DateTimeType, StringEncoding};
use crate::error;

/// Combinable field flag bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldFlags(u32);

impl FieldFlags {
    pub const NONE: FieldFlags = FieldFlags(0);
    pub const ID: FieldFlags = FieldFlags(1);
    pub const AUTO_INCREMENT: FieldFlags = FieldFlags(1 << 1);
    pub const UNIQUE: FieldFlags = FieldFlags(1 << 2);
    pub const INDEX: FieldFlags = FieldFlags(1 << 3);
    pub const NULLABLE: FieldFlags = FieldFlags(1 << 4);

    const ALL: u32 = 0x1F;

    /// Returns the raw bit pattern.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Rebuilds flags from a raw bit pattern, rejecting unknown bits.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::ALL != 0 {
            return Err(error::corruption(format!(
                "unknown field flag bits: {bits:#x}"
            )));
        }
        Ok(FieldFlags(bits))
    }

    /// Returns true if every flag in `other` is set.
    pub fn contains(self, other: FieldFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FieldFlags {
    type Output = FieldFlags;

    fn bitor(self, rhs: FieldFlags) -> FieldFlags {
        FieldFlags(self.0 | rhs.0)
    }
}

/// Metadata for one field within a row layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldProperties {
    index: usize,
    name: String,
    name_at_database: String,
    data_type: DataType,
    type_at_database: DataType,
    flags: FieldFlags,
    maximum_length: f32,
    date_time_kind: DateTimeKind,
    date_time_type: DateTimeType,
    string_encoding: StringEncoding,
    value_type: Option<String>,
    description: Option<String>,
}

impl FieldProperties {
    /// Creates field metadata with the given ordinal, name, and type. The
    /// wire name and database type default to the logical ones.
    pub fn new(index: usize, name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            index,
            name_at_database: name.clone(),
            name,
            data_type,
            type_at_database: data_type,
            flags: FieldFlags::NONE,
            maximum_length: 0.0,
            date_time_kind: DateTimeKind::Unspecified,
            date_time_type: DateTimeType::Native,
            string_encoding: StringEncoding::Utf8,
            value_type: None,
            description: None,
        }
    }

    pub fn with_flags(mut self, flags: FieldFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_name_at_database(mut self, name: impl Into<String>) -> Self {
        self.name_at_database = name.into();
        self
    }

    pub fn with_type_at_database(mut self, data_type: DataType) -> Self {
        self.type_at_database = data_type;
        self
    }

    pub fn with_maximum_length(mut self, length: f32) -> Self {
        self.maximum_length = length;
        self
    }

    pub fn with_date_time(mut self, kind: DateTimeKind, date_time_type: DateTimeType) -> Self {
        self.date_time_kind = kind;
        self.date_time_type = date_time_type;
        self
    }

    pub fn with_string_encoding(mut self, encoding: StringEncoding) -> Self {
        self.string_encoding = encoding;
        self
    }

    pub fn with_value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_at_database(&self) -> &str {
        &self.name_at_database
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn type_at_database(&self) -> DataType {
        self.type_at_database
    }

    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    pub fn maximum_length(&self) -> f32 {
        self.maximum_length
    }

    pub fn date_time_kind(&self) -> DateTimeKind {
        self.date_time_kind
    }

    pub fn date_time_type(&self) -> DateTimeType {
        self.date_time_type
    }

    pub fn string_encoding(&self) -> StringEncoding {
        self.string_encoding
    }

    pub fn value_type(&self) -> Option<&str> {
        self.value_type.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn is_id(&self) -> bool {
        self.flags.contains(FieldFlags::ID)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.flags.contains(FieldFlags::AUTO_INCREMENT)
    }

    pub fn is_nullable(&self) -> bool {
        self.flags.contains(FieldFlags::NULLABLE)
    }

    /// Unpacks decimal precision and scale from `maximum_length`.
    pub fn decimal_precision_scale(&self) -> Option<(u8, u8)> {
        if self.data_type != DataType::Decimal || self.maximum_length <= 0.0 {
            return None;
        }
        let precision = self.maximum_length.trunc() as u8;
        let scale = ((self.maximum_length.fract() * 100.0).round()) as u8;
        Some((precision, scale))
    }

    /// Checks consistency between the data type, length semantics, and flag
    /// legality of this field, including database-bound constraints.
    pub fn validate(&self) -> Result<()> {
        self.validate_structure()?;
        if self.data_type == DataType::String
            && self.maximum_length == 0.0
            && self.flags.contains(FieldFlags::UNIQUE)
        {
            return Err(error::unsupported(format!(
                "field `{}`: unique constraint on an unbounded string",
                self.name
            )));
        }
        Ok(())
    }

    /// Structural checks that hold for any field, decoded stream headers
    /// included. Stream headers carry no length metadata, so index legality
    /// cannot be judged on them; [`Self::validate`] adds those checks.
    pub(crate) fn validate_structure(&self) -> Result<()> {
        if self.maximum_length < 0.0 {
            return Err(error::conversion(
                &self.name,
                format!("negative maximum length {}", self.maximum_length),
            ));
        }
        if self.data_type == DataType::Decimal {
            if let Some((precision, scale)) = self.decimal_precision_scale() {
                if precision > 38 || scale > precision {
                    return Err(error::conversion(
                        &self.name,
                        format!("invalid decimal precision/scale {precision}.{scale}"),
                    ));
                }
            }
        }
        if self.data_type.requires_value_type() && self.value_type.is_none() {
            return Err(error::unsupported(format!(
                "field `{}`: {:?} fields require a value type name",
                self.name, self.data_type
            )));
        }
        Ok(())
    }
}
