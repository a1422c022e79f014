//! # Data Model
//!
//! Row layout, field metadata, and immutable row values. This module has no
//! dependencies on the SQL or codec layers; both build on it.
//!
//! - [`DataType`], [`DateTimeKind`], [`DateTimeType`], [`StringEncoding`]:
//!   the closed type system
//! - [`FieldProperties`] / [`FieldFlags`]: per-field metadata and validation
//! - [`RowLayout`] / [`TableFlags`]: ordered schemas and compatibility checks
//! - [`Row`] / [`Value`]: field value arrays

pub mod data_type;
pub mod field;
pub mod layout;
pub mod row;
pub mod value;

pub use data_type::{
    DataType, DateTimeKind, DateTimeType, StringEncoding, TICKS_PER_MILLISECOND, TICKS_PER_SECOND,
    UNIX_EPOCH_TICKS,
};
pub use field::{FieldFlags, FieldProperties};
pub use layout::{id_field, RowLayout, TableFlags};
pub use row::Row;
pub use value::{
    datetime_from_ticks, datetime_to_ticks, timespan_from_ticks, timespan_to_ticks, Value,
};
