//! # Row Layouts
//!
//! A `RowLayout` binds a table name to an ordered, immutable list of
//! [`FieldProperties`]. Layouts are created once, at table-connect or
//! schema-discovery time, and treated as immutable thereafter; a table may
//! later adopt a compatible replacement layout without re-opening storage.
//!
//! ## Invariants
//!
//! - field indices are a permutation of `0..N-1` in declaration order
//! - field names are unique within a layout
//! - a layout carries at least one field
//! - at most one field carries the ID flag (composite identifier sets are
//!   rejected when the identifier is actually needed)
//!
//! ## Compatibility
//!
//! Two layouts are compatible when the field counts match and every expected
//! field has a same-named, type-compatible counterpart, order-independent.
//! `TableFlags::IGNORE_MISSING_FIELDS` relaxes the count check to allow the
//! actual layout to be a superset.

use eyre::Result;
use hashbrown::HashMap;

use super::field::{FieldFlags, FieldProperties};
use crate::error;

/// Flags controlling layout checks at table connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableFlags(u32);

impl TableFlags {
    pub const NONE: TableFlags = TableFlags(0);
    /// Accept a live table carrying fields the expected layout does not
    /// declare.
    pub const IGNORE_MISSING_FIELDS: TableFlags = TableFlags(1);

    pub fn contains(self, other: TableFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TableFlags {
    type Output = TableFlags;

    fn bitor(self, rhs: TableFlags) -> TableFlags {
        TableFlags(self.0 | rhs.0)
    }
}

/// Table name plus ordered field metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLayout {
    name: String,
    fields: Vec<FieldProperties>,
    by_name: HashMap<String, usize>,
}

impl RowLayout {
    /// Builds a layout, validating every field and the layout invariants.
    /// Field indices are normalized to declaration order.
    pub fn new(name: impl Into<String>, fields: Vec<FieldProperties>) -> Result<Self> {
        Self::build(name.into(), fields, true)
    }

    /// Builds a layout decoded from a stream header. Layout invariants still
    /// hold, but database-bound field constraints are skipped: the header
    /// does not carry length metadata, so a bounded unique string decodes as
    /// unbounded and must not be rejected for it.
    pub(crate) fn decoded(name: impl Into<String>, fields: Vec<FieldProperties>) -> Result<Self> {
        Self::build(name.into(), fields, false)
    }

    fn build(name: String, mut fields: Vec<FieldProperties>, database_bound: bool) -> Result<Self> {
        if fields.is_empty() {
            return Err(error::schema_mismatch(&name, "layout carries no fields"));
        }
        let mut by_name = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter_mut().enumerate() {
            field.set_index(index);
            if database_bound {
                field.validate()?;
            } else {
                field.validate_structure()?;
            }
            if by_name.insert(field.name().to_string(), index).is_some() {
                return Err(error::schema_mismatch(
                    &name,
                    format!("duplicate field name `{}`", field.name()),
                ));
            }
        }
        Ok(Self {
            name,
            fields,
            by_name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldProperties] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&FieldProperties> {
        self.fields.get(index)
    }

    /// Resolves a logical field name to its ordinal index.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Resolves a logical field name, failing with a schema error naming the
    /// unknown field.
    pub fn field_by_name(&self, name: &str) -> Result<&FieldProperties> {
        self.field_index(name)
            .map(|i| &self.fields[i])
            .ok_or_else(|| {
                error::schema_mismatch(&self.name, format!("unknown field `{name}`"))
            })
    }

    /// Returns the single identifier field. Layouts without an ID flag, or
    /// with a composite identifier set, are rejected here: every consumer of
    /// the identifier (autoincrement retrieval, last-inserted-id commands)
    /// assumes exactly one field.
    pub fn id_field(&self) -> Result<&FieldProperties> {
        let mut ids = self.fields.iter().filter(|f| f.is_id());
        let first = ids.next().ok_or_else(|| {
            error::schema_mismatch(&self.name, "layout has no identifier field")
        })?;
        if ids.next().is_some() {
            return Err(error::unsupported(format!(
                "table `{}`: composite identifier sets are not supported",
                self.name
            )));
        }
        Ok(first)
    }

    pub(crate) fn set_description(&mut self, field_name: &str, description: &str) {
        if let Some(&index) = self.by_name.get(field_name) {
            self.fields[index].set_description(description);
        }
    }

    /// Checks that `actual` (the live table) satisfies `expected` (the
    /// declared layout). Field order is irrelevant; names and data types
    /// must agree per field.
    pub fn check(expected: &RowLayout, actual: &RowLayout, flags: TableFlags) -> Result<()> {
        if expected.len() != actual.len() {
            let superset_ok = flags.contains(TableFlags::IGNORE_MISSING_FIELDS)
                && actual.len() > expected.len();
            if !superset_ok {
                return Err(error::schema_mismatch(
                    expected.name(),
                    format!(
                        "expected {} field(s) but table has {}",
                        expected.len(),
                        actual.len()
                    ),
                ));
            }
        }
        for field in expected.fields() {
            let other = actual.field_by_name(field.name()).map_err(|_| {
                error::schema_mismatch(
                    expected.name(),
                    format!("field `{}` missing at table", field.name()),
                )
            })?;
            if !types_compatible(field, other) {
                return Err(error::schema_mismatch(
                    expected.name(),
                    format!(
                        "field `{}`: declared {:?} but table stores {:?}",
                        field.name(),
                        field.data_type(),
                        other.data_type()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Order-independent compatibility test per the check rules with no
    /// flags.
    pub fn is_compatible_with(&self, other: &RowLayout) -> bool {
        RowLayout::check(self, other, TableFlags::NONE).is_ok()
    }
}

fn types_compatible(expected: &FieldProperties, actual: &FieldProperties) -> bool {
    expected.data_type() == actual.data_type()
        || expected.type_at_database() == actual.data_type()
        || expected.data_type() == actual.type_at_database()
}

/// Convenience for tests and simple schemas: an Int64 autoincrement id field.
pub fn id_field(name: impl Into<String>) -> FieldProperties {
    FieldProperties::new(0, name, super::DataType::Int64)
        .with_flags(FieldFlags::ID | FieldFlags::AUTO_INCREMENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn layout() -> RowLayout {
        RowLayout::new(
            "users",
            vec![
                FieldProperties::new(0, "id", DataType::Int64)
                    .with_flags(FieldFlags::ID | FieldFlags::AUTO_INCREMENT),
                FieldProperties::new(0, "name", DataType::String),
                FieldProperties::new(0, "born", DataType::DateTime),
            ],
        )
        .unwrap()
    }

    #[test]
    fn indices_follow_declaration_order() {
        let l = layout();
        for (i, f) in l.fields().iter().enumerate() {
            assert_eq!(f.index(), i);
        }
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = RowLayout::new(
            "t",
            vec![
                FieldProperties::new(0, "a", DataType::Int64),
                FieldProperties::new(0, "a", DataType::String),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_layout_rejected() {
        assert!(RowLayout::new("t", vec![]).is_err());
    }

    #[test]
    fn id_field_lookup() {
        let l = layout();
        assert_eq!(l.id_field().unwrap().name(), "id");

        let no_id = RowLayout::new(
            "t",
            vec![FieldProperties::new(0, "a", DataType::Int64)],
        )
        .unwrap();
        assert!(no_id.id_field().is_err());
    }

    #[test]
    fn composite_identifier_rejected() {
        let l = RowLayout::new(
            "t",
            vec![
                FieldProperties::new(0, "a", DataType::Int64).with_flags(FieldFlags::ID),
                FieldProperties::new(0, "b", DataType::Int64).with_flags(FieldFlags::ID),
            ],
        )
        .unwrap();
        let err = l.id_field().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::DbError>(),
            Some(crate::error::DbError::Unsupported(_))
        ));
    }

    #[test]
    fn check_accepts_reordered_fields() {
        let expected = layout();
        let actual = RowLayout::new(
            "users",
            vec![
                FieldProperties::new(0, "born", DataType::DateTime),
                FieldProperties::new(0, "id", DataType::Int64).with_flags(FieldFlags::ID),
                FieldProperties::new(0, "name", DataType::String),
            ],
        )
        .unwrap();
        RowLayout::check(&expected, &actual, TableFlags::NONE).unwrap();
    }

    #[test]
    fn check_rejects_type_disagreement() {
        let expected = layout();
        let actual = RowLayout::new(
            "users",
            vec![
                FieldProperties::new(0, "id", DataType::Int64).with_flags(FieldFlags::ID),
                FieldProperties::new(0, "name", DataType::Int32),
                FieldProperties::new(0, "born", DataType::DateTime),
            ],
        )
        .unwrap();
        assert!(RowLayout::check(&expected, &actual, TableFlags::NONE).is_err());
    }

    #[test]
    fn superset_allowed_with_flag() {
        let expected = RowLayout::new(
            "users",
            vec![FieldProperties::new(0, "id", DataType::Int64).with_flags(FieldFlags::ID)],
        )
        .unwrap();
        let actual = layout();
        assert!(RowLayout::check(&expected, &actual, TableFlags::NONE).is_err());
        RowLayout::check(&expected, &actual, TableFlags::IGNORE_MISSING_FIELDS).unwrap();
    }

    #[test]
    fn enum_backing_type_is_compatible() {
        let expected = RowLayout::new(
            "jobs",
            vec![FieldProperties::new(0, "state", DataType::Enum)
                .with_value_type("JobState")
                .with_type_at_database(DataType::Int64)],
        )
        .unwrap();
        let actual = RowLayout::new(
            "jobs",
            vec![FieldProperties::new(0, "state", DataType::Int64)],
        )
        .unwrap();
        RowLayout::check(&expected, &actual, TableFlags::NONE).unwrap();
    }
}
