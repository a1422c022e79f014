//! # Rows
//!
//! A `Row` is an ordered, fixed-length array of [`Value`]s matching a
//! specific [`RowLayout`] by index. Rows are value objects: no identity
//! beyond their data, created by query results or callers, mutated only by
//! replacing the whole array.

use eyre::Result;

use super::layout::RowLayout;
use super::value::Value;
use crate::error;

/// An ordered array of field values for one layout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Creates a row of `len` NULL values.
    pub fn empty(len: usize) -> Self {
        Self {
            values: vec![Value::Null; len],
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Replaces the whole value array.
    pub fn set_values(&mut self, values: Vec<Value>) {
        self.values = values;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads the identifier value through the layout's ID field. NULL reads
    /// as 0, the "unassigned" identifier.
    pub fn id(&self, layout: &RowLayout) -> Result<i64> {
        let field = layout.id_field()?;
        let value = self.values.get(field.index()).ok_or_else(|| {
            error::schema_mismatch(
                layout.name(),
                format!(
                    "row has {} value(s) but layout declares {}",
                    self.values.len(),
                    layout.len()
                ),
            )
        })?;
        value
            .to_i64()
            .map_err(|e| e.wrap_err(format!("identifier field `{}`", field.name())))
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, FieldFlags, FieldProperties};

    fn layout() -> RowLayout {
        RowLayout::new(
            "users",
            vec![
                FieldProperties::new(0, "id", DataType::Int64).with_flags(FieldFlags::ID),
                FieldProperties::new(0, "name", DataType::String),
            ],
        )
        .unwrap()
    }

    #[test]
    fn id_is_read_through_layout() {
        let row = Row::new(vec![Value::Int64(42), Value::String("alice".into())]);
        assert_eq!(row.id(&layout()).unwrap(), 42);
    }

    #[test]
    fn null_id_reads_as_unassigned() {
        let row = Row::new(vec![Value::Null, Value::String("bob".into())]);
        assert_eq!(row.id(&layout()).unwrap(), 0);
    }

    #[test]
    fn short_row_is_a_schema_error() {
        let row = Row::new(vec![]);
        assert!(row.id(&layout()).is_err());
    }

    #[test]
    fn empty_rows_are_null_filled() {
        let row = Row::empty(3);
        assert!(row.values().iter().all(Value::is_null));
    }
}
