//! # Predicate Compiler
//!
//! Depth-first translation of a [`Search`] tree into parameterized SQL text.
//! While flattening, the compiler binds every leaf's field name against the
//! table layout, marshals each operand to its database representation, and
//! records every referenced field into an ordered unique set used later to
//! validate grouping/sorting directives.
//!
//! Compilation is deterministic: the same tree always yields identical SQL
//! text and the same parameter order, one parameter per operand value in
//! encounter order, never reused for equal values.

use eyre::Result;

use crate::dialect::Dialect;
use crate::sql::SqlCommand;
use crate::storage::marshal::MarshalOptions;
use crate::types::{RowLayout, Value};

use super::{CompareMode, Node, Search};

/// One-shot compiler for a predicate tree against a fixed layout.
pub struct SearchCompiler<'a> {
    layout: &'a RowLayout,
    dialect: &'a dyn Dialect,
    options: &'a MarshalOptions,
    referenced: Vec<String>,
}

impl<'a> SearchCompiler<'a> {
    pub fn new(
        layout: &'a RowLayout,
        dialect: &'a dyn Dialect,
        options: &'a MarshalOptions,
    ) -> Self {
        Self {
            layout,
            dialect,
            options,
            referenced: Vec::new(),
        }
    }

    /// Appends the WHERE-clause text of `search` to `command` and returns
    /// the ordered unique set of referenced field names.
    pub fn compile(mut self, search: &Search, command: &mut SqlCommand) -> Result<Vec<String>> {
        self.node(search, command)?;
        Ok(self.referenced)
    }

    fn node(&mut self, search: &Search, command: &mut SqlCommand) -> Result<()> {
        match &search.node {
            Node::None => {
                command.push(if search.inverted { "1<>1" } else { "1=1" });
                Ok(())
            }
            Node::Compare { mode, field, value } => {
                self.compare(*mode, field, value, search.inverted, command)
            }
            Node::In { field, values } => self.set(field, values, search.inverted, command),
            Node::Pair { or, left, right } => {
                if search.inverted {
                    command.push("NOT ");
                }
                command.push("(");
                self.node(left, command)?;
                command.push(if *or { " OR " } else { " AND " });
                self.node(right, command)?;
                command.push(")");
                Ok(())
            }
        }
    }

    fn compare(
        &mut self,
        mode: CompareMode,
        field: &str,
        value: &Value,
        inverted: bool,
        command: &mut SqlCommand,
    ) -> Result<()> {
        let escaped = self.reference(field)?;
        // Equals/Like against NULL degrade to an IS [NOT] NULL test.
        if value.is_null() && matches!(mode, CompareMode::Equals | CompareMode::Like) {
            command.push(&escaped);
            command.push(if inverted { " IS NOT NULL" } else { " IS NULL" });
            return Ok(());
        }
        let marshaled = self.marshal(field, value)?;
        command.push(&escaped);
        command.push(" ");
        command.push(mode.operator(inverted));
        command.push(" ");
        command.push_bound(self.dialect, marshaled);
        Ok(())
    }

    fn set(
        &mut self,
        field: &str,
        values: &[Value],
        inverted: bool,
        command: &mut SqlCommand,
    ) -> Result<()> {
        let escaped = self.reference(field)?;
        if values.is_empty() {
            // A membership test over nothing matches nothing.
            command.push(if inverted { "1=1" } else { "1<>1" });
            return Ok(());
        }
        command.push(&escaped);
        if inverted {
            command.push(" NOT");
        }
        command.push(" IN (");
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                command.push(",");
            }
            let marshaled = self.marshal(field, value)?;
            command.push_bound(self.dialect, marshaled);
        }
        command.push(")");
        Ok(())
    }

    /// Resolves and records a referenced field, returning its escaped wire
    /// name.
    fn reference(&mut self, field: &str) -> Result<String> {
        let properties = self.layout.field_by_name(field)?;
        if !self.referenced.iter().any(|f| f == field) {
            self.referenced.push(field.to_string());
        }
        Ok(self.dialect.escape_field_name(properties.name_at_database()))
    }

    fn marshal(&self, field: &str, value: &Value) -> Result<Value> {
        let properties = self.layout.field_by_name(field)?;
        self.dialect
            .get_database_value(properties, value.clone(), self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::tests::TestDialect;
    use crate::types::{DataType, FieldFlags, FieldProperties};

    fn layout() -> RowLayout {
        RowLayout::new(
            "users",
            vec![
                FieldProperties::new(0, "id", DataType::Int64).with_flags(FieldFlags::ID),
                FieldProperties::new(0, "name", DataType::String),
                FieldProperties::new(0, "age", DataType::Int32),
            ],
        )
        .unwrap()
    }

    fn compile(search: &Search) -> (String, usize, Vec<String>) {
        let layout = layout();
        let dialect = TestDialect::default();
        let options = MarshalOptions::default();
        let mut command = SqlCommand::new();
        let referenced = SearchCompiler::new(&layout, &dialect, &options)
            .compile(search, &mut command)
            .unwrap();
        (
            command.text().to_string(),
            command.parameters().len(),
            referenced,
        )
    }

    #[test]
    fn none_is_a_tautology() {
        assert_eq!(compile(&Search::none()).0, "1=1");
        assert_eq!(compile(&!Search::none()).0, "1<>1");
    }

    #[test]
    fn equals_binds_one_parameter() {
        let (text, params, referenced) = compile(&Search::equals("name", "alice"));
        assert_eq!(text, "`name` = @1");
        assert_eq!(params, 1);
        assert_eq!(referenced, vec!["name"]);
    }

    #[test]
    fn null_equals_degrades_to_is_null() {
        let (text, params, _) = compile(&Search::is_null("name"));
        assert_eq!(text, "`name` IS NULL");
        assert_eq!(params, 0);
        let (text, _, _) = compile(&!Search::is_null("name"));
        assert_eq!(text, "`name` IS NOT NULL");
        let (text, _, _) = compile(&!!Search::is_null("name"));
        assert_eq!(text, "`name` IS NULL");
    }

    #[test]
    fn ordering_inverts_to_complement() {
        let (text, _, _) = compile(&Search::greater("age", 17i32));
        assert_eq!(text, "`age` > @1");
        let (text, _, _) = compile(&!Search::greater("age", 17i32));
        assert_eq!(text, "`age` <= @1");
    }

    #[test]
    fn in_binds_one_parameter_per_member() {
        let values = vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)];
        let (text, params, _) = compile(&Search::is_in("age", values.clone()));
        assert_eq!(text, "`age` IN (@1,@2,@3)");
        assert_eq!(params, 3);
        let (text, _, _) = compile(&!Search::is_in("age", values));
        assert_eq!(text, "`age` NOT IN (@1,@2,@3)");
    }

    #[test]
    fn empty_in_is_always_false() {
        let (text, params, _) = compile(&Search::is_in("age", vec![]));
        assert_eq!(text, "1<>1");
        assert_eq!(params, 0);
        let (text, _, _) = compile(&!Search::is_in("age", vec![]));
        assert_eq!(text, "1=1");
    }

    #[test]
    fn pairs_parenthesize_and_invert_once() {
        let search = Search::equals("name", "a") & !Search::equals("age", 1i32);
        let (text, params, referenced) = compile(&search);
        assert_eq!(text, "(`name` = @1 AND `age` <> @2)");
        assert_eq!(params, 2);
        assert_eq!(referenced, vec!["name", "age"]);

        let search = !(Search::equals("name", "a") | Search::equals("age", 1i32));
        let (text, _, _) = compile(&search);
        assert_eq!(text, "NOT (`name` = @1 OR `age` = @2)");
    }

    #[test]
    fn equal_values_still_bind_distinct_parameters() {
        let search = Search::equals("age", 5i32) & Search::equals("age", 5i32);
        let (text, params, referenced) = compile(&search);
        assert_eq!(text, "(`age` = @1 AND `age` = @2)");
        assert_eq!(params, 2);
        assert_eq!(referenced, vec!["age"]);
    }

    #[test]
    fn compilation_is_deterministic() {
        let search = Search::like("name", "a%") & Search::is_in("age", vec![Value::Int32(1)]);
        let first = compile(&search);
        let second = compile(&search);
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_field_fails() {
        let layout = layout();
        let dialect = TestDialect::default();
        let options = MarshalOptions::default();
        let mut command = SqlCommand::new();
        let result = SearchCompiler::new(&layout, &dialect, &options)
            .compile(&Search::equals("missing", 1i64), &mut command);
        assert!(result.is_err());
    }

    #[test]
    fn anonymous_placeholders_repeat() {
        let layout = layout();
        let dialect = TestDialect::unnamed();
        let options = MarshalOptions::default();
        let mut command = SqlCommand::new();
        SearchCompiler::new(&layout, &dialect, &options)
            .compile(
                &Search::is_in("age", vec![Value::Int32(1), Value::Int32(2)]),
                &mut command,
            )
            .unwrap();
        assert_eq!(command.text(), "`age` IN (?,?)");
        assert_eq!(command.parameters().len(), 2);
    }
}
