//! # Command and Parameter Builder
//!
//! `SqlCommand` accumulates SQL text together with a positional/named
//! parameter list. Parameters are allocated in encounter order and never
//! reused for equal values: two binds of the same value produce two
//! parameters, keeping the text/parameter pairing deterministic.
//!
//! ## Placeholder Naming
//!
//! For dialects with named parameters the placeholder is the dialect's
//! prefix followed by the parameter's 1-based ordinal (`@1`, `@2`, ...).
//! Dialects without named parameters get the same anonymous placeholder
//! (usually `?`) repeated, and bind strictly by position.

use smallvec::SmallVec;

use crate::dialect::Dialect;
use crate::types::Value;

/// One bound parameter: positional name (empty for anonymous placeholders)
/// and value.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam {
    name: String,
    value: Value,
}

impl SqlParam {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// SQL text plus its ordered parameter list.
#[derive(Debug, Clone, Default)]
pub struct SqlCommand {
    text: String,
    parameters: SmallVec<[SqlParam; 8]>,
}

impl SqlCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a command from literal SQL text with no parameters.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: SmallVec::new(),
        }
    }

    /// Appends literal SQL text.
    pub fn push(&mut self, sql: &str) {
        self.text.push_str(sql);
    }

    /// Allocates the next parameter for `value` and returns the placeholder
    /// text to embed. Does not touch the SQL text.
    pub fn bind(&mut self, dialect: &dyn Dialect, value: Value) -> String {
        let ordinal = self.parameters.len() + 1;
        let (name, placeholder) = if dialect.supports_named_parameters() {
            let name = ordinal.to_string();
            let placeholder = format!("{}{}", dialect.parameter_prefix(), name);
            (name, placeholder)
        } else {
            (String::new(), dialect.parameter_prefix().to_string())
        };
        self.parameters.push(SqlParam { name, value });
        placeholder
    }

    /// Binds `value` and appends its placeholder to the SQL text.
    pub fn push_bound(&mut self, dialect: &dyn Dialect, value: Value) {
        let placeholder = self.bind(dialect, value);
        self.text.push_str(&placeholder);
    }

    /// Appends a parameter-free statement to this command, separated with a
    /// statement terminator. Used to batch e.g. an INSERT with the dialect's
    /// last-inserted-id query.
    pub fn append_statement(&mut self, statement: &SqlCommand) {
        debug_assert!(statement.parameters.is_empty());
        self.text.push_str(";\n");
        self.text.push_str(&statement.text);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[SqlParam] {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl std::fmt::Display for SqlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::tests::TestDialect;

    #[test]
    fn named_placeholders_are_positional() {
        let dialect = TestDialect::default();
        let mut cmd = SqlCommand::new();
        assert_eq!(cmd.bind(&dialect, Value::Int64(1)), "@1");
        assert_eq!(cmd.bind(&dialect, Value::Int64(1)), "@2");
        assert_eq!(cmd.parameters().len(), 2);
        assert_eq!(cmd.parameters()[0].name(), "1");
    }

    #[test]
    fn anonymous_placeholders_repeat() {
        let dialect = TestDialect::unnamed();
        let mut cmd = SqlCommand::new();
        assert_eq!(cmd.bind(&dialect, Value::Int64(1)), "?");
        assert_eq!(cmd.bind(&dialect, Value::Int64(2)), "?");
        assert_eq!(cmd.parameters()[1].name(), "");
    }

    #[test]
    fn push_bound_embeds_placeholder() {
        let dialect = TestDialect::default();
        let mut cmd = SqlCommand::raw("SELECT * FROM t WHERE a = ");
        cmd.push_bound(&dialect, Value::String("x".into()));
        assert_eq!(cmd.text(), "SELECT * FROM t WHERE a = @1");
    }

    #[test]
    fn append_statement_batches() {
        let mut cmd = SqlCommand::raw("INSERT INTO t (a) VALUES (1)");
        cmd.append_statement(&SqlCommand::raw("SELECT LAST_INSERT_ID()"));
        assert_eq!(
            cmd.text(),
            "INSERT INTO t (a) VALUES (1);\nSELECT LAST_INSERT_ID()"
        );
    }
}
