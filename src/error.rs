//! # Error Taxonomy
//!
//! This module defines the typed error kinds used across dattable. Public
//! operations return `eyre::Result`; the kinds below are attached to reports
//! so callers (and the storage retry loop) can classify a failure without
//! parsing message text.
//!
//! ## Kinds
//!
//! | Kind | Retried | Raised by |
//! |------|---------|-----------|
//! | `Connection` | yes, up to the configured budget | pool / storage engine |
//! | `SchemaMismatch` | never | layout checks, schema discovery |
//! | `ValueConversion` | never | value marshaling |
//! | `Unsupported` | never, fails before any I/O | command building, validation |
//! | `DataCorruption` | never, stream unusable past the point | binary codec |
//!
//! ## Classification
//!
//! ```ignore
//! match err.downcast_ref::<DbError>() {
//!     Some(DbError::Connection { .. }) => retry(),
//!     _ => fail(err),
//! }
//! ```

use thiserror::Error;

/// Typed error kinds for storage, table, and codec operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Transient network or driver failure. Messages carry the target
    /// database and how many attempts were spent before surfacing.
    #[error("connection to database `{database}` failed after {attempts} attempt(s): {message}")]
    Connection {
        database: String,
        attempts: u32,
        message: String,
    },

    /// The declared layout disagrees with the live table.
    #[error("schema mismatch at table `{table}`: {message}")]
    SchemaMismatch { table: String, message: String },

    /// A value cannot be coerced to or from its declared type or range.
    #[error("cannot convert value for field `{field}`: {message}")]
    ValueConversion { field: String, message: String },

    /// The requested feature is not implemented by the active dialect or
    /// data model configuration.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A binary stream is malformed: bad magic, out-of-range version, or a
    /// truncated record where data was expected.
    #[error("corrupt data stream: {0}")]
    DataCorruption(String),
}

impl DbError {
    /// Returns true if the error kind may be resolved by retrying on a
    /// fresh connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Connection { .. })
    }
}

/// Builds a `SchemaMismatch` report.
pub fn schema_mismatch(table: impl Into<String>, message: impl Into<String>) -> eyre::Report {
    eyre::Report::new(DbError::SchemaMismatch {
        table: table.into(),
        message: message.into(),
    })
}

/// Builds a `ValueConversion` report naming the offending field.
pub fn conversion(field: impl Into<String>, message: impl Into<String>) -> eyre::Report {
    eyre::Report::new(DbError::ValueConversion {
        field: field.into(),
        message: message.into(),
    })
}

/// Builds an `Unsupported` report.
pub fn unsupported(message: impl Into<String>) -> eyre::Report {
    eyre::Report::new(DbError::Unsupported(message.into()))
}

/// Builds a `DataCorruption` report.
pub fn corruption(message: impl Into<String>) -> eyre::Report {
    eyre::Report::new(DbError::DataCorruption(message.into()))
}

/// Builds a `Connection` report.
pub fn connection(
    database: impl Into<String>,
    attempts: u32,
    message: impl Into<String>,
) -> eyre::Report {
    eyre::Report::new(DbError::Connection {
        database: database.into(),
        attempts,
        message: message.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_are_transient() {
        let err = DbError::Connection {
            database: "main".into(),
            attempts: 2,
            message: "socket reset".into(),
        };
        assert!(err.is_transient());
        assert!(!DbError::Unsupported("x".into()).is_transient());
    }

    #[test]
    fn kind_survives_wrapping() {
        use eyre::WrapErr;

        let report: eyre::Report = Err::<(), _>(corruption("bad magic"))
            .wrap_err("while opening stream")
            .unwrap_err();
        assert!(matches!(
            report.downcast_ref::<DbError>(),
            Some(DbError::DataCorruption(_))
        ));
    }

    #[test]
    fn messages_name_the_context() {
        let err = schema_mismatch("users", "field count differs");
        assert!(err.to_string().contains("users"));
        let err = conversion("born", "out of range");
        assert!(err.to_string().contains("born"));
    }
}
