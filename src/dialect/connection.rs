//! # Driver Connection Abstraction
//!
//! Copy-based traits a native driver implements so the core can run against
//! any backend: `DbConnection` wraps one native connection handle,
//! `ConnectionFactory` opens them. Factories are injected explicitly at
//! storage construction; the core never searches a process-wide registry.
//!
//! ## Result Model
//!
//! `query` returns a `QueryResult`: driver-reported column metadata plus raw
//! rows in database representation. The storage engine marshals values back
//! to their local representation per field; `query_schema` derives layouts
//! from the column metadata of a zero-row probe.

use std::time::Duration;

use eyre::Result;

use crate::sql::SqlCommand;
use crate::types::{DataType, FieldFlags, FieldProperties, Value};

use super::Dialect;

/// Driver-reported metadata for one result column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
    pub maximum_length: f32,
    pub is_id: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub nullable: bool,
    pub indexed: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            maximum_length: 0.0,
            is_id: false,
            auto_increment: false,
            unique: false,
            nullable: false,
            indexed: false,
        }
    }

    /// Derives field metadata at ordinal `index`, translating the database
    /// type to its local counterpart through the dialect.
    pub fn to_field(&self, index: usize, dialect: &dyn Dialect) -> FieldProperties {
        let mut flags = FieldFlags::NONE;
        if self.is_id {
            flags = flags | FieldFlags::ID;
        }
        if self.auto_increment {
            flags = flags | FieldFlags::AUTO_INCREMENT;
        }
        if self.unique {
            flags = flags | FieldFlags::UNIQUE;
        }
        if self.nullable {
            flags = flags | FieldFlags::NULLABLE;
        }
        if self.indexed {
            flags = flags | FieldFlags::INDEX;
        }
        FieldProperties::new(index, &self.name, dialect.get_local_data_type(self.data_type))
            .with_type_at_database(self.data_type)
            .with_flags(flags)
            .with_maximum_length(self.maximum_length)
    }
}

/// Column metadata plus raw rows in database representation.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Value>>,
}

/// One native connection handle.
///
/// A connection is exclusively owned by whichever caller checked it out of
/// the pool; implementations need `Send` but not `Sync`.
pub trait DbConnection: Send {
    /// Reports whether the underlying handle is still usable. The storage
    /// retry loop treats an error from a connection that reports closed as
    /// transient.
    fn is_open(&self) -> bool;

    /// Closes the handle. Must be idempotent.
    fn close(&mut self);

    /// Rebinds the connection to another database. Only called when the
    /// dialect reports `connection_can_change_database()`.
    fn change_database(&mut self, database: &str) -> Result<()>;

    /// Runs a command without result rows; returns the affected row count.
    fn execute(&mut self, command: &SqlCommand, timeout: Duration) -> Result<u64>;

    /// Runs a query and materializes all result rows.
    fn query(&mut self, command: &SqlCommand, timeout: Duration) -> Result<QueryResult>;
}

/// Opens native connections for a configured target.
pub trait ConnectionFactory: Send + Sync {
    /// Opens a new connection bound to `database` (empty string for the
    /// dialect's default database).
    fn connect(&self, database: &str) -> Result<Box<dyn DbConnection>>;
}
