//! # dattable - Multi-Backend Typed Table Access
//!
//! dattable lets application code read and write typed records against
//! multiple relational back-ends through one abstraction: a tabular data
//! model, a composable search-predicate language compiled to parameterized
//! SQL, pooled connections with bounded retry, and an independent versioned
//! binary row format for serializing the same rows outside any database.
//!
//! ## Quick Start
//!
//! ```ignore
//! use dattable::{Search, SqlStorage, SqlTable, StorageConfig, TableFlags};
//!
//! let storage = Arc::new(SqlStorage::connect(dialect, factory, StorageConfig::default()));
//! let table = SqlTable::connect(storage, "shop", layout, TableFlags::NONE)?;
//!
//! let id = table.insert(&row)?;
//! let open = table.find_rows(
//!     &(Search::equals("state", "open") & Search::greater("total", 100i64)),
//!     &ResultOptions::none().sort_descending("total").limit(20),
//! )?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │       Table Engine (SqlTable)        │
//! ├──────────────────┬──────────────────┤
//! │ Predicate Compiler│ Command Builder  │
//! ├──────────────────┴──────────────────┤
//! │      Storage Engine (SqlStorage)     │
//! ├─────────────────────────────────────┤
//! │   Connection Pool │ Value Marshaling │
//! ├─────────────────────────────────────┤
//! │  Dialect + Driver (injected traits)  │
//! └─────────────────────────────────────┘
//!
//!        Data Model (types/)  ←→  Binary Row Streams (dat/)
//! ```
//!
//! The core implements no backend itself: each backend supplies a
//! [`Dialect`] capability set plus [`dialect::DbConnection`] /
//! [`dialect::ConnectionFactory`] driver implementations, injected
//! explicitly at storage construction. The binary stream layer (`dat/`) is a
//! parallel path reusing only the data model.

pub mod config;
pub mod dat;
pub mod dialect;
pub mod encoding;
pub mod error;
pub mod pool;
pub mod search;
pub mod sql;
pub mod storage;
pub mod table;
pub mod types;

pub use config::StorageConfig;
pub use dat::{DatReader, DatWriter};
pub use dialect::Dialect;
pub use error::DbError;
pub use search::{ResultOption, ResultOptions, Search};
pub use sql::{SqlCommand, SqlParam};
pub use storage::SqlStorage;
pub use table::{CommitFlags, SqlTable, Transaction, TransactionLog};
pub use types::{
    DataType, DateTimeKind, DateTimeType, FieldFlags, FieldProperties, Row, RowLayout,
    StringEncoding, TableFlags, Value,
};
