//! Scripted fake backend shared by the integration tests: a MySQL-flavored
//! dialect, a connection that records every command it runs, and a factory
//! that can be told to hand out connections that die mid-command.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eyre::{bail, Result};
use parking_lot::Mutex;

use dattable::dialect::{ColumnInfo, ConnectionFactory, DbConnection, Dialect, QueryResult};
use dattable::{
    DataType, FieldFlags, FieldProperties, RowLayout, SqlCommand, SqlStorage, StorageConfig, Value,
};

/// MySQL-flavored dialect with every capability switchable per test.
pub struct FakeDialect {
    pub named_parameters: bool,
    pub all_fields_group_by: bool,
    pub can_change_database: bool,
    pub full_utf8: bool,
    pub ieee_specials: bool,
}

impl Default for FakeDialect {
    fn default() -> Self {
        Self {
            named_parameters: true,
            all_fields_group_by: true,
            can_change_database: true,
            full_utf8: true,
            ieee_specials: true,
        }
    }
}

impl Dialect for FakeDialect {
    fn name(&self) -> &str {
        "fake"
    }

    fn parameter_prefix(&self) -> &str {
        if self.named_parameters {
            "@"
        } else {
            "?"
        }
    }

    fn supports_named_parameters(&self) -> bool {
        self.named_parameters
    }

    fn supports_all_fields_group_by(&self) -> bool {
        self.all_fields_group_by
    }

    fn connection_can_change_database(&self) -> bool {
        self.can_change_database
    }

    fn supports_full_utf8(&self) -> bool {
        self.full_utf8
    }

    fn supports_ieee_specials(&self) -> bool {
        self.ieee_specials
    }

    fn escape_field_name(&self, name: &str) -> String {
        format!("`{name}`")
    }

    fn escape_string(&self, text: &str) -> String {
        format!("'{}'", text.replace('\'', "''"))
    }

    fn fqtn(&self, database: &str, table: &str) -> String {
        if database.is_empty() {
            format!("`{table}`")
        } else {
            format!("`{database}`.`{table}`")
        }
    }

    fn last_inserted_id_command(&self, _database: &str, _table: &str) -> SqlCommand {
        SqlCommand::raw("SELECT LAST_INSERT_ID()")
    }

    fn database_names_command(&self) -> SqlCommand {
        SqlCommand::raw("SHOW DATABASES")
    }

    fn create_database_command(&self, database: &str) -> SqlCommand {
        SqlCommand::raw(format!("CREATE DATABASE `{database}`"))
    }

    fn delete_database_command(&self, database: &str) -> SqlCommand {
        SqlCommand::raw(format!("DROP DATABASE `{database}`"))
    }
}

/// One recorded driver call: SQL text plus bound parameter values.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Shared state behind every fake connection of one backend.
#[derive(Default)]
pub struct Backend {
    /// Every execute/query call in order.
    pub recorded: Mutex<Vec<Recorded>>,
    /// Scripted results popped per query call; an empty script yields empty
    /// results.
    pub query_results: Mutex<VecDeque<QueryResult>>,
    /// Affected-row count reported by execute calls.
    pub affected: AtomicUsize,
    /// Number of upcoming calls that kill their connection and fail.
    pub failures: AtomicUsize,
    /// Number of upcoming calls that fail while the connection stays open.
    pub open_failures: AtomicUsize,
    /// Total connections opened by the factory.
    pub connects: AtomicUsize,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        let backend = Self::default();
        backend.affected.store(1, Ordering::SeqCst);
        Arc::new(backend)
    }

    /// Scripts the result of the next query call.
    pub fn push_result(&self, result: QueryResult) {
        self.query_results.lock().push_back(result);
    }

    /// Scripts a single-cell result.
    pub fn push_value(&self, value: Value) {
        self.push_result(QueryResult {
            columns: vec![ColumnInfo::new("value", value.data_type())],
            rows: vec![vec![value]],
        });
    }

    /// Makes the next `count` driver calls drop their connection.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` driver calls fail without dropping their
    /// connection (a server-side error, not a transient fault).
    pub fn fail_next_keeping_open(&self, count: usize) {
        self.open_failures.store(count, Ordering::SeqCst);
    }

    pub fn recorded_sql(&self) -> Vec<String> {
        self.recorded.lock().iter().map(|r| r.sql.clone()).collect()
    }

    fn record(&self, command: &SqlCommand) {
        self.recorded.lock().push(Recorded {
            sql: command.text().to_string(),
            params: command
                .parameters()
                .iter()
                .map(|p| p.value().clone())
                .collect(),
        });
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn take_open_failure(&self) -> bool {
        self.open_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

pub struct FakeConnection {
    backend: Arc<Backend>,
    open: bool,
}

impl DbConnection for FakeConnection {
    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn change_database(&mut self, _database: &str) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, command: &SqlCommand, _timeout: Duration) -> Result<u64> {
        if self.backend.take_failure() {
            self.open = false;
            bail!("connection lost");
        }
        if self.backend.take_open_failure() {
            bail!("server error");
        }
        self.backend.record(command);
        Ok(self.backend.affected.load(Ordering::SeqCst) as u64)
    }

    fn query(&mut self, command: &SqlCommand, _timeout: Duration) -> Result<QueryResult> {
        if self.backend.take_failure() {
            self.open = false;
            bail!("connection lost");
        }
        if self.backend.take_open_failure() {
            bail!("server error");
        }
        self.backend.record(command);
        Ok(self
            .backend
            .query_results
            .lock()
            .pop_front()
            .unwrap_or_default())
    }
}

pub struct FakeFactory {
    backend: Arc<Backend>,
}

impl FakeFactory {
    pub fn new(backend: Arc<Backend>) -> Arc<Self> {
        Arc::new(Self { backend })
    }
}

impl ConnectionFactory for FakeFactory {
    fn connect(&self, _database: &str) -> Result<Box<dyn DbConnection>> {
        self.backend.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            backend: self.backend.clone(),
            open: true,
        }))
    }
}

/// Storage over a default fake dialect and the given backend.
pub fn storage(backend: &Arc<Backend>) -> Arc<SqlStorage> {
    storage_with(backend, FakeDialect::default(), StorageConfig::default())
}

pub fn storage_with(
    backend: &Arc<Backend>,
    dialect: FakeDialect,
    config: StorageConfig,
) -> Arc<SqlStorage> {
    Arc::new(SqlStorage::connect(
        Arc::new(dialect),
        FakeFactory::new(backend.clone()),
        config,
    ))
}

/// The layout used across the table-engine tests: autoincrement id, name,
/// total.
pub fn users_layout() -> RowLayout {
    RowLayout::new(
        "users",
        vec![
            FieldProperties::new(0, "id", DataType::Int64)
                .with_flags(FieldFlags::ID | FieldFlags::AUTO_INCREMENT),
            FieldProperties::new(0, "name", DataType::String),
            FieldProperties::new(0, "total", DataType::Int64),
        ],
    )
    .unwrap()
}

/// Same layout without autoincrement on the id field.
pub fn plain_id_layout() -> RowLayout {
    RowLayout::new(
        "users",
        vec![
            FieldProperties::new(0, "id", DataType::Int64).with_flags(FieldFlags::ID),
            FieldProperties::new(0, "name", DataType::String),
            FieldProperties::new(0, "total", DataType::Int64),
        ],
    )
    .unwrap()
}

/// The column metadata a schema probe of `layout` would report.
pub fn schema_result(layout: &RowLayout) -> QueryResult {
    QueryResult {
        columns: layout
            .fields()
            .iter()
            .map(|field| {
                let mut column = ColumnInfo::new(field.name(), field.data_type());
                column.is_id = field.is_id();
                column.auto_increment = field.is_auto_increment();
                column.nullable = field.is_nullable();
                column
            })
            .collect(),
        rows: Vec::new(),
    }
}

/// A query result with one Int64 column per row value.
pub fn id_rows(ids: &[i64]) -> QueryResult {
    QueryResult {
        columns: vec![ColumnInfo::new("id", DataType::Int64)],
        rows: ids.iter().map(|id| vec![Value::Int64(*id)]).collect(),
    }
}
