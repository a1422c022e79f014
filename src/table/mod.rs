//! # Table Engine
//!
//! `SqlTable` builds and runs the per-table commands: insert with identifier
//! assignment, update, replace, delete, searches with result options, and
//! batched transaction commit. No object state machine exists; every
//! operation's behavior is fully determined by the command it builds.
//!
//! ## Identifier Assignment
//!
//! An insert with identifier ≤ 0 needs an assigned id. When the identifier
//! field is not autoincrement the engine assigns `max(existing) + 1` itself
//! and includes it in the INSERT. When it is autoincrement, the id column is
//! omitted and the dialect's last-inserted-id query is batched onto the same
//! command; its scalar result becomes the returned id.
//!
//! ## Grouped Finds
//!
//! Dialects that cannot `SELECT *` under GROUP BY get a restricted select
//! over exactly the searched and grouped fields; each group's representative
//! row id is then resolved with a single-row lookup sorted by id descending.

pub mod transaction;

pub use transaction::{CommitFlags, Transaction, TransactionLog};

use std::sync::Arc;

use eyre::{bail, ensure, Result};
use tracing::debug;

use crate::search::{ResultOptions, Search, SearchCompiler};
use crate::sql::SqlCommand;
use crate::storage::SqlStorage;
use crate::types::{Row, RowLayout, TableFlags, Value};

/// One table bound to a storage engine, database, and layout.
pub struct SqlTable {
    storage: Arc<SqlStorage>,
    database: String,
    layout: RowLayout,
}

impl SqlTable {
    /// Opens a table using its live layout discovered from the database.
    pub fn open(storage: Arc<SqlStorage>, database: impl Into<String>, table: &str) -> Result<Self> {
        let database = database.into();
        let layout = storage.query_schema(&database, table)?;
        Ok(Self {
            storage,
            database,
            layout,
        })
    }

    /// Connects a table with a declared layout, validated against the live
    /// table per `flags`.
    pub fn connect(
        storage: Arc<SqlStorage>,
        database: impl Into<String>,
        layout: RowLayout,
        flags: TableFlags,
    ) -> Result<Self> {
        let database = database.into();
        let actual = storage.query_schema(&database, layout.name())?;
        RowLayout::check(&layout, &actual, flags)?;
        Ok(Self {
            storage,
            database,
            layout,
        })
    }

    /// Adopts a replacement layout without re-opening storage. The new
    /// layout must be compatible with the current one.
    pub fn set_layout(&mut self, layout: RowLayout, flags: TableFlags) -> Result<()> {
        RowLayout::check(&layout, &self.layout, flags)?;
        self.layout = layout;
        Ok(())
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn name(&self) -> &str {
        self.layout.name()
    }

    pub fn storage(&self) -> &Arc<SqlStorage> {
        &self.storage
    }

    fn fqtn(&self) -> String {
        self.storage
            .dialect()
            .fqtn(&self.database, self.layout.name())
    }

    /// Escaped wire name of the identifier column.
    fn id_column(&self) -> Result<String> {
        let field = self.layout.id_field()?;
        Ok(self
            .storage
            .dialect()
            .escape_field_name(field.name_at_database()))
    }

    fn escape(&self, field_name: &str) -> Result<String> {
        let field = self.layout.field_by_name(field_name)?;
        Ok(self
            .storage
            .dialect()
            .escape_field_name(field.name_at_database()))
    }

    // ---- mutation commands ------------------------------------------------

    /// Inserts `row` and returns its identifier. Identifiers ≤ 0 are
    /// assigned: by the engine for plain id fields, by the backend for
    /// autoincrement fields.
    pub fn insert(&self, row: &Row) -> Result<i64> {
        let id = row.id(&self.layout)?;
        let id_field = self.layout.id_field()?.clone();
        let mut values = self.storage.database_values(&self.layout, row)?;

        if id > 0 {
            let mut command = SqlCommand::new();
            self.push_insert(&mut command, values, None);
            self.storage.execute(&self.database, &command)?;
            return Ok(id);
        }

        if id_field.is_auto_increment() {
            let mut command = SqlCommand::new();
            self.push_insert(&mut command, values, Some(id_field.index()));
            command.append_statement(
                &self
                    .storage
                    .dialect()
                    .last_inserted_id_command(&self.database, self.layout.name()),
            );
            let value = self
                .storage
                .query_value(&self.database, &command)?
                .unwrap_or(Value::Null);
            let new_id = value.to_i64()?;
            ensure!(
                new_id > 0,
                "table `{}`: backend reported no inserted identifier",
                self.layout.name()
            );
            Ok(new_id)
        } else {
            let new_id = self.next_free_id()?;
            values[id_field.index()] = Value::Int64(new_id);
            let mut command = SqlCommand::new();
            self.push_insert(&mut command, values, None);
            self.storage.execute(&self.database, &command)?;
            Ok(new_id)
        }
    }

    /// Updates the row identified by its id field. The row must carry a
    /// valid (> 0) identifier.
    pub fn update(&self, row: &Row) -> Result<()> {
        let id = row.id(&self.layout)?;
        ensure!(
            id > 0,
            "table `{}`: update requires a valid identifier",
            self.layout.name()
        );
        let values = self.storage.database_values(&self.layout, row)?;
        let mut command = SqlCommand::new();
        self.push_update(&mut command, values, id)?;
        let affected = self.storage.execute(&self.database, &command)?;
        ensure!(
            affected > 0,
            "table `{}`: no row with id {id}",
            self.layout.name()
        );
        Ok(())
    }

    /// Inserts or overwrites the row identified by its id field, using the
    /// dialect's native REPLACE/UPSERT statement over every field.
    pub fn replace(&self, row: &Row) -> Result<()> {
        let id = row.id(&self.layout)?;
        ensure!(
            id > 0,
            "table `{}`: replace requires a valid identifier",
            self.layout.name()
        );
        let values = self.storage.database_values(&self.layout, row)?;
        let mut command = SqlCommand::new();
        self.push_replace(&mut command, values);
        self.storage.execute(&self.database, &command)?;
        Ok(())
    }

    /// Deletes the row with identifier `id`.
    pub fn delete(&self, id: i64) -> Result<()> {
        ensure!(
            id > 0,
            "table `{}`: delete requires a valid identifier",
            self.layout.name()
        );
        let mut command = SqlCommand::new();
        self.push_delete(&mut command, id)?;
        let affected = self.storage.execute(&self.database, &command)?;
        ensure!(
            affected > 0,
            "table `{}`: no row with id {id}",
            self.layout.name()
        );
        Ok(())
    }

    /// Deletes every row matching `search`; returns the number of rows
    /// removed.
    pub fn delete_rows(&self, search: &Search) -> Result<u64> {
        let mut command = SqlCommand::new();
        command.push("DELETE FROM ");
        command.push(&self.fqtn());
        command.push(" WHERE ");
        self.compile(search, &mut command)?;
        self.storage.execute(&self.database, &command)
    }

    /// Deletes every row; returns the number of rows removed.
    pub fn clear(&self) -> Result<u64> {
        let command = SqlCommand::raw(format!("DELETE FROM {}", self.fqtn()));
        self.storage.execute(&self.database, &command)
    }

    // ---- queries ----------------------------------------------------------

    /// Builds a SELECT over `what` with the compiled predicate and result
    /// options appended; returns the command plus the referenced field set.
    pub fn build_select(
        &self,
        what: &str,
        search: &Search,
        options: &ResultOptions,
    ) -> Result<(SqlCommand, Vec<String>)> {
        options.validate()?;
        for name in options.field_names() {
            self.layout.field_by_name(name)?;
        }
        let mut command = SqlCommand::new();
        command.push("SELECT ");
        command.push(what);
        command.push(" FROM ");
        command.push(&self.fqtn());
        command.push(" WHERE ");
        let referenced = self.compile(search, &mut command)?;
        self.push_options(&mut command, options)?;
        Ok((command, referenced))
    }

    /// Returns all rows matching `search`, honoring `options`.
    pub fn find_rows(&self, search: &Search, options: &ResultOptions) -> Result<Vec<Row>> {
        options.validate()?;
        let grouped = options.groups().next().is_some();
        if grouped && !self.storage.dialect().supports_all_fields_group_by() {
            let ids = self.get_ids(search, options)?;
            return ids.into_iter().map(|id| self.get_row(id)).collect();
        }
        let (command, _) = self.build_select("*", search, options)?;
        self.storage.query_rows(&self.database, &self.layout, &command)
    }

    /// Returns the single row matching `search`; zero or multiple matches
    /// are errors.
    pub fn get_single(&self, search: &Search) -> Result<Row> {
        let mut rows = self.find_rows(search, &ResultOptions::none())?;
        match rows.len() {
            0 => bail!("table `{}`: no matching row", self.layout.name()),
            1 => Ok(rows.remove(0)),
            n => bail!("table `{}`: {n} rows matched a single-row search", self.layout.name()),
        }
    }

    /// Returns the row with identifier `id`.
    pub fn get_row(&self, id: i64) -> Result<Row> {
        let id_field = self.layout.id_field()?;
        self.get_single(&Search::equals(id_field.name(), id))
    }

    /// Returns the identifiers of all rows matching `search`.
    pub fn get_ids(&self, search: &Search, options: &ResultOptions) -> Result<Vec<i64>> {
        options.validate()?;
        let grouped = options.groups().next().is_some();
        if grouped && !self.storage.dialect().supports_all_fields_group_by() {
            return self.grouped_ids(search, options);
        }
        let id_column = self.id_column()?;
        let (command, _) = self.build_select(&id_column, search, options)?;
        let result = self.storage.query(&self.database, &command)?;
        result
            .rows
            .into_iter()
            .map(|row| match row.first() {
                Some(value) => value.to_i64(),
                None => bail!("table `{}`: id query returned no columns", self.layout.name()),
            })
            .collect()
    }

    /// Restricted grouped-id path for dialects without `SELECT *` GROUP BY
    /// support: select exactly the searched and grouped fields, then resolve
    /// each group's representative id with a descending single-row lookup.
    fn grouped_ids(&self, search: &Search, options: &ResultOptions) -> Result<Vec<i64>> {
        let mut scratch = SqlCommand::new();
        let mut select_fields = self.compile(search, &mut scratch)?;
        for group in options.groups() {
            if !select_fields.iter().any(|f| f == group) {
                select_fields.push(group.to_string());
            }
        }

        let mut command = SqlCommand::new();
        command.push("SELECT ");
        for (i, name) in select_fields.iter().enumerate() {
            if i > 0 {
                command.push(",");
            }
            let escaped = self.escape(name)?;
            command.push(&escaped);
        }
        command.push(" FROM ");
        command.push(&self.fqtn());
        command.push(" WHERE ");
        self.compile(search, &mut command)?;
        self.push_options(&mut command, options)?;

        let groups: Vec<&str> = options.groups().collect();
        let id_column = self.id_column()?;
        let dialect = self.storage.dialect().clone();
        let result = self.storage.query(&self.database, &command)?;

        let mut ids = Vec::with_capacity(result.rows.len());
        for row in result.rows {
            let mut lookup = SqlCommand::new();
            lookup.push("SELECT ");
            lookup.push(&id_column);
            lookup.push(" FROM ");
            lookup.push(&self.fqtn());
            lookup.push(" WHERE ");
            for (i, group) in groups.iter().enumerate() {
                if i > 0 {
                    lookup.push(" AND ");
                }
                let escaped = self.escape(group)?;
                lookup.push(&escaped);
                let group_value = select_fields
                    .iter()
                    .position(|f| f == group)
                    .and_then(|p| row.get(p));
                match group_value {
                    Some(Value::Null) | None => lookup.push(" IS NULL"),
                    Some(value) => {
                        lookup.push(" = ");
                        lookup.push_bound(dialect.as_ref(), value.clone());
                    }
                }
            }
            lookup.push(" ORDER BY ");
            lookup.push(&id_column);
            lookup.push(" DESC LIMIT 1");
            if let Some(value) = self.storage.query_value(&self.database, &lookup)? {
                ids.push(value.to_i64()?);
            }
        }
        Ok(ids)
    }

    /// Counts the rows matching `search`.
    pub fn count(&self, search: &Search, options: &ResultOptions) -> Result<u64> {
        let (command, _) = self.build_select("COUNT(*)", search, options)?;
        let value = self
            .storage
            .query_value(&self.database, &command)?
            .unwrap_or(Value::Int64(0));
        Ok(value.to_i64()?.max(0) as u64)
    }

    /// Returns true if at least one row matches `search`.
    pub fn exists(&self, search: &Search) -> Result<bool> {
        Ok(self.count(search, &ResultOptions::none())? > 0)
    }

    /// Largest identifier in the table; 0 when the table is empty.
    pub fn maximum_id(&self) -> Result<i64> {
        let id_column = self.id_column()?;
        let command = SqlCommand::raw(format!(
            "SELECT MAX({id_column}) FROM {}",
            self.fqtn()
        ));
        let value = self
            .storage
            .query_value(&self.database, &command)?
            .unwrap_or(Value::Null);
        value.to_i64()
    }

    /// The next identifier a non-autoincrement insert would assign.
    pub fn next_free_id(&self) -> Result<i64> {
        Ok(self.maximum_id()?.max(0) + 1)
    }

    // ---- transaction commit ----------------------------------------------

    /// Dequeues up to `count` pending transactions and commits them in one
    /// atomic batch. Returns the number of committed transactions, or -1
    /// when the batch failed and `suppress_errors` is set.
    pub fn commit(&self, log: &TransactionLog, count: usize, flags: CommitFlags) -> Result<i64> {
        let batch = log.dequeue(count);
        if batch.is_empty() {
            return Ok(0);
        }
        debug!(table = self.layout.name(), batch = batch.len(), "committing");
        match self.commit_batch(&batch) {
            Ok(()) => Ok(batch.len() as i64),
            Err(e) => {
                if flags.requeue_on_error {
                    log.requeue(batch);
                }
                if flags.suppress_errors {
                    tracing::warn!(table = self.layout.name(), error = %e, "commit failed");
                    Ok(-1)
                } else {
                    Err(e)
                }
            }
        }
    }

    fn commit_batch(&self, batch: &[Transaction]) -> Result<()> {
        let mut command = SqlCommand::raw("START TRANSACTION");
        for transaction in batch {
            command.push(";\n");
            match transaction {
                Transaction::Inserted(row) => {
                    let values = self.storage.database_values(&self.layout, row)?;
                    self.push_insert(&mut command, values, None);
                }
                Transaction::Updated(row) => {
                    let id = row.id(&self.layout)?;
                    ensure!(
                        id > 0,
                        "table `{}`: queued update without identifier",
                        self.layout.name()
                    );
                    let values = self.storage.database_values(&self.layout, row)?;
                    self.push_update(&mut command, values, id)?;
                }
                Transaction::Replaced(row) => {
                    let values = self.storage.database_values(&self.layout, row)?;
                    self.push_replace(&mut command, values);
                }
                Transaction::Deleted(id) => {
                    self.push_delete(&mut command, *id)?;
                }
            }
        }
        command.push(";\nCOMMIT");
        self.storage.execute(&self.database, &command)?;
        Ok(())
    }

    // ---- command fragments ------------------------------------------------

    fn compile(&self, search: &Search, command: &mut SqlCommand) -> Result<Vec<String>> {
        SearchCompiler::new(
            &self.layout,
            self.storage.dialect().as_ref(),
            self.storage.marshal_options(),
        )
        .compile(search, command)
    }

    /// Appends GROUP BY / ORDER BY / LIMIT / OFFSET clauses per the
    /// (already validated) options.
    fn push_options(&self, command: &mut SqlCommand, options: &ResultOptions) -> Result<()> {
        let mut first = true;
        for group in options.groups() {
            command.push(if first { " GROUP BY " } else { "," });
            first = false;
            let escaped = self.escape(group)?;
            command.push(&escaped);
        }
        let mut first = true;
        for (field, descending) in options.sorts() {
            command.push(if first { " ORDER BY " } else { "," });
            first = false;
            let escaped = self.escape(field)?;
            command.push(&escaped);
            command.push(if descending { " DESC" } else { " ASC" });
        }
        if let Some(limit) = options.limit_value() {
            command.push(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = options.offset_value() {
            command.push(&format!(" OFFSET {offset}"));
        }
        Ok(())
    }

    /// Appends `INSERT INTO t (cols) VALUES (params)`, optionally omitting
    /// the field at `omit` (the autoincrement id column).
    fn push_insert(&self, command: &mut SqlCommand, values: Vec<Value>, omit: Option<usize>) {
        let dialect = self.storage.dialect().clone();
        command.push("INSERT INTO ");
        command.push(&self.fqtn());
        command.push(" (");
        let mut first = true;
        for field in self.layout.fields() {
            if Some(field.index()) == omit {
                continue;
            }
            if !first {
                command.push(",");
            }
            first = false;
            command.push(&dialect.escape_field_name(field.name_at_database()));
        }
        command.push(") VALUES (");
        let mut first = true;
        for (index, value) in values.into_iter().enumerate() {
            if Some(index) == omit {
                continue;
            }
            if !first {
                command.push(",");
            }
            first = false;
            command.push_bound(dialect.as_ref(), value);
        }
        command.push(")");
    }

    /// Appends the dialect's REPLACE/UPSERT over every field positionally.
    fn push_replace(&self, command: &mut SqlCommand, values: Vec<Value>) {
        let dialect = self.storage.dialect().clone();
        command.push(dialect.replace_into_keyword());
        command.push(" ");
        command.push(&self.fqtn());
        command.push(" (");
        for (i, field) in self.layout.fields().iter().enumerate() {
            if i > 0 {
                command.push(",");
            }
            command.push(&dialect.escape_field_name(field.name_at_database()));
        }
        command.push(") VALUES (");
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                command.push(",");
            }
            command.push_bound(dialect.as_ref(), value);
        }
        command.push(")");
    }

    /// Appends `UPDATE t SET col = param, ... WHERE id = param`.
    fn push_update(&self, command: &mut SqlCommand, values: Vec<Value>, id: i64) -> Result<()> {
        let dialect = self.storage.dialect().clone();
        let id_index = self.layout.id_field()?.index();
        command.push("UPDATE ");
        command.push(&self.fqtn());
        command.push(" SET ");
        let mut first = true;
        for (field, value) in self.layout.fields().iter().zip(values) {
            if field.index() == id_index {
                continue;
            }
            if !first {
                command.push(",");
            }
            first = false;
            command.push(&dialect.escape_field_name(field.name_at_database()));
            command.push(" = ");
            command.push_bound(dialect.as_ref(), value);
        }
        command.push(" WHERE ");
        command.push(&self.id_column()?);
        command.push(" = ");
        command.push_bound(dialect.as_ref(), Value::Int64(id));
        Ok(())
    }

    /// Appends `DELETE FROM t WHERE id = param`.
    fn push_delete(&self, command: &mut SqlCommand, id: i64) -> Result<()> {
        command.push("DELETE FROM ");
        command.push(&self.fqtn());
        command.push(" WHERE ");
        command.push(&self.id_column()?);
        command.push(" = ");
        command.push_bound(self.storage.dialect().as_ref(), Value::Int64(id));
        Ok(())
    }
}
