//! # Storage Engine
//!
//! `SqlStorage` orchestrates the connection pool, the bounded retry loop,
//! schema discovery, catalog operations, and value marshaling. It owns no
//! SQL dialect knowledge beyond what the injected [`Dialect`] supplies.
//!
//! ## Retry Loop
//!
//! Every driver call runs through [`SqlStorage::with_retry`]: the attempt
//! counter starts at 1; on an error the connection is force-closed, and the
//! operation retries immediately on a fresh connection unless the failed
//! connection still reported open (a live connection failing is not a
//! transient fault) or the retry budget is spent. There is no delay between
//! attempts.
//!
//! ## Marshaling
//!
//! Query results come back in database representation; [`SqlStorage`]
//! rehydrates them into local rows per the table layout through the
//! dialect's marshaling hooks, driven by one [`MarshalOptions`] derived from
//! the configuration and the dialect's capability flags at construction.

pub mod marshal;

use std::sync::Arc;

use eyre::{Result, WrapErr};
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::dialect::{ConnectionFactory, Dialect, QueryResult};
use crate::error;
use crate::pool::{ConnectionGuard, ConnectionPool};
use crate::sql::SqlCommand;
use crate::types::{Row, RowLayout, Value};

use marshal::MarshalOptions;

/// SQL storage engine over one dialect, factory, and configuration.
pub struct SqlStorage {
    dialect: Arc<dyn Dialect>,
    pool: ConnectionPool,
    config: StorageConfig,
    options: MarshalOptions,
}

impl SqlStorage {
    /// Builds a storage engine from an injected dialect and connection
    /// factory. No connection is opened until the first operation.
    pub fn connect(
        dialect: Arc<dyn Dialect>,
        factory: Arc<dyn ConnectionFactory>,
        config: StorageConfig,
    ) -> Self {
        let options = MarshalOptions {
            clamp_non_finite: !dialect.supports_ieee_specials(),
            force_narrow_strings: !dialect.supports_full_utf8(),
            date_time_format: config.date_time_format.clone(),
        };
        let pool = ConnectionPool::new(
            dialect.clone(),
            factory,
            config.connection_close_timeout,
        );
        Self {
            dialect,
            pool,
            config,
            options,
        }
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn marshal_options(&self) -> &MarshalOptions {
        &self.options
    }

    pub(crate) fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Bounded immediate-retry combinator around one driver call.
    fn with_retry<T>(
        &self,
        database: &str,
        mut op: impl FnMut(&mut ConnectionGuard<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 1u32;
        loop {
            let mut guard = self.pool.checkout(database)?;
            match op(&mut guard) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let still_open = guard.is_open();
                    guard.mark_failed();
                    drop(guard);
                    if still_open || attempt > self.config.max_error_retries {
                        return Err(error::connection(database, attempt, format!("{e:#}")));
                    }
                    warn!(database, attempt, error = %e, "connection lost, retrying");
                    attempt += 1;
                }
            }
        }
    }

    /// Runs a command without result rows; returns the affected row count.
    pub fn execute(&self, database: &str, command: &SqlCommand) -> Result<u64> {
        debug!(database, sql = command.text(), "execute");
        self.with_retry(database, |guard| {
            guard.execute(command, self.config.command_timeout)
        })
    }

    /// Runs a query and returns the raw result in database representation.
    pub fn query(&self, database: &str, command: &SqlCommand) -> Result<QueryResult> {
        debug!(database, sql = command.text(), "query");
        self.with_retry(database, |guard| {
            guard.query(command, self.config.command_timeout)
        })
    }

    /// Runs a single-value query: `Ok(None)` for zero rows, the first column
    /// of the only row otherwise. More than one row is an error.
    pub fn query_value(&self, database: &str, command: &SqlCommand) -> Result<Option<Value>> {
        let mut result = self.query(database, command)?;
        match result.rows.len() {
            0 => Ok(None),
            1 => {
                let mut row = result.rows.remove(0);
                if row.is_empty() {
                    return Err(error::unsupported("single-value query returned no columns"));
                }
                Ok(Some(row.remove(0)))
            }
            n => Err(error::unsupported(format!(
                "single-value query returned {n} rows"
            ))),
        }
    }

    /// Runs a query and marshals every result row into the local
    /// representation of `layout`. Result columns must match the layout
    /// positionally.
    pub fn query_rows(
        &self,
        database: &str,
        layout: &RowLayout,
        command: &SqlCommand,
    ) -> Result<Vec<Row>> {
        let result = self.query(database, command)?;
        self.marshal_rows(layout, result)
    }

    /// Marshals a raw query result against `layout`.
    pub fn marshal_rows(&self, layout: &RowLayout, result: QueryResult) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(result.rows.len());
        for raw in result.rows {
            if raw.len() != layout.len() {
                return Err(error::schema_mismatch(
                    layout.name(),
                    format!(
                        "query returned {} column(s) for a {}-field layout",
                        raw.len(),
                        layout.len()
                    ),
                ));
            }
            let mut values = Vec::with_capacity(raw.len());
            for (field, value) in layout.fields().iter().zip(raw) {
                values.push(self.dialect.get_local_value(field, value, &self.options)?);
            }
            rows.push(Row::from(values));
        }
        Ok(rows)
    }

    /// Marshals one local row into database representation, positionally per
    /// `layout`.
    pub fn database_values(&self, layout: &RowLayout, row: &Row) -> Result<Vec<Value>> {
        if row.len() != layout.len() {
            return Err(error::schema_mismatch(
                layout.name(),
                format!(
                    "row carries {} value(s) for a {}-field layout",
                    row.len(),
                    layout.len()
                ),
            ));
        }
        layout
            .fields()
            .iter()
            .zip(row.values())
            .map(|(field, value)| {
                self.dialect
                    .get_database_value(field, value.clone(), &self.options)
            })
            .collect()
    }

    /// Discovers the live layout of a table: a zero-row probe supplies
    /// column metadata, then an optional information-schema lookup augments
    /// field descriptions.
    pub fn query_schema(&self, database: &str, table: &str) -> Result<RowLayout> {
        let probe = SqlCommand::raw(format!(
            "SELECT * FROM {} WHERE 1 = 0",
            self.dialect.fqtn(database, table)
        ));
        let result = self
            .query(database, &probe)
            .wrap_err_with(|| format!("schema probe of table `{table}` failed"))?;
        let fields = result
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| column.to_field(index, self.dialect.as_ref()))
            .collect();
        let mut layout = RowLayout::new(table, fields)?;
        if let Some(command) = self.dialect.field_description_command(database, table) {
            for row in self.query(database, &command)?.rows {
                if let [Value::String(name), Value::String(description)] = row.as_slice() {
                    layout.set_description(name, description);
                }
            }
        }
        Ok(layout)
    }

    /// Lists the database names visible to the connected account.
    pub fn database_names(&self) -> Result<Vec<String>> {
        let command = self.dialect.database_names_command();
        let result = self.query("", &command)?;
        Ok(result
            .rows
            .into_iter()
            .filter_map(|mut row| {
                if row.is_empty() {
                    None
                } else {
                    Some(row.remove(0).display_string())
                }
            })
            .collect())
    }

    pub fn has_database(&self, database: &str) -> Result<bool> {
        Ok(self.database_names()?.iter().any(|n| n == database))
    }

    pub fn create_database(&self, database: &str) -> Result<()> {
        let command = self.dialect.create_database_command(database);
        self.execute("", &command)?;
        Ok(())
    }

    pub fn delete_database(&self, database: &str) -> Result<()> {
        let command = self.dialect.delete_database_command(database);
        self.execute("", &command)?;
        Ok(())
    }

    /// Returns `database`, creating it first when absent.
    pub fn ensure_database(&self, database: &str) -> Result<()> {
        if !self.has_database(database)? {
            self.create_database(database)?;
        }
        Ok(())
    }

    /// Closes every pooled connection. Connections still checked out close
    /// when their holders release them.
    pub fn close(&self) {
        self.pool.clear();
    }
}
