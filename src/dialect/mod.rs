//! # Dialect Capability Set
//!
//! Each backend adapter implements [`Dialect`]; the core consumes the
//! capability set but implements no backend itself. A dialect supplies
//! escaping and naming rules, parameter syntax, feature flags consulted at
//! command-build time, catalog command templates, and value-marshaling hooks
//! that default to the core rules in [`crate::storage::marshal`].
//!
//! ## Capability Flags
//!
//! | Capability | Consulted by |
//! |------------|--------------|
//! | `supports_named_parameters` | command builder placeholder naming |
//! | `supports_all_fields_group_by` | grouped finds (`SELECT *` under GROUP BY) |
//! | `connection_can_change_database` | pool reuse across databases |
//! | `supports_full_utf8` | string marshaling (4-byte character validation) |
//! | `supports_ieee_specials` | float marshaling (±∞ clamping) |

pub mod connection;

pub use connection::{ColumnInfo, ConnectionFactory, DbConnection, QueryResult};

use eyre::Result;

use crate::sql::SqlCommand;
use crate::storage::marshal::{self, MarshalOptions};
use crate::types::{DataType, FieldProperties, Value};

/// Backend capability set consumed by the core.
pub trait Dialect: Send + Sync {
    /// Short dialect name for diagnostics.
    fn name(&self) -> &str;

    /// Parameter placeholder prefix, e.g. `@` or `?`.
    fn parameter_prefix(&self) -> &str;

    /// True if parameters carry positional names; false for anonymous
    /// placeholders bound strictly by position.
    fn supports_named_parameters(&self) -> bool;

    /// True if the backend accepts `SELECT *` together with GROUP BY.
    fn supports_all_fields_group_by(&self) -> bool;

    /// True if one native connection can be rebound to another database.
    fn connection_can_change_database(&self) -> bool;

    /// False when the backend cannot store characters needing 4 UTF-8 bytes.
    fn supports_full_utf8(&self) -> bool {
        true
    }

    /// False when the backend cannot store IEEE ±∞.
    fn supports_ieee_specials(&self) -> bool {
        true
    }

    /// Escapes a field name for embedding in SQL text.
    fn escape_field_name(&self, name: &str) -> String;

    /// Escapes a string literal for embedding in SQL text.
    fn escape_string(&self, text: &str) -> String;

    /// Fully qualified table name.
    fn fqtn(&self, database: &str, table: &str) -> String;

    /// Statement keyword for a full-row REPLACE/UPSERT.
    fn replace_into_keyword(&self) -> &str {
        "REPLACE INTO"
    }

    /// Command retrieving the identifier assigned by the most recent
    /// autoincrement INSERT on this connection.
    fn last_inserted_id_command(&self, database: &str, table: &str) -> SqlCommand;

    /// Query returning one database name per row.
    fn database_names_command(&self) -> SqlCommand;

    fn create_database_command(&self, database: &str) -> SqlCommand;

    fn delete_database_command(&self, database: &str) -> SqlCommand;

    /// Optional information-schema style query returning
    /// (field name, description) rows used to augment discovered layouts.
    fn field_description_command(&self, _database: &str, _table: &str) -> Option<SqlCommand> {
        None
    }

    /// Maps declared field metadata to what the database actually stores
    /// (e.g. enum fields stored as Int64).
    fn get_database_field_properties(&self, field: &FieldProperties) -> FieldProperties {
        marshal::database_field_properties(field)
    }

    /// Marshals a local value to its database representation.
    fn get_database_value(
        &self,
        field: &FieldProperties,
        value: Value,
        options: &MarshalOptions,
    ) -> Result<Value> {
        marshal::to_database(field, value, options)
    }

    /// Marshals a database value back to its local representation.
    fn get_local_value(
        &self,
        field: &FieldProperties,
        value: Value,
        options: &MarshalOptions,
    ) -> Result<Value> {
        marshal::to_local(field, value, options)
    }

    /// Maps a driver-reported column type to the local data type.
    fn get_local_data_type(&self, database_type: DataType) -> DataType {
        database_type
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal ANSI-flavored dialect for unit tests.
    pub struct TestDialect {
        pub named_parameters: bool,
        pub all_fields_group_by: bool,
        pub can_change_database: bool,
        pub full_utf8: bool,
        pub ieee_specials: bool,
    }

    impl Default for TestDialect {
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

    impl TestDialect {
        pub fn unnamed() -> Self {
            Self {
                named_parameters: false,
                ..Self::default()
            }
        }
    }

    impl Dialect for TestDialect {
        fn name(&self) -> &str {
            "test"
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
}
