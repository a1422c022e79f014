//! # Storage Engine Integration Tests
//!
//! Retry-loop behavior over a scripted fake driver, single-value query
//! semantics, schema discovery, and catalog operations.

mod common;

use common::*;
use dattable::dialect::{ColumnInfo, QueryResult};
use dattable::{DataType, DbError, SqlCommand, StorageConfig, Value};
use std::sync::atomic::Ordering;

mod retry_tests {
    use super::*;

    #[test]
    fn dead_connection_is_retried_on_a_fresh_one() {
        let backend = Backend::new();
        let storage = storage(&backend);
        backend.fail_next(1);

        let affected = storage
            .execute("shop", &SqlCommand::raw("DELETE FROM `t`"))
            .unwrap();

        assert_eq!(affected, 1);
        assert_eq!(backend.recorded_sql().len(), 1);
        assert_eq!(backend.connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retry_budget_is_bounded() {
        let backend = Backend::new();
        let config = StorageConfig::default().with_max_error_retries(1);
        let storage = storage_with(&backend, FakeDialect::default(), config);
        backend.fail_next(10);

        let err = storage
            .execute("shop", &SqlCommand::raw("DELETE FROM `t`"))
            .unwrap_err();

        // Attempt 1 plus one retry; the second failure exceeds the budget.
        assert_eq!(backend.connects.load(Ordering::SeqCst), 2);
        match err.downcast_ref::<DbError>() {
            Some(DbError::Connection {
                database, attempts, ..
            }) => {
                assert_eq!(database, "shop");
                assert_eq!(*attempts, 2);
            }
            other => panic!("expected a connection error, got {other:?}"),
        }
    }

    #[test]
    fn errors_on_an_open_connection_are_not_retried() {
        let backend = Backend::new();
        let storage = storage(&backend);
        backend.fail_next_keeping_open(1);

        let result = storage.execute("shop", &SqlCommand::raw("DELETE FROM `t`"));

        assert!(result.is_err());
        assert_eq!(backend.connects.load(Ordering::SeqCst), 1);
    }
}

mod query_value_tests {
    use super::*;

    #[test]
    fn zero_rows_is_none() {
        let backend = Backend::new();
        let storage = storage(&backend);
        let value = storage
            .query_value("shop", &SqlCommand::raw("SELECT 1"))
            .unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn one_row_yields_its_first_column() {
        let backend = Backend::new();
        let storage = storage(&backend);
        backend.push_value(Value::Int64(7));
        let value = storage
            .query_value("shop", &SqlCommand::raw("SELECT 1"))
            .unwrap();
        assert_eq!(value, Some(Value::Int64(7)));
    }

    #[test]
    fn multiple_rows_are_an_error() {
        let backend = Backend::new();
        let storage = storage(&backend);
        backend.push_result(id_rows(&[1, 2]));
        assert!(storage
            .query_value("shop", &SqlCommand::raw("SELECT 1"))
            .is_err());
    }
}

mod schema_tests {
    use super::*;

    #[test]
    fn schema_probe_derives_the_layout() {
        let backend = Backend::new();
        let storage = storage(&backend);
        backend.push_result(schema_result(&users_layout()));

        let layout = storage.query_schema("shop", "users").unwrap();

        assert_eq!(
            backend.recorded_sql()[0],
            "SELECT * FROM `shop`.`users` WHERE 1 = 0"
        );
        assert_eq!(layout.name(), "users");
        assert_eq!(layout.len(), 3);
        let id = layout.id_field().unwrap();
        assert_eq!(id.name(), "id");
        assert!(id.is_auto_increment());
    }

    #[test]
    fn nullable_columns_keep_their_flag() {
        let backend = Backend::new();
        let storage = storage(&backend);
        let mut column = ColumnInfo::new("note", DataType::String);
        column.nullable = true;
        backend.push_result(QueryResult {
            columns: vec![ColumnInfo::new("id", DataType::Int64), column],
            rows: vec![],
        });
        let layout = storage.query_schema("shop", "notes").unwrap();
        assert!(layout.field_by_name("note").unwrap().is_nullable());
    }
}

mod catalog_tests {
    use super::*;

    #[test]
    fn database_names_read_the_first_column() {
        let backend = Backend::new();
        let storage = storage(&backend);
        backend.push_result(QueryResult {
            columns: vec![ColumnInfo::new("Database", DataType::String)],
            rows: vec![
                vec![Value::String("shop".into())],
                vec![Value::String("archive".into())],
            ],
        });
        assert_eq!(storage.database_names().unwrap(), vec!["shop", "archive"]);
        assert_eq!(backend.recorded_sql()[0], "SHOW DATABASES");
    }

    #[test]
    fn ensure_database_creates_only_when_absent() {
        let backend = Backend::new();
        let storage = storage(&backend);
        backend.push_result(QueryResult::default());
        storage.ensure_database("shop").unwrap();
        assert_eq!(
            backend.recorded_sql(),
            vec!["SHOW DATABASES".to_string(), "CREATE DATABASE `shop`".to_string()]
        );
    }
}
