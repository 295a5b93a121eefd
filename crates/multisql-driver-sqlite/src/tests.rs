use crate::{MAX_ROWS_ATTRIBUTE, SqliteConnection};
use multisql_core::{Connection, ConnectionSettings, MultisqlError, StatementAttributes, Value};

async fn memory_with_table() -> SqliteConnection {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute(
        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, payload BLOB)",
        &StatementAttributes::new(),
        &[],
    )
    .await
    .unwrap();
    conn
}

async fn count(conn: &SqliteConnection) -> i64 {
    conn.query("SELECT COUNT(*) FROM items", &[])
        .await
        .unwrap()
        .scalar()
        .and_then(Value::as_i64)
        .unwrap()
}

mod execute_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_execute_reports_affected_rows() {
        let conn = memory_with_table().await;

        let result = conn
            .execute(
                "INSERT INTO items (name) VALUES ('a'), ('b')",
                &StatementAttributes::new(),
                &[],
            )
            .await
            .unwrap();

        assert!(!result.is_query);
        assert_eq!(result.affected_rows, 2);
    }

    #[tokio::test]
    async fn test_query_returns_rows() {
        let conn = memory_with_table().await;
        conn.execute(
            "INSERT INTO items (name, payload) VALUES (?, ?)",
            &StatementAttributes::new(),
            &[Value::from("first"), Value::Bytes(vec![0, 159, 146, 150])],
        )
        .await
        .unwrap();

        let result = conn
            .execute(
                "SELECT id, name, payload FROM items",
                &StatementAttributes::new(),
                &[],
            )
            .await
            .unwrap();

        assert!(result.is_query);
        let rows = result.result.unwrap();
        assert_eq!(rows.columns, vec!["id", "name", "payload"]);
        assert_eq!(rows.row_count(), 1);
        assert_eq!(rows.rows[0].get_by_name("name"), Some(&Value::from("first")));
        assert_eq!(
            rows.rows[0].get(2),
            Some(&Value::Bytes(vec![0, 159, 146, 150]))
        );
    }

    #[tokio::test]
    async fn test_bound_value_conversions() {
        let conn = SqliteConnection::open_in_memory().unwrap();

        let result = conn
            .query(
                "SELECT ?, ?, ?, ?",
                &[
                    Value::Bool(true),
                    Value::Int32(7),
                    Value::Null,
                    Value::Float64(1.5),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            result.rows[0].values,
            vec![
                Value::Int64(1),
                Value::Int64(7),
                Value::Null,
                Value::Float64(1.5)
            ]
        );
    }

    #[tokio::test]
    async fn test_max_rows_attribute() {
        let conn = memory_with_table().await;
        for name in ["a", "b", "c"] {
            conn.execute(
                "INSERT INTO items (name) VALUES (?)",
                &StatementAttributes::new(),
                &[Value::from(name)],
            )
            .await
            .unwrap();
        }

        let result = conn
            .execute(
                "SELECT name FROM items ORDER BY id",
                &StatementAttributes::new().with(MAX_ROWS_ATTRIBUTE, 2_i64),
                &[],
            )
            .await
            .unwrap();

        assert_eq!(result.result.unwrap().row_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_records_error_info() {
        let conn = SqliteConnection::open_in_memory().unwrap();

        let err = conn
            .execute(
                "INSERT INTO missing VALUES (1)",
                &StatementAttributes::new(),
                &[],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MultisqlError::Query(_)));
        let info = conn.error_info().unwrap();
        assert!(info.message.contains("no such table"));
        assert_eq!(info.code.as_deref(), Some("1"));

        conn.query("SELECT 1", &[]).await.unwrap();
        assert_eq!(conn.error_info(), None);
    }

    #[tokio::test]
    async fn test_multiple_statements_rejected() {
        let conn = memory_with_table().await;

        let err = conn
            .execute(
                "INSERT INTO items (name) VALUES ('a'); SELECT 2",
                &StatementAttributes::new(),
                &[],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MultisqlError::Query(_)));
        let info = conn.error_info().unwrap();
        assert!(info.message.contains("multiple statements"));
        assert_eq!(info.code.as_deref(), Some("21"));
        assert_eq!(count(&conn).await, 0);
    }

    #[tokio::test]
    async fn test_trailing_comment_is_not_a_statement() {
        let conn = SqliteConnection::open_in_memory().unwrap();

        let result = conn.query("SELECT 1; -- done", &[]).await.unwrap();

        assert_eq!(result.scalar(), Some(&Value::Int64(1)));
    }

    #[tokio::test]
    async fn test_numbered_parameters_bind_by_number() {
        let conn = SqliteConnection::open_in_memory().unwrap();

        let result = conn
            .query(
                "SELECT $2, $1, $2",
                &[Value::from("one"), Value::from("two")],
            )
            .await
            .unwrap();

        assert_eq!(
            result.rows[0].values,
            vec![Value::from("two"), Value::from("one"), Value::from("two")]
        );
    }

    #[tokio::test]
    async fn test_numbered_parameters_may_skip_numbers() {
        let conn = SqliteConnection::open_in_memory().unwrap();

        let result = conn
            .query("SELECT $3", &[Value::Null, Value::Null, Value::Int64(3)])
            .await
            .unwrap();

        assert_eq!(result.scalar(), Some(&Value::Int64(3)));
    }

    #[tokio::test]
    async fn test_parameter_count_mismatch_has_code() {
        let conn = SqliteConnection::open_in_memory().unwrap();

        let err = conn
            .query("SELECT ?, ?", &[Value::Int64(1)])
            .await
            .unwrap_err();

        assert!(matches!(err, MultisqlError::Query(_)));
        // SQLITE_RANGE
        assert_eq!(conn.error_info().unwrap().code.as_deref(), Some("25"));

        let err = conn
            .query("SELECT $2", &[Value::Int64(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, MultisqlError::Query(_)));
    }

    #[tokio::test]
    async fn test_trigger_body_is_one_statement() {
        let conn = memory_with_table().await;
        conn.execute(
            "CREATE TABLE audit (name TEXT)",
            &StatementAttributes::new(),
            &[],
        )
        .await
        .unwrap();

        conn.execute(
            "CREATE TRIGGER items_audit AFTER INSERT ON items BEGIN \
             INSERT INTO audit VALUES (NEW.name); END",
            &StatementAttributes::new(),
            &[],
        )
        .await
        .unwrap();
        conn.query("INSERT INTO items (name) VALUES ('x')", &[])
            .await
            .unwrap();

        let audit = conn.query("SELECT name FROM audit", &[]).await.unwrap();
        assert_eq!(audit.scalar(), Some(&Value::from("x")));
    }
}

mod transaction_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_auto_commit_off_opens_implicit_transaction() {
        let conn = memory_with_table().await;
        conn.set_auto_commit(false).unwrap();

        conn.query("INSERT INTO items (name) VALUES ('a')", &[])
            .await
            .unwrap();
        assert!(conn.in_transaction());

        conn.rollback().await.unwrap();
        assert!(!conn.in_transaction());
        assert_eq!(count(&conn).await, 0);
    }

    #[tokio::test]
    async fn test_enabling_auto_commit_commits() {
        let conn = memory_with_table().await;
        conn.set_auto_commit(false).unwrap();
        conn.query("INSERT INTO items (name) VALUES ('a')", &[])
            .await
            .unwrap();

        conn.set_auto_commit(true).unwrap();

        assert!(!conn.in_transaction());
        conn.abort_transaction().unwrap();
        assert_eq!(count(&conn).await, 1);
    }

    #[tokio::test]
    async fn test_explicit_transaction() {
        let conn = memory_with_table().await;

        conn.begin_transaction().await.unwrap();
        conn.begin_transaction().await.unwrap();
        conn.query("INSERT INTO items (name) VALUES ('a')", &[])
            .await
            .unwrap();
        conn.commit().await.unwrap();

        assert_eq!(count(&conn).await, 1);
    }

    #[tokio::test]
    async fn test_commit_and_rollback_without_transaction() {
        let conn = SqliteConnection::open_in_memory().unwrap();

        conn.commit().await.unwrap();
        conn.rollback().await.unwrap();
        conn.abort_transaction().unwrap();
    }

    #[tokio::test]
    async fn test_abort_discards_open_transaction() {
        let conn = memory_with_table().await;
        conn.begin_transaction().await.unwrap();
        conn.query("INSERT INTO items (name) VALUES ('a')", &[])
            .await
            .unwrap();

        conn.abort_transaction().unwrap();

        assert!(!conn.in_transaction());
        assert_eq!(count(&conn).await, 0);
    }

    #[test]
    fn test_settings() {
        let conn = SqliteConnection::open_in_memory()
            .unwrap()
            .with_settings(ConnectionSettings {
                auto_commit: false,
                strict_error: true,
            });

        assert!(!conn.auto_commit());
        assert!(conn.strict_error());

        conn.apply_settings(ConnectionSettings::default()).unwrap();
        assert_eq!(conn.settings(), ConnectionSettings::default());
    }
}

mod lifecycle_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let path = path.to_str().unwrap();

        let conn = SqliteConnection::open(path).unwrap();
        assert_eq!(conn.path(), path);
        let mode = conn.query("PRAGMA journal_mode", &[]).await.unwrap();
        assert_eq!(mode.scalar(), Some(&Value::from("wal")));
        conn.query("CREATE TABLE t (a)", &[]).await.unwrap();
        conn.query("INSERT INTO t VALUES (1)", &[]).await.unwrap();
        conn.close().await.unwrap();

        let reopened = SqliteConnection::open(path).unwrap();
        let rows = reopened.query("SELECT a FROM t", &[]).await.unwrap();
        assert_eq!(rows.scalar(), Some(&Value::Int64(1)));
    }

    #[test]
    fn test_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("data.db");

        let err = SqliteConnection::open(path.to_str().unwrap()).unwrap_err();

        assert!(matches!(err, MultisqlError::Connection(_)));
    }

    #[test]
    fn test_memory_path() {
        let conn = SqliteConnection::open(":memory:").unwrap();
        assert_eq!(conn.path(), ":memory:");
        assert_eq!(conn.driver_name(), "sqlite");
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_statements() {
        let conn = SqliteConnection::open_in_memory().unwrap();

        conn.close().await.unwrap();
        conn.close().await.unwrap();

        assert!(conn.is_closed());
        let err = conn.query("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, MultisqlError::Connection(_)));
    }
}
