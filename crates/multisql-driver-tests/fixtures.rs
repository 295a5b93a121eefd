//! Test fixtures for running batches against SQLite.
//!
//! Every test gets a fresh database, either in memory or in a temporary
//! file, so cases can be parameterised with rstest:
//!
//! ```rust,ignore
//! use multisql_driver_tests::fixtures::{TestDatabase, accounts_connection};
//! use rstest::rstest;
//!
//! #[rstest]
//! #[case::memory(TestDatabase::Memory)]
//! #[case::file(TestDatabase::File)]
//! #[tokio::test]
//! async fn test_something(#[case] database: TestDatabase) -> anyhow::Result<()> {
//!     let db = accounts_connection(database).await?;
//!     assert_eq!(db.count("accounts").await?, 0);
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use multisql_core::{Connection, ConnectionSettings, StatementAttributes};
use multisql_driver_sqlite::SqliteConnection;
use multisql_query::BatchExecutor;
use std::sync::Arc;
use tempfile::TempDir;

/// Where the test database lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestDatabase {
    /// Private in-memory database
    Memory,
    /// WAL-mode database in a temporary directory
    File,
}

/// A connection plus whatever keeps its storage alive
pub struct TestConnection {
    conn: Arc<SqliteConnection>,
    _dir: Option<TempDir>,
}

impl TestConnection {
    /// The underlying SQLite connection
    pub fn conn(&self) -> &SqliteConnection {
        &self.conn
    }

    /// The connection as the trait object the executor takes
    pub fn shared(&self) -> Arc<dyn Connection> {
        self.conn.clone()
    }

    /// A batch executor with default options on this connection
    pub fn executor(&self) -> BatchExecutor {
        BatchExecutor::with_defaults(self.shared())
    }

    /// Number of rows in `table`
    pub async fn count(&self, table: &str) -> Result<i64> {
        let result = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {}", table), &[])
            .await
            .with_context(|| format!("failed to count rows in {}", table))?;
        result
            .scalar()
            .and_then(|v| v.as_i64())
            .context("count is not an integer")
    }

    /// Values of `column` in `table`, ordered by rowid
    pub async fn strings(&self, table: &str, column: &str) -> Result<Vec<String>> {
        let result = self
            .conn
            .query(
                &format!("SELECT {} FROM {} ORDER BY rowid", column, table),
                &[],
            )
            .await?;
        result
            .rows
            .iter()
            .map(|row| {
                row.get(0)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .context("expected a text column")
            })
            .collect()
    }
}

/// Open a fresh database
pub async fn test_connection(database: TestDatabase) -> Result<TestConnection> {
    initialize_logging();

    match database {
        TestDatabase::Memory => Ok(TestConnection {
            conn: Arc::new(SqliteConnection::open_in_memory()?),
            _dir: None,
        }),
        TestDatabase::File => {
            let dir = tempfile::tempdir().context("failed to create temp dir")?;
            let path = dir.path().join("multisql-test.db");
            let path = path.to_str().context("temp path is not UTF-8")?;
            let conn = SqliteConnection::open(path)?;
            Ok(TestConnection {
                conn: Arc::new(conn),
                _dir: Some(dir),
            })
        }
    }
}

/// Open a fresh database with settings other than the defaults
pub async fn test_connection_with(
    database: TestDatabase,
    settings: ConnectionSettings,
) -> Result<TestConnection> {
    let db = test_connection(database).await?;
    db.conn.apply_settings(settings)?;
    Ok(db)
}

/// Open a fresh database with an empty `accounts` table
pub async fn accounts_connection(database: TestDatabase) -> Result<TestConnection> {
    let db = test_connection(database).await?;
    create_accounts(&db).await?;
    Ok(db)
}

/// Create the `accounts` table used by most tests.
///
/// `balance` carries a CHECK constraint so tests can provoke a failure with
/// valid syntax.
pub async fn create_accounts(db: &TestConnection) -> Result<()> {
    db.conn
        .execute(
            "CREATE TABLE accounts (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                balance INTEGER NOT NULL CHECK (balance >= 0)
            )",
            &StatementAttributes::new(),
            &[],
        )
        .await
        .context("failed to create accounts table")?;
    Ok(())
}

/// Initialize logging for tests if not already initialized
fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("multisql=debug,warn"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
