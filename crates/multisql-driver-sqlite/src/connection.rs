//! SQLite connection implementation

use async_trait::async_trait;
use multisql_core::{
    Connection, ConnectionSettings, ErrorInfo, MultisqlError, QueryResult, Result, Row,
    StatementAttributes, StatementResult, Value,
};
use parking_lot::Mutex;
use rusqlite::{Batch, Connection as RusqliteConnection, OpenFlags, ffi};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Statement attribute capping the number of rows a query collects
pub const MAX_ROWS_ATTRIBUTE: &str = "max_rows";

/// SQLite connection wrapper.
///
/// Runs exactly one statement per [`Connection::execute`] call. With
/// auto-commit off, the first statement opens a deferred transaction that
/// stays open until `commit`, `rollback` or auto-commit is turned back on.
pub struct SqliteConnection {
    conn: Mutex<Option<RusqliteConnection>>,
    settings: Mutex<ConnectionSettings>,
    last_error: Mutex<Option<ErrorInfo>>,
    path: String,
}

impl SqliteConnection {
    /// Open a SQLite database file, creating it if needed
    pub fn open(path: &str) -> Result<Self> {
        if path == ":memory:" {
            return Self::open_in_memory();
        }

        tracing::info!(path = %path, "opening SQLite database");
        let expanded_path = expand_path(path)?;

        if !expanded_path.starts_with("file:")
            && let Some(parent) = Path::new(&expanded_path).parent()
            && !parent.exists()
        {
            return Err(MultisqlError::Connection(format!(
                "Parent directory does not exist: {}",
                parent.display()
            )));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
            MultisqlError::Connection(format!(
                "Failed to open SQLite database at '{}': {}",
                expanded_path, e
            ))
        })?;

        enable_foreign_keys(&conn)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| MultisqlError::Connection(format!("Failed to set journal mode: {}", e)))?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(|e| {
            MultisqlError::Connection(format!("Failed to set synchronous mode: {}", e))
        })?;

        tracing::info!(path = %expanded_path, "SQLite database connection established");
        Ok(Self::from_rusqlite(conn, expanded_path))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        tracing::info!("opening in-memory SQLite database");
        let conn = RusqliteConnection::open_in_memory().map_err(|e| {
            MultisqlError::Connection(format!("Failed to open in-memory database: {}", e))
        })?;
        enable_foreign_keys(&conn)?;
        Ok(Self::from_rusqlite(conn, ":memory:".to_string()))
    }

    fn from_rusqlite(conn: RusqliteConnection, path: String) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
            settings: Mutex::new(ConnectionSettings::default()),
            last_error: Mutex::new(None),
            path,
        }
    }

    /// Start from the given settings instead of the defaults
    pub fn with_settings(self, settings: ConnectionSettings) -> Self {
        *self.settings.lock() = settings;
        self
    }

    /// Resolved database path, or `:memory:`
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a transaction is currently open on the connection
    pub fn in_transaction(&self) -> bool {
        self.with_conn(|conn| Ok(!conn.is_autocommit()))
            .unwrap_or(false)
    }

    /// Run a statement and return its rows, or an empty result for
    /// statements that produce none
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let result = self.execute(sql, &StatementAttributes::new(), params).await?;
        Ok(result.result.unwrap_or_else(QueryResult::empty))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&RusqliteConnection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| MultisqlError::Connection("SQLite connection is closed".into()))?;
        f(conn)
    }

    /// Issue COMMIT or ROLLBACK if a transaction is open
    fn finish_transaction(&self, command: &str) -> Result<()> {
        self.with_conn(|conn| {
            if conn.is_autocommit() {
                tracing::trace!(command, "no open transaction");
                return Ok(());
            }
            conn.execute_batch(command).map_err(|e| {
                MultisqlError::Transaction(format!("Failed to {} transaction: {}", command, e))
            })
        })
    }

    fn record_error(&self, error: &rusqlite::Error) -> ErrorInfo {
        let info = ErrorInfo::new(error.to_string()).with_code(error_code(error).to_string());
        *self.last_error.lock() = Some(info.clone());
        info
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql, attrs, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(
        &self,
        sql: &str,
        attrs: &StatementAttributes,
        params: &[Value],
    ) -> Result<StatementResult> {
        let max_rows = attrs
            .get(MAX_ROWS_ATTRIBUTE)
            .and_then(Value::as_i64)
            .and_then(|n| usize::try_from(n).ok());
        let auto_commit = self.auto_commit();
        *self.last_error.lock() = None;

        self.with_conn(|conn| {
            if !auto_commit && conn.is_autocommit() {
                tracing::debug!("auto-commit off, opening implicit transaction");
                conn.execute_batch("BEGIN DEFERRED").map_err(|e| {
                    let info = self.record_error(&e);
                    MultisqlError::Transaction(format!("Failed to begin transaction: {}", info))
                })?;
            }

            run_statement(conn, sql, params, max_rows).map_err(|e| {
                let info = self.record_error(&e);
                tracing::debug!(error = %info, "statement failed");
                MultisqlError::Query(format!("Failed to execute statement: {}", e))
            })
        })
    }

    async fn begin_transaction(&self) -> Result<()> {
        tracing::debug!("beginning SQLite transaction");
        self.with_conn(|conn| {
            if !conn.is_autocommit() {
                tracing::debug!("transaction already open");
                return Ok(());
            }
            // DEFERRED takes the write lock on the first write
            conn.execute_batch("BEGIN DEFERRED").map_err(|e| {
                MultisqlError::Transaction(format!("Failed to begin transaction: {}", e))
            })
        })
    }

    async fn commit(&self) -> Result<()> {
        tracing::debug!("committing SQLite transaction");
        self.finish_transaction("COMMIT")
    }

    async fn rollback(&self) -> Result<()> {
        tracing::debug!("rolling back SQLite transaction");
        self.finish_transaction("ROLLBACK")
    }

    fn abort_transaction(&self) -> Result<()> {
        if self.in_transaction() {
            tracing::warn!("aborting open SQLite transaction");
        }
        self.finish_transaction("ROLLBACK")
    }

    fn auto_commit(&self) -> bool {
        self.settings.lock().auto_commit
    }

    fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.finish_transaction("COMMIT")?;
        }
        self.settings.lock().auto_commit = enabled;
        Ok(())
    }

    fn strict_error(&self) -> bool {
        self.settings.lock().strict_error
    }

    fn set_strict_error(&self, enabled: bool) {
        self.settings.lock().strict_error = enabled;
    }

    fn error_info(&self) -> Option<ErrorInfo> {
        self.last_error.lock().clone()
    }

    async fn close(&self) -> Result<()> {
        tracing::info!(path = %self.path, "closing SQLite connection");
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| {
            MultisqlError::Connection(format!("Failed to close SQLite connection: {}", e))
        })
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("settings", &*self.settings.lock())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn enable_foreign_keys(conn: &RusqliteConnection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| MultisqlError::Connection(format!("Failed to enable foreign keys: {}", e)))
}

/// Expand `~/` and make relative paths absolute
fn expand_path(path: &str) -> Result<String> {
    if path.starts_with("file:") {
        return Ok(path.to_string());
    }

    let expanded = if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var_os("HOME").ok_or_else(|| {
            MultisqlError::Configuration("Unable to determine HOME directory".into())
        })?;
        PathBuf::from(home).join(rest)
    } else if path.starts_with('~') {
        return Err(MultisqlError::Configuration(
            "User-specific home directories (~user) are not supported".into(),
        ));
    } else {
        PathBuf::from(path)
    };

    let absolute = if expanded.is_relative() {
        std::env::current_dir()?.join(expanded)
    } else {
        expanded
    };
    Ok(absolute.to_string_lossy().to_string())
}

/// SQLite result code for a driver error.
///
/// Engine failures keep their extended code; errors raised by rusqlite
/// itself map onto the closest primary code.
fn error_code(error: &rusqlite::Error) -> i32 {
    use rusqlite::Error;

    match error {
        Error::SqliteFailure(failure, _) => failure.extended_code,
        Error::InvalidParameterCount(..)
        | Error::InvalidParameterName(_)
        | Error::InvalidColumnIndex(_) => ffi::SQLITE_RANGE,
        Error::InvalidColumnName(_)
        | Error::InvalidColumnType(..)
        | Error::FromSqlConversionFailure(..)
        | Error::ToSqlConversionFailure(_)
        | Error::IntegralValueOutOfRange(..) => ffi::SQLITE_MISMATCH,
        _ => ffi::SQLITE_ERROR,
    }
}

fn multiple_statements_error() -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        ffi::Error::new(ffi::SQLITE_MISUSE),
        Some("multiple statements provided; execute one statement per call".to_string()),
    )
}

/// Zero-based value position for a `$n` parameter name
fn numbered_position(name: &str) -> Option<usize> {
    name.strip_prefix('$')?.parse::<usize>().ok()?.checked_sub(1)
}

/// Bind `params` to the statement's parameters.
///
/// SQLite numbers `$n` parameters by first appearance, so each one is bound
/// to value `n` by name. Every other parameter takes the value at its own
/// position. The values must cover exactly the highest position used.
fn bind_parameters(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[Value],
) -> rusqlite::Result<()> {
    let positions: Vec<usize> = (1..=stmt.parameter_count())
        .map(|idx| {
            stmt.parameter_name(idx)
                .and_then(numbered_position)
                .unwrap_or(idx - 1)
        })
        .collect();

    let needed = positions.iter().max().map_or(0, |max| max + 1);
    if params.len() != needed {
        return Err(rusqlite::Error::InvalidParameterCount(params.len(), needed));
    }

    for (idx, position) in positions.into_iter().enumerate() {
        stmt.raw_bind_parameter(idx + 1, value_to_rusqlite(&params[position]))?;
    }
    Ok(())
}

/// Prepare and run one statement, collecting rows when it has result columns
fn run_statement(
    conn: &RusqliteConnection,
    sql: &str,
    params: &[Value],
    max_rows: Option<usize>,
) -> rusqlite::Result<StatementResult> {
    let start_time = Instant::now();
    let mut batch = Batch::new(conn, sql);
    let Some(mut stmt) = batch.next()? else {
        tracing::debug!("no statement to execute");
        return Ok(StatementResult::affected(0));
    };
    if batch.next()?.is_some() {
        return Err(multiple_statements_error());
    }
    bind_parameters(&mut stmt, params)?;

    if stmt.column_count() == 0 {
        let affected = stmt.raw_execute()?;
        tracing::debug!(affected_rows = affected, "statement executed");
        return Ok(StatementResult::affected(affected as u64));
    }

    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    let mut query_rows = stmt.raw_query();
    while let Some(row) = query_rows.next()? {
        if max_rows.is_some_and(|max| rows.len() >= max) {
            break;
        }
        let values = (0..columns.len())
            .map(|idx| row.get_ref(idx).map(rusqlite_to_value))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.push(Row::new(columns.clone(), values));
    }

    let execution_time_ms = start_time.elapsed().as_millis() as u64;
    tracing::debug!(
        row_count = rows.len(),
        execution_time_ms,
        "query executed"
    );
    Ok(StatementResult::rows(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        execution_time_ms,
    }))
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;

    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Int32(i) => Sql::Integer(i64::from(*i)),
        Value::Int64(i) => Sql::Integer(*i),
        Value::Float64(f) => Sql::Real(*f),
        Value::Decimal(d) => Sql::Text(d.clone()),
        Value::String(s) => Sql::Text(s.clone()),
        Value::Bytes(b) => Sql::Blob(b.clone()),
        Value::Uuid(u) => Sql::Text(u.to_string()),
        Value::Date(d) => Sql::Text(d.to_string()),
        Value::Time(t) => Sql::Text(t.to_string()),
        Value::DateTime(dt) => Sql::Text(dt.to_string()),
        Value::DateTimeUtc(dt) => Sql::Text(dt.to_rfc3339()),
        Value::Json(j) => Sql::Text(j.to_string()),
    }
}

fn rusqlite_to_value(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;

    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}
