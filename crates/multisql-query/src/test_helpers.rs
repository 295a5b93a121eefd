//! Recording connection for executor tests
//!
//! `MockConnection` keeps every statement it runs and models commit
//! semantics closely enough to tell durable writes from rolled-back ones:
//! statements run while a transaction is open stay pending until commit.

use async_trait::async_trait;
use multisql_core::{
    Connection, ConnectionSettings, ErrorInfo, MultisqlError, QueryResult, Result,
    StatementAttributes, StatementResult, Value,
};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct MockState {
    settings: ConnectionSettings,
    in_transaction: bool,
    executed: Vec<(String, Vec<Value>)>,
    attributes: Vec<StatementAttributes>,
    pending: Vec<String>,
    durable: Vec<String>,
    calls: Vec<&'static str>,
    settings_history: Vec<ConnectionSettings>,
    last_error: Option<ErrorInfo>,
    fail_on: Option<String>,
    fail_commit: bool,
    fail_rollback: bool,
    fail_begin: bool,
    panic_on: Option<String>,
    stall_on: Option<String>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct MockConnection {
    state: Mutex<MockState>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: ConnectionSettings) -> Self {
        let conn = Self::new();
        conn.state.lock().settings = settings;
        conn
    }

    /// Fail any statement containing `needle`
    pub fn failing_on(self, needle: &str) -> Self {
        self.state.lock().fail_on = Some(needle.to_string());
        self
    }

    /// Panic inside `execute` for any statement containing `needle`
    pub fn panicking_on(self, needle: &str) -> Self {
        self.state.lock().panic_on = Some(needle.to_string());
        self
    }

    /// Never finish executing any statement containing `needle`
    pub fn stalling_on(self, needle: &str) -> Self {
        self.state.lock().stall_on = Some(needle.to_string());
        self
    }

    pub fn failing_commit(self) -> Self {
        self.state.lock().fail_commit = true;
        self
    }

    pub fn failing_rollback(self) -> Self {
        self.state.lock().fail_rollback = true;
        self
    }

    pub fn failing_begin(self) -> Self {
        self.state.lock().fail_begin = true;
        self
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.state
            .lock()
            .executed
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn executed_params(&self) -> Vec<Vec<Value>> {
        self.state
            .lock()
            .executed
            .iter()
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn attributes_seen(&self) -> Vec<StatementAttributes> {
        self.state.lock().attributes.clone()
    }

    /// Statements whose effects were committed
    pub fn durable(&self) -> Vec<String> {
        self.state.lock().durable.clone()
    }

    /// Transaction control calls in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    /// Every settings change applied through `set_auto_commit` /
    /// `set_strict_error`, as the full settings after the change
    pub fn settings_history(&self) -> Vec<ConnectionSettings> {
        self.state.lock().settings_history.clone()
    }

    fn commit_pending(state: &mut MockState) {
        let pending = std::mem::take(&mut state.pending);
        state.durable.extend(pending);
        state.in_transaction = false;
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(
        &self,
        sql: &str,
        attrs: &StatementAttributes,
        params: &[Value],
    ) -> Result<StatementResult> {
        let stall = {
            let state = self.state.lock();
            state
                .stall_on
                .as_ref()
                .is_some_and(|needle| sql.contains(needle.as_str()))
        };
        if stall {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        if let Some(needle) = &state.panic_on
            && sql.contains(needle.as_str())
        {
            let message = format!("mock panic on {sql}");
            drop(state);
            panic!("{message}");
        }

        state.executed.push((sql.to_string(), params.to_vec()));
        state.attributes.push(attrs.clone());

        if let Some(needle) = &state.fail_on
            && sql.contains(needle.as_str())
        {
            let message = format!("mock failure on {sql}");
            state.last_error = Some(ErrorInfo::new(message.clone()).with_code("MOCK"));
            return Err(MultisqlError::Query(message));
        }

        if state.settings.auto_commit && !state.in_transaction {
            state.durable.push(sql.to_string());
        } else {
            state.in_transaction = true;
            state.pending.push(sql.to_string());
        }

        if sql.trim_start().to_ascii_uppercase().starts_with("SELECT") {
            Ok(StatementResult::rows(QueryResult::empty()))
        } else {
            Ok(StatementResult::affected(1))
        }
    }

    async fn begin_transaction(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push("begin");
        if state.fail_begin {
            return Err(MultisqlError::Transaction("mock begin failure".into()));
        }
        state.in_transaction = true;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push("commit");
        if state.fail_commit {
            return Err(MultisqlError::Transaction("mock commit failure".into()));
        }
        Self::commit_pending(&mut state);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push("rollback");
        if state.fail_rollback {
            return Err(MultisqlError::Transaction("mock rollback failure".into()));
        }
        state.pending.clear();
        state.in_transaction = false;
        Ok(())
    }

    fn abort_transaction(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.in_transaction {
            state.calls.push("abort");
            state.pending.clear();
            state.in_transaction = false;
        }
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.state.lock().settings.auto_commit
    }

    fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock();
        if enabled && state.in_transaction {
            Self::commit_pending(&mut state);
        }
        state.settings.auto_commit = enabled;
        let settings = state.settings;
        state.settings_history.push(settings);
        Ok(())
    }

    fn strict_error(&self) -> bool {
        self.state.lock().settings.strict_error
    }

    fn set_strict_error(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.settings.strict_error = enabled;
        let settings = state.settings;
        state.settings_history.push(settings);
    }

    fn error_info(&self) -> Option<ErrorInfo> {
        self.state.lock().last_error.clone()
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
