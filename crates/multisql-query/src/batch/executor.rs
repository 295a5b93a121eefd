//! Batch executor implementation
//!
//! Runs the statements of a batch strictly in order on one connection,
//! either inside a single transaction that is rolled back on the first
//! failure, or under the connection's own commit policy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use multisql_core::{
    Connection, ConnectionSettings, ErrorInfo, QueryResult, StatementAttributes, StatementResult,
};
use serde::{Deserialize, Serialize};

use super::SettingsGuard;
use crate::parameters::{BindError, BindGroup, BindValues, bind};
use crate::splitter::{SplitterOptions, Statement, StatementSplitter};
use crate::{BatchError, StatementExecutionFailure};

/// Configuration options for batch execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Run the batch in one transaction and undo it on the first failure
    pub rollback: bool,
    /// How raw SQL text is split into statements
    pub splitter: SplitterOptions,
}

impl BatchOptions {
    /// Create new batch options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable transactional rollback
    pub fn with_rollback(mut self, rollback: bool) -> Self {
        self.rollback = rollback;
        self
    }

    /// Set the splitter configuration
    pub fn with_splitter(mut self, splitter: SplitterOptions) -> Self {
        self.splitter = splitter;
        self
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            rollback: true,
            splitter: SplitterOptions::default(),
        }
    }
}

/// What the caller hands to the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchInput {
    /// SQL text to be split
    RawText(String),
    /// Statements already split, without placeholder counts
    Split(Vec<String>),
    /// Statements already split, with one placeholder count per statement
    SplitWithPlaceholders {
        statements: Vec<String>,
        counts: Vec<usize>,
    },
    /// Prepared statements, e.g. from [`crate::split_with_placeholders`]
    Statements(Vec<Statement>),
}

impl From<&str> for BatchInput {
    fn from(text: &str) -> Self {
        BatchInput::RawText(text.to_string())
    }
}

impl From<String> for BatchInput {
    fn from(text: String) -> Self {
        BatchInput::RawText(text)
    }
}

impl From<Vec<String>> for BatchInput {
    fn from(statements: Vec<String>) -> Self {
        BatchInput::Split(statements)
    }
}

impl From<Vec<Statement>> for BatchInput {
    fn from(statements: Vec<Statement>) -> Self {
        BatchInput::Statements(statements)
    }
}

/// Terminal state of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchState {
    /// Every statement succeeded and the transaction was committed
    Committed,
    /// A statement failed and the transaction was rolled back
    RolledBack,
    /// Every statement succeeded without a batch transaction
    Completed,
    /// A statement failed without a batch transaction; earlier statements
    /// were kept under the connection's commit policy
    StoppedOnFailure,
}

/// Result of one statement that succeeded
#[derive(Debug, Clone)]
pub struct StatementOutcome {
    /// Index of this statement in the batch (0-based)
    pub index: usize,
    /// The SQL that was executed
    pub sql: String,
    /// What the connection returned
    pub result: StatementResult,
    /// Execution time for this statement
    pub execution_time: Duration,
}

impl StatementOutcome {
    /// Rows returned, if the statement was a query
    pub fn query_result(&self) -> Option<&QueryResult> {
        self.result.result.as_ref()
    }

    pub fn affected_rows(&self) -> u64 {
        self.result.affected_rows
    }
}

/// Result of a batch
#[derive(Debug, Clone)]
pub struct BatchResult {
    outcomes: Vec<StatementOutcome>,
    state: BatchState,
    failure: Option<StatementExecutionFailure>,
    total_execution_time: Duration,
}

impl BatchResult {
    fn finished(
        outcomes: Vec<StatementOutcome>,
        state: BatchState,
        failure: Option<StatementExecutionFailure>,
        started: Instant,
    ) -> Self {
        Self {
            outcomes,
            state,
            failure,
            total_execution_time: started.elapsed(),
        }
    }

    /// Outcomes of the statements that succeeded, in order.
    ///
    /// Empty after a rollback.
    pub fn outcomes(&self) -> &[StatementOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<StatementOutcome> {
        self.outcomes
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// The statement that stopped the batch
    pub fn failure(&self) -> Option<&StatementExecutionFailure> {
        self.failure.as_ref()
    }

    /// Check if all statements executed successfully
    pub fn success(&self) -> bool {
        matches!(self.state, BatchState::Committed | BatchState::Completed)
    }

    pub fn total_execution_time(&self) -> Duration {
        self.total_execution_time
    }

    /// Get the total number of rows affected across all statements
    pub fn total_affected_rows(&self) -> u64 {
        self.outcomes.iter().map(StatementOutcome::affected_rows).sum()
    }
}

/// Executes batches of SQL statements on one connection.
///
/// The executor is immutable: the `with_*` methods return a changed copy.
#[derive(Clone)]
pub struct BatchExecutor {
    connection: Arc<dyn Connection>,
    options: BatchOptions,
}

impl BatchExecutor {
    /// Create a new batch executor with the given options
    pub fn new(connection: Arc<dyn Connection>, options: BatchOptions) -> Self {
        Self {
            connection,
            options,
        }
    }

    /// Create a batch executor with default options
    pub fn with_defaults(connection: Arc<dyn Connection>) -> Self {
        Self::new(connection, BatchOptions::default())
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Get the current options
    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn rollback(&self) -> bool {
        self.options.rollback
    }

    pub fn splitter_options(&self) -> &SplitterOptions {
        &self.options.splitter
    }

    /// Same options, different connection
    pub fn with_connection(&self, connection: Arc<dyn Connection>) -> Self {
        Self::new(connection, self.options.clone())
    }

    pub fn with_rollback(&self, rollback: bool) -> Self {
        Self::new(
            self.connection.clone(),
            self.options.clone().with_rollback(rollback),
        )
    }

    pub fn with_splitter_options(&self, splitter: SplitterOptions) -> Self {
        Self::new(
            self.connection.clone(),
            self.options.clone().with_splitter(splitter),
        )
    }

    /// Execute a batch.
    ///
    /// Split and bind errors are returned before anything reaches the
    /// connection. A statement failure ends the batch: with rollback enabled
    /// the transaction is undone and a [`BatchState::RolledBack`] result is
    /// returned; without it, a [`BatchState::StoppedOnFailure`] result is
    /// returned unless the connection raises errors, in which case the
    /// failure is returned as [`BatchError::StatementExecution`].
    pub async fn execute(
        &self,
        input: impl Into<BatchInput>,
        attrs: &StatementAttributes,
        binds: BindValues,
    ) -> Result<BatchResult, BatchError> {
        let started = Instant::now();
        let statements = self.resolve(input.into(), &binds)?;
        let groups = bind(&statements, binds)?;

        if statements.is_empty() {
            tracing::debug!("empty batch");
            return Ok(BatchResult::finished(
                Vec::new(),
                BatchState::Completed,
                None,
                started,
            ));
        }

        tracing::info!(
            driver = self.connection.driver_name(),
            statements = statements.len(),
            rollback = self.options.rollback,
            "executing batch"
        );

        if self.options.rollback {
            self.execute_transactional(&statements, &groups, attrs, started)
                .await
        } else {
            self.execute_sequential(&statements, &groups, attrs, started)
                .await
        }
    }

    /// Execute a batch and report only whether every statement succeeded.
    ///
    /// Statement failures, raised or returned, become `Ok(false)`; split,
    /// bind and connection errors are still returned.
    pub async fn execute_succeeded(
        &self,
        input: impl Into<BatchInput>,
        attrs: &StatementAttributes,
        binds: BindValues,
    ) -> Result<bool, BatchError> {
        match self.execute(input, attrs, binds).await {
            Ok(result) => Ok(result.success()),
            Err(e) if e.is_execution_failure() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn resolve(&self, input: BatchInput, binds: &BindValues) -> Result<Vec<Statement>, BatchError> {
        let statements = match input {
            BatchInput::RawText(text) => {
                let splitter = StatementSplitter::new(self.options.splitter.clone());
                if binds.is_flat() {
                    splitter.split_with_placeholders(&text)?
                } else {
                    splitter.split_statements(&text)?
                }
            }
            BatchInput::Split(statements) => statements.into_iter().map(Statement::new).collect(),
            BatchInput::SplitWithPlaceholders { statements, counts } => {
                if statements.len() != counts.len() {
                    return Err(BindError::PlaceholderCountsMismatch {
                        statements: statements.len(),
                        counts: counts.len(),
                    }
                    .into());
                }
                statements
                    .into_iter()
                    .zip(counts)
                    .map(|(text, count)| Statement::new(text).with_placeholder_count(count))
                    .collect()
            }
            BatchInput::Statements(statements) => statements,
        };
        Ok(statements)
    }

    /// Idle -> TransactionOpen -> Committed | RolledBack
    async fn execute_transactional(
        &self,
        statements: &[Statement],
        groups: &[BindGroup],
        attrs: &StatementAttributes,
        started: Instant,
    ) -> Result<BatchResult, BatchError> {
        let mut guard = SettingsGuard::apply(
            self.connection.as_ref(),
            ConnectionSettings {
                auto_commit: false,
                strict_error: true,
            },
        )
        .map_err(BatchError::Connection)?;

        self.connection
            .begin_transaction()
            .await
            .map_err(BatchError::Connection)?;
        guard.set_transaction_open(true);

        let mut outcomes = Vec::with_capacity(statements.len());
        for (index, (statement, group)) in statements.iter().zip(groups).enumerate() {
            match self.run_statement(index, statement, group, attrs).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(failure) => {
                    tracing::warn!(
                        index,
                        error = %failure.error,
                        "statement failed, rolling back batch"
                    );
                    if let Err(source) = self.connection.rollback().await {
                        return Err(BatchError::RollbackFailed { failure, source });
                    }
                    guard.set_transaction_open(false);
                    return Ok(BatchResult::finished(
                        Vec::new(),
                        BatchState::RolledBack,
                        Some(failure),
                        started,
                    ));
                }
            }
        }

        if let Err(e) = self.connection.commit().await {
            tracing::warn!(error = %e, "commit failed, rolling back batch");
            if self.connection.rollback().await.is_ok() {
                guard.set_transaction_open(false);
            }
            return Err(BatchError::Connection(e));
        }
        guard.set_transaction_open(false);

        tracing::debug!(statements = outcomes.len(), "batch committed");
        Ok(BatchResult::finished(
            outcomes,
            BatchState::Committed,
            None,
            started,
        ))
    }

    /// Idle -> Running -> Completed | StoppedOnFailure
    async fn execute_sequential(
        &self,
        statements: &[Statement],
        groups: &[BindGroup],
        attrs: &StatementAttributes,
        started: Instant,
    ) -> Result<BatchResult, BatchError> {
        let mut outcomes = Vec::with_capacity(statements.len());
        for (index, (statement, group)) in statements.iter().zip(groups).enumerate() {
            match self.run_statement(index, statement, group, attrs).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(failure) => {
                    tracing::warn!(
                        index,
                        executed = outcomes.len(),
                        error = %failure.error,
                        "statement failed, stopping batch"
                    );
                    if self.connection.strict_error() {
                        return Err(BatchError::StatementExecution(failure));
                    }
                    return Ok(BatchResult::finished(
                        outcomes,
                        BatchState::StoppedOnFailure,
                        Some(failure),
                        started,
                    ));
                }
            }
        }

        Ok(BatchResult::finished(
            outcomes,
            BatchState::Completed,
            None,
            started,
        ))
    }

    async fn run_statement(
        &self,
        index: usize,
        statement: &Statement,
        group: &BindGroup,
        attrs: &StatementAttributes,
    ) -> Result<StatementOutcome, StatementExecutionFailure> {
        let sql = statement.text();
        tracing::debug!(
            index,
            sql_preview = %sql.chars().take(100).collect::<String>(),
            params = group.len(),
            "executing statement"
        );

        let start = Instant::now();
        match self.connection.execute(sql, attrs, group.values()).await {
            Ok(result) => Ok(StatementOutcome {
                index,
                sql: sql.to_string(),
                result,
                execution_time: start.elapsed(),
            }),
            Err(e) => {
                let error = self
                    .connection
                    .error_info()
                    .unwrap_or_else(|| ErrorInfo::new(e.to_string()));
                Err(StatementExecutionFailure {
                    index,
                    sql: sql.to_string(),
                    error,
                })
            }
        }
    }
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("driver", &self.connection.driver_name())
            .field("options", &self.options)
            .finish()
    }
}

/// Execute a batch on `connection` with default splitter options.
///
/// Shorthand for building a [`BatchExecutor`] for a single call.
pub async fn execute_batch(
    connection: Arc<dyn Connection>,
    input: impl Into<BatchInput>,
    attrs: &StatementAttributes,
    binds: BindValues,
    rollback: bool,
) -> Result<BatchResult, BatchError> {
    BatchExecutor::new(connection, BatchOptions::default().with_rollback(rollback))
        .execute(input, attrs, binds)
        .await
}
