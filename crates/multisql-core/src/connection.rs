//! Connection trait and the settings a batch may temporarily override

use crate::{Result, StatementResult, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Auto-commit and strict-error settings of a connection.
///
/// `strict_error` means a failing statement is raised to the caller as an
/// error instead of being reported as a failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Every statement is committed as soon as it succeeds
    pub auto_commit: bool,
    /// Statement failures propagate as errors
    pub strict_error: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            auto_commit: true,
            strict_error: false,
        }
    }
}

/// Detail about the last failure reported by a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Driver specific error code (if available)
    pub code: Option<String>,
    /// Human readable message
    pub message: String,
}

impl ErrorInfo {
    /// Create error info without a code
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Attach a driver error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "[{}] {}", code, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Execution attributes handed unchanged to every statement of a batch.
///
/// Drivers interpret the keys they know and ignore the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementAttributes {
    entries: BTreeMap<String, Value>,
}

impl StatementAttributes {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an attribute
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate attributes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A database connection that executes exactly one statement per call
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Execute a single statement with its bound values
    async fn execute(
        &self,
        sql: &str,
        attrs: &StatementAttributes,
        params: &[Value],
    ) -> Result<StatementResult>;

    /// Begin a transaction. A no-op if one is already open.
    async fn begin_transaction(&self) -> Result<()>;

    /// Commit the open transaction
    async fn commit(&self) -> Result<()>;

    /// Roll back the open transaction
    async fn rollback(&self) -> Result<()>;

    /// Roll back any open transaction without awaiting.
    ///
    /// Used when a batch is dropped or panics mid-transaction, where an
    /// async rollback can no longer run. A no-op without an open transaction.
    fn abort_transaction(&self) -> Result<()>;

    fn auto_commit(&self) -> bool;

    /// Change auto-commit. Turning it on commits any open transaction.
    fn set_auto_commit(&self, enabled: bool) -> Result<()>;

    fn strict_error(&self) -> bool;

    fn set_strict_error(&self, enabled: bool);

    /// Detail of the most recent failure, if any
    fn error_info(&self) -> Option<ErrorInfo>;

    /// Snapshot of the current settings
    fn settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            auto_commit: self.auto_commit(),
            strict_error: self.strict_error(),
        }
    }

    /// Apply both settings, auto-commit first
    fn apply_settings(&self, settings: ConnectionSettings) -> Result<()> {
        tracing::trace!(
            auto_commit = settings.auto_commit,
            strict_error = settings.strict_error,
            "applying connection settings"
        );
        self.set_auto_commit(settings.auto_commit)?;
        self.set_strict_error(settings.strict_error);
        Ok(())
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
