//! Splitter and batch execution errors

use multisql_core::{ErrorInfo, MultisqlError};
use thiserror::Error;

use crate::parameters::{BindError, PlaceholderKind};

/// Errors raised while scanning or splitting SQL text.
///
/// These are always reported before any statement reaches the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// End of input was reached inside an open quote, comment, dollar string
    /// or (in strict mode) `BEGIN ... END` block.
    #[error("unterminated {construct} starting at line {line} (offset {offset})")]
    UnbalancedConstruct {
        construct: &'static str,
        offset: usize,
        line: usize,
    },

    /// A statement uses more than one placeholder style.
    #[error("statement {statement} mixes {first} and {second} placeholders")]
    MixedPlaceholderKinds {
        statement: usize,
        first: PlaceholderKind,
        second: PlaceholderKind,
    },

    #[error("invalid terminator {0:?}: must be non-empty and contain no whitespace")]
    InvalidTerminator(String),

    #[error("invalid splitter options: {0}")]
    InvalidOptions(String),
}

impl SplitError {
    pub(crate) fn unbalanced(construct: &'static str, text: &str, offset: usize) -> Self {
        let line = text[..offset].bytes().filter(|b| *b == b'\n').count() + 1;
        Self::UnbalancedConstruct {
            construct,
            offset,
            line,
        }
    }

    pub(crate) fn at_statement(self, index: usize) -> Self {
        match self {
            Self::MixedPlaceholderKinds { first, second, .. } => Self::MixedPlaceholderKinds {
                statement: index,
                first,
                second,
            },
            other => other,
        }
    }
}

/// A statement the connection refused to execute
#[derive(Debug, Error, Clone, PartialEq)]
#[error("statement {index} failed: {error}")]
pub struct StatementExecutionFailure {
    /// Position of the statement in the batch (0-based)
    pub index: usize,
    /// The SQL that was sent
    pub sql: String,
    /// Error detail reported by the connection
    pub error: ErrorInfo,
}

/// Errors returned by [`crate::BatchExecutor::execute`]
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Bind(#[from] BindError),

    /// A statement failed and the connection raises errors (strict mode)
    #[error(transparent)]
    StatementExecution(#[from] StatementExecutionFailure),

    /// A statement failed and undoing the transaction failed too
    #[error("rollback after {failure} failed: {source}")]
    RollbackFailed {
        failure: StatementExecutionFailure,
        source: MultisqlError,
    },

    /// Transaction control or settings change failed
    #[error("connection error: {0}")]
    Connection(#[source] MultisqlError),
}

impl BatchError {
    /// True when the error comes from running a statement rather than from
    /// splitting or binding.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            Self::StatementExecution(_) | Self::RollbackFailed { .. }
        )
    }

    /// The failed statement, if a statement failed
    pub fn statement_failure(&self) -> Option<&StatementExecutionFailure> {
        match self {
            Self::StatementExecution(failure) | Self::RollbackFailed { failure, .. } => {
                Some(failure)
            }
            _ => None,
        }
    }
}
