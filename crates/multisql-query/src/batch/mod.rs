//! Batch execution module
//!
//! This module runs the statements of a batch one by one on a single
//! connection. With rollback enabled the whole batch is one transaction and
//! the connection's auto-commit and strict-error settings are overridden for
//! the duration of the call.

mod executor;
mod settings;

pub use executor::{
    BatchExecutor, BatchInput, BatchOptions, BatchResult, BatchState, StatementOutcome,
    execute_batch,
};
pub use settings::SettingsGuard;
