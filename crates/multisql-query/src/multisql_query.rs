//! multisql query - Run multi-statement SQL text over single-statement connections
//!
//! This crate provides the pieces between a blob of SQL text and a
//! [`multisql_core::Connection`]:
//!
//! - [`splitter`] - Lexical scanner and statement splitter
//! - [`parameters`] - Placeholder detection and bind value partitioning
//! - [`batch`] - Ordered, optionally transactional, batch execution

pub mod batch;
mod error;
pub mod parameters;
pub mod splitter;

#[cfg(test)]
mod test_helpers;

pub use error::{BatchError, SplitError, StatementExecutionFailure};

// Re-export splitter types
pub use splitter::{
    CommentStyle, LexEvent, LexKind, LiteralStyle, Scanner, SplitterOptions, Statement,
    StatementSplitter, split, split_statements, split_with_placeholders,
};

// Re-export placeholder types
pub use parameters::{
    BindError, BindGroup, BindResult, BindValues, PlaceholderKind, Placeholders, bind,
    extract_placeholders,
};

// Re-export batch execution types
pub use batch::{
    BatchExecutor, BatchInput, BatchOptions, BatchResult, BatchState, SettingsGuard,
    StatementOutcome, execute_batch,
};
