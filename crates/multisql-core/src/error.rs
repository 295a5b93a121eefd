//! Error types for multisql

use thiserror::Error;

/// Core error type for connection-level operations
#[derive(Error, Debug)]
pub enum MultisqlError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for connection-level operations
pub type Result<T> = std::result::Result<T, MultisqlError>;
