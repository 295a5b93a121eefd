//! multisql core - Connection abstraction shared by the batch executor and drivers
//!
//! This crate defines the pieces every other multisql crate depends on:
//!
//! - `Connection` - Trait for a connection that executes one statement per call
//! - `ConnectionSettings` - The auto-commit / strict-error pair a batch may override
//! - `StatementAttributes` - Per-statement execution attributes passed through to drivers
//! - Common types like `Value`, `Row`, `StatementResult`

mod connection;
mod error;
mod types;

pub use connection::*;
pub use error::*;
pub use types::*;
