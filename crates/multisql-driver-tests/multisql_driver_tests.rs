//! multisql driver test suite
//!
//! Runs the batch executor against real SQLite connections, both in memory
//! and file-backed, so that commit and rollback behaviour is checked against
//! the data that actually ends up in the database.
//!
//! # Usage
//!
//! ```bash
//! cargo test -p multisql-driver-tests
//!
//! # With executor logging
//! RUST_LOG=multisql_query=debug cargo test -p multisql-driver-tests -- --nocapture
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fixtures;

#[cfg(test)]
mod batch_tests;

#[cfg(test)]
mod settings_tests;
