//! SQLite connection for multisql

mod connection;
#[cfg(test)]
mod tests;

pub use connection::{MAX_ROWS_ATTRIBUTE, SqliteConnection};
