//! Placeholder detection and bind value partitioning
//!
//! Each statement of a batch uses at most one placeholder style:
//!
//! - Positional: `?`
//! - Numbered: `$1`, `$2`
//! - Named: `:name`
//!
//! Bind values arrive either grouped per statement or as one flat list that
//! is cut into groups by each statement's placeholder count.
//!
//! # Example
//!
//! ```
//! use multisql_core::Value;
//! use multisql_query::parameters::{BindValues, bind};
//! use multisql_query::splitter::{SplitterOptions, split_with_placeholders};
//!
//! let statements = split_with_placeholders(
//!     "INSERT INTO t VALUES (?, ?); DELETE FROM t WHERE a = ?",
//!     &SplitterOptions::default(),
//! )
//! .unwrap();
//! let values = (1..=3).map(Value::Int64).collect();
//! let groups = bind(&statements, BindValues::Flat(values)).unwrap();
//! assert_eq!(groups[0].len(), 2);
//! assert_eq!(groups[1].values(), &[Value::Int64(3)]);
//! ```

pub mod binder;
mod extractor;

pub use binder::{BindError, BindGroup, BindResult, BindValues, bind};
pub use extractor::{PlaceholderKind, Placeholders, extract_placeholders};

#[cfg(test)]
mod tests;
