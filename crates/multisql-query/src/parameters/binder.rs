//! Bind value partitioning
//!
//! Turns the caller's bind values into exactly one [`BindGroup`] per
//! statement, in statement order.

use multisql_core::Value;
use thiserror::Error;

use crate::splitter::Statement;

/// Errors that can occur during parameter binding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// Flat values were supplied but a statement has no placeholder count.
    #[error("flat bind values need placeholder counts, but statement {statement_index} has none")]
    AmbiguousBind { statement_index: usize },

    /// The flat list does not match the total placeholder count.
    #[error("expected {expected} bind values, got {actual}")]
    ParameterCountMismatch { expected: usize, actual: usize },

    /// Pre-split input with a counts list of the wrong length.
    #[error("{counts} placeholder counts supplied for {statements} statements")]
    PlaceholderCountsMismatch { statements: usize, counts: usize },
}

/// Result type for parameter binding operations.
pub type BindResult<T> = Result<T, BindError>;

/// Bind values as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BindValues {
    /// No statement binds anything
    #[default]
    None,
    /// Entry `i` belongs to statement `i`. Missing entries bind nothing and
    /// extra entries are ignored.
    Grouped(Vec<Vec<Value>>),
    /// One list cut into groups by placeholder counts
    Flat(Vec<Value>),
}

impl BindValues {
    pub fn is_flat(&self) -> bool {
        matches!(self, BindValues::Flat(_))
    }
}

/// The values bound to a single statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindGroup(Vec<Value>);

impl BindGroup {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for BindGroup {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Produce one bind group per statement.
///
/// Flat values are partitioned so that statement `i` receives the slice
/// `[sum(count[..i]), sum(count[..=i]))`.
///
/// # Errors
///
/// `AmbiguousBind` when flat values meet a statement without a placeholder
/// count, and `ParameterCountMismatch` when the flat list length differs from
/// the sum of the counts.
pub fn bind(statements: &[Statement], values: BindValues) -> BindResult<Vec<BindGroup>> {
    match values {
        BindValues::None => Ok(vec![BindGroup::default(); statements.len()]),
        BindValues::Grouped(groups) => {
            if groups.len() > statements.len() {
                tracing::warn!(
                    groups = groups.len(),
                    statements = statements.len(),
                    "ignoring bind groups beyond the last statement"
                );
            }
            let mut groups = groups.into_iter();
            Ok(statements
                .iter()
                .map(|_| BindGroup(groups.next().unwrap_or_default()))
                .collect())
        }
        BindValues::Flat(values) => {
            let counts = statements
                .iter()
                .enumerate()
                .map(|(statement_index, statement)| {
                    statement
                        .placeholder_count()
                        .ok_or(BindError::AmbiguousBind { statement_index })
                })
                .collect::<BindResult<Vec<_>>>()?;

            let expected: usize = counts.iter().sum();
            if expected != values.len() {
                return Err(BindError::ParameterCountMismatch {
                    expected,
                    actual: values.len(),
                });
            }

            let mut values = values.into_iter();
            Ok(counts
                .into_iter()
                .map(|count| BindGroup(values.by_ref().take(count).collect()))
                .collect())
        }
    }
}
