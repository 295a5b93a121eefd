//! SQL statement splitting
//!
//! Splits a blob of SQL text into the atomic statements it contains. The
//! [`Scanner`] understands enough lexical structure to never split inside:
//!
//! - `--` and `/* */` comments
//! - `'strings'`, `"identifiers"` and `` `identifiers` ``
//! - `$tag$ dollar strings $tag$`
//! - `BEGIN ... END` and `CASE ... END` blocks
//!
//! A `DELIMITER` directive line may replace the terminator, as MySQL clients
//! do for stored routines.
//!
//! # Example
//!
//! ```
//! use multisql_query::splitter::{SplitterOptions, split};
//!
//! let statements = split(
//!     "CREATE TABLE t(a); INSERT INTO t VALUES ('x;y');",
//!     &SplitterOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(statements, vec!["CREATE TABLE t(a)", "INSERT INTO t VALUES ('x;y')"]);
//! ```

mod options;
mod scanner;
mod statement;


pub use options::SplitterOptions;
pub use scanner::{CommentStyle, LexEvent, LexKind, LiteralStyle, Scanner};
pub use statement::Statement;

use crate::SplitError;
use crate::parameters::extract_placeholders;

/// Splits SQL text with a fixed set of options
#[derive(Debug, Clone, Default)]
pub struct StatementSplitter {
    options: SplitterOptions,
}

impl StatementSplitter {
    pub fn new(options: SplitterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SplitterOptions {
        &self.options
    }

    /// Statement texts in source order
    pub fn split(&self, text: &str) -> Result<Vec<String>, SplitError> {
        Ok(self
            .split_statements(text)?
            .into_iter()
            .map(Statement::into_text)
            .collect())
    }

    /// Statements with their terminators, without placeholder detection
    pub fn split_statements(&self, text: &str) -> Result<Vec<Statement>, SplitError> {
        self.options.validate()?;

        let mut statements = Vec::new();
        let mut pending = String::new();
        let mut has_code = false;

        for event in Scanner::new(text, &self.options) {
            let event = event?;
            match &event.kind {
                LexKind::Terminator => {
                    self.close(&mut statements, &mut pending, has_code, Some(event.text(text)));
                    has_code = false;
                }
                LexKind::DelimiterChange { .. } => {
                    pending.clear();
                    has_code = false;
                }
                LexKind::Comment { .. } if !self.options.keep_comments => pending.push(' '),
                _ => {
                    has_code |= event.is_code(text);
                    pending.push_str(event.text(text));
                }
            }
        }

        // Unterminated tail: a final statement, or the open block in lenient mode.
        if has_code || (self.options.keep_empty_statements && !pending.trim().is_empty()) {
            self.close(&mut statements, &mut pending, has_code, None);
        }

        tracing::debug!(statements = statements.len(), "split SQL text");
        Ok(statements)
    }

    /// Statements with placeholder count, kind and names attached
    pub fn split_with_placeholders(&self, text: &str) -> Result<Vec<Statement>, SplitError> {
        self.split_statements(text)?
            .into_iter()
            .enumerate()
            .map(|(index, statement)| {
                let placeholders = extract_placeholders(statement.text(), &self.options)
                    .map_err(|e| e.at_statement(index))?;
                Ok(statement.with_placeholders(placeholders))
            })
            .collect()
    }

    fn close(
        &self,
        statements: &mut Vec<Statement>,
        pending: &mut String,
        has_code: bool,
        terminator: Option<&str>,
    ) {
        let body = std::mem::take(pending);
        if !has_code && !self.options.keep_empty_statements {
            return;
        }

        let mut text = body.trim().to_string();
        if self.options.keep_terminators
            && let Some(terminator) = terminator
        {
            text.push_str(terminator);
        }

        let statement = Statement::new(text);
        statements.push(match terminator {
            Some(terminator) => statement.with_terminator(terminator),
            None => statement,
        });
    }
}

/// Split SQL text into statement texts
pub fn split(text: &str, options: &SplitterOptions) -> Result<Vec<String>, SplitError> {
    StatementSplitter::new(options.clone()).split(text)
}

/// Split SQL text into [`Statement`]s carrying their terminators
pub fn split_statements(
    text: &str,
    options: &SplitterOptions,
) -> Result<Vec<Statement>, SplitError> {
    StatementSplitter::new(options.clone()).split_statements(text)
}

/// Split SQL text and detect the placeholders of every statement
pub fn split_with_placeholders(
    text: &str,
    options: &SplitterOptions,
) -> Result<Vec<Statement>, SplitError> {
    StatementSplitter::new(options.clone()).split_with_placeholders(text)
}
