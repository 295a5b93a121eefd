use serde::{Deserialize, Serialize};

use crate::parameters::{PlaceholderKind, Placeholders};

/// One atomic statement of a batch.
///
/// Placeholder metadata is absent for statements the caller supplied
/// already split without counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    text: String,
    terminator: Option<String>,
    placeholder_count: Option<usize>,
    placeholder_kind: Option<PlaceholderKind>,
    placeholder_names: Vec<String>,
}

impl Statement {
    /// A statement without terminator or placeholder metadata
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            terminator: None,
            placeholder_count: None,
            placeholder_kind: None,
            placeholder_names: Vec::new(),
        }
    }

    /// Record the terminator that closed this statement
    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = Some(terminator.into());
        self
    }

    /// Attach a placeholder count whose kind is unknown
    pub fn with_placeholder_count(mut self, count: usize) -> Self {
        self.placeholder_count = Some(count);
        self
    }

    /// Attach detected placeholders
    pub fn with_placeholders(mut self, placeholders: Placeholders) -> Self {
        self.placeholder_count = Some(placeholders.count);
        self.placeholder_kind = Some(placeholders.kind);
        self.placeholder_names = placeholders.names;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// `None` for the final statement when the input did not end with a
    /// terminator
    pub fn terminator(&self) -> Option<&str> {
        self.terminator.as_deref()
    }

    pub fn placeholder_count(&self) -> Option<usize> {
        self.placeholder_count
    }

    pub fn placeholder_kind(&self) -> Option<PlaceholderKind> {
        self.placeholder_kind
    }

    /// Distinct `:name` placeholders in order of first use
    pub fn placeholder_names(&self) -> &[String] {
        &self.placeholder_names
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Statement {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Statement {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
