//! Splitter configuration

use serde::{Deserialize, Serialize};

use crate::SplitError;

/// Which lexical constructs the scanner recognises, and how statements are
/// reported once split.
///
/// Every field has a default, so partial TOML or JSON documents deserialize
/// cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterOptions {
    /// Statement terminator in effect at the start of the text
    pub terminator: String,
    /// Keyword of the delimiter directive (`DELIMITER $$`); `None` disables it
    pub delimiter_keyword: Option<String>,
    /// `-- ...` comments
    pub line_comments: bool,
    /// `/* ... */` comments
    pub block_comments: bool,
    /// Allow `/* /* */ */`
    pub nested_block_comments: bool,
    /// `$tag$ ... $tag$` strings
    pub dollar_quotes: bool,
    /// `` `ident` `` quoting
    pub backtick_identifiers: bool,
    /// `\'` escapes inside single-quoted strings
    pub backslash_escapes: bool,
    /// Track `BEGIN ... END` and `CASE ... END` nesting
    pub begin_end_blocks: bool,
    /// An open block at end of input is an error instead of a final statement
    pub strict: bool,
    /// Leave the terminator on the end of each statement
    pub keep_terminators: bool,
    /// Leave comments in statement text
    pub keep_comments: bool,
    /// Report statements that hold no code
    pub keep_empty_statements: bool,
}

impl Default for SplitterOptions {
    fn default() -> Self {
        Self {
            terminator: ";".to_string(),
            delimiter_keyword: Some("DELIMITER".to_string()),
            line_comments: true,
            block_comments: true,
            nested_block_comments: false,
            dollar_quotes: true,
            backtick_identifiers: true,
            backslash_escapes: false,
            begin_end_blocks: true,
            strict: true,
            keep_terminators: false,
            keep_comments: true,
            keep_empty_statements: false,
        }
    }
}

impl SplitterOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a TOML document and validate them
    pub fn from_toml_str(source: &str) -> Result<Self, SplitError> {
        let options: Self =
            toml::from_str(source).map_err(|e| SplitError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Check the options before scanning
    pub fn validate(&self) -> Result<(), SplitError> {
        if !is_valid_terminator(&self.terminator) {
            return Err(SplitError::InvalidTerminator(self.terminator.clone()));
        }
        if let Some(keyword) = &self.delimiter_keyword
            && (keyword.is_empty() || !keyword.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'))
        {
            return Err(SplitError::InvalidOptions(format!(
                "delimiter keyword {keyword:?} must be a single word"
            )));
        }
        Ok(())
    }

    /// Set the initial terminator
    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = terminator.into();
        self
    }

    /// Set or disable the delimiter directive keyword
    pub fn with_delimiter_keyword(mut self, keyword: Option<&str>) -> Self {
        self.delimiter_keyword = keyword.map(str::to_string);
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_begin_end_blocks(mut self, enabled: bool) -> Self {
        self.begin_end_blocks = enabled;
        self
    }

    pub fn with_dollar_quotes(mut self, enabled: bool) -> Self {
        self.dollar_quotes = enabled;
        self
    }

    pub fn with_line_comments(mut self, enabled: bool) -> Self {
        self.line_comments = enabled;
        self
    }

    pub fn with_block_comments(mut self, enabled: bool) -> Self {
        self.block_comments = enabled;
        self
    }

    pub fn with_nested_block_comments(mut self, enabled: bool) -> Self {
        self.nested_block_comments = enabled;
        self
    }

    pub fn with_backslash_escapes(mut self, enabled: bool) -> Self {
        self.backslash_escapes = enabled;
        self
    }

    pub fn with_keep_terminators(mut self, keep: bool) -> Self {
        self.keep_terminators = keep;
        self
    }

    pub fn with_keep_comments(mut self, keep: bool) -> Self {
        self.keep_comments = keep;
        self
    }

    pub fn with_keep_empty_statements(mut self, keep: bool) -> Self {
        self.keep_empty_statements = keep;
        self
    }
}

pub(crate) fn is_valid_terminator(terminator: &str) -> bool {
    !terminator.is_empty() && !terminator.chars().any(char::is_whitespace)
}
