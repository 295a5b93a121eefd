//! Placeholder detection
//!
//! Literals and comments are masked with the same lexical rules the splitter
//! uses, so a `?` inside `'...'` or `-- ...` never counts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::SplitError;
use crate::splitter::{LexKind, Scanner, SplitterOptions};

/// The placeholder style a statement uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceholderKind {
    /// No placeholders
    #[default]
    None,
    /// `?`
    Positional,
    /// `$1`, `$2`
    Numbered,
    /// `:name`
    Named,
}

impl std::fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaceholderKind::None => write!(f, "no"),
            PlaceholderKind::Positional => write!(f, "positional (?)"),
            PlaceholderKind::Numbered => write!(f, "numbered ($n)"),
            PlaceholderKind::Named => write!(f, "named (:name)"),
        }
    }
}

/// Placeholders found in one statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    pub kind: PlaceholderKind,
    /// Number of values the statement binds: occurrences of `?`, the highest
    /// `$n`, or the number of distinct names.
    pub count: usize,
    /// Distinct names in order of first occurrence
    pub names: Vec<String>,
}

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\?|::?[A-Za-z_][A-Za-z0-9_]*|\$[0-9]+").expect("valid regex")
});

/// Detect the placeholders of a single statement.
///
/// # Errors
///
/// `MixedPlaceholderKinds` when more than one style appears, and
/// `UnbalancedConstruct` for an unterminated literal or comment.
pub fn extract_placeholders(
    sql: &str,
    options: &SplitterOptions,
) -> Result<Placeholders, SplitError> {
    let masked = mask_literals_and_comments(sql, options)?;
    let bytes = masked.as_bytes();
    let mut found = Placeholders::default();

    for m in PLACEHOLDER_REGEX.find_iter(&masked) {
        let token = m.as_str();
        let kind = match bytes[m.start()] {
            b'?' => PlaceholderKind::Positional,
            b'$' => {
                let preceded_by_word = m
                    .start()
                    .checked_sub(1)
                    .is_some_and(|i| bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_');
                if preceded_by_word {
                    continue;
                }
                PlaceholderKind::Numbered
            }
            // `::type` casts
            _ if token.starts_with("::") => continue,
            _ => PlaceholderKind::Named,
        };

        if found.kind == PlaceholderKind::None {
            found.kind = kind;
        } else if found.kind != kind {
            return Err(SplitError::MixedPlaceholderKinds {
                statement: 0,
                first: found.kind,
                second: kind,
            });
        }

        match kind {
            PlaceholderKind::Positional => found.count += 1,
            PlaceholderKind::Numbered => {
                if let Ok(index) = token[1..].parse::<usize>() {
                    found.count = found.count.max(index);
                }
            }
            PlaceholderKind::Named => {
                let name = &token[1..];
                if !found.names.iter().any(|n| n == name) {
                    found.names.push(name.to_string());
                }
                found.count = found.names.len();
            }
            PlaceholderKind::None => {}
        }
    }

    Ok(found)
}

/// Replace literal and comment spans with spaces, keeping byte offsets
fn mask_literals_and_comments(sql: &str, options: &SplitterOptions) -> Result<String, SplitError> {
    let options = SplitterOptions {
        delimiter_keyword: None,
        strict: false,
        ..options.clone()
    };
    let mut masked = String::with_capacity(sql.len());
    for event in Scanner::new(sql, &options) {
        let event = event?;
        match event.kind {
            LexKind::Comment { .. } | LexKind::Literal { .. } => {
                masked.extend(std::iter::repeat_n(' ', event.span.len()));
            }
            _ => masked.push_str(event.text(sql)),
        }
    }
    Ok(masked)
}
