//! Lexical scanner
//!
//! Walks SQL text once and classifies every byte into an event: plain code,
//! comments, quoted literals, block nesting transitions, terminators and
//! delimiter directives. Events are produced lazily and their spans cover
//! the input without gaps, so concatenating every span reproduces the text.

use std::ops::Range;

use super::options::{SplitterOptions, is_valid_terminator};
use crate::SplitError;

/// Words after `BEGIN` that make it a transaction statement, not a block
const TRANSACTION_WORDS: &[&str] = &[
    "TRANSACTION",
    "TRAN",
    "WORK",
    "DEFERRED",
    "IMMEDIATE",
    "EXCLUSIVE",
    "ISOLATION",
    "READ",
];

/// Words after `END` that close a control statement, not a block
const CONTROL_WORDS: &[&str] = &["IF", "LOOP", "WHILE", "REPEAT", "FOR"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `-- ...` up to the end of the line
    Line,
    /// `/* ... */`
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralStyle {
    /// `'...'` string
    SingleQuoted,
    /// `"..."` identifier
    DoubleQuoted,
    /// `` `...` `` identifier
    Backtick,
    /// `$tag$...$tag$` string
    Dollar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexKind {
    Code,
    Comment { style: CommentStyle },
    Literal { style: LiteralStyle },
    /// A block opened; `depth` is the nesting after the transition
    BlockBegin { depth: usize },
    /// A block closed; `depth` is the nesting after the transition
    BlockEnd { depth: usize },
    /// The active terminator at depth 0
    Terminator,
    /// A directive line replaced the active terminator
    DelimiterChange { delimiter: String },
}

/// One classified span of the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexEvent {
    pub kind: LexKind,
    /// Byte range into the scanned text
    pub span: Range<usize>,
}

impl LexEvent {
    fn new(kind: LexKind, span: Range<usize>) -> Self {
        Self { kind, span }
    }

    /// The slice of `source` this event covers
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }

    /// Whether this event makes the pending statement non-empty
    pub fn is_code(&self, source: &str) -> bool {
        match &self.kind {
            LexKind::Code => !self.text(source).trim().is_empty(),
            LexKind::Literal { .. } | LexKind::BlockBegin { .. } | LexKind::BlockEnd { .. } => {
                true
            }
            LexKind::Comment { .. } | LexKind::Terminator | LexKind::DelimiterChange { .. } => {
                false
            }
        }
    }
}

/// Lazy scanner over SQL text.
///
/// Yields `Err` once for an unbalanced construct and then stops.
pub struct Scanner<'a> {
    text: &'a str,
    options: &'a SplitterOptions,
    pos: usize,
    terminator: String,
    /// Offsets of the currently open blocks
    open_blocks: Vec<usize>,
    statement_has_code: bool,
    finished: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str, options: &'a SplitterOptions) -> Self {
        Self {
            text,
            options,
            pos: 0,
            terminator: options.terminator.clone(),
            open_blocks: Vec::new(),
            statement_has_code: false,
            finished: false,
        }
    }

    /// Current `BEGIN ... END` nesting depth
    pub fn depth(&self) -> usize {
        self.open_blocks.len()
    }

    /// The terminator currently in effect
    pub fn terminator(&self) -> &str {
        &self.terminator
    }

    fn bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }

    fn byte_at(&self, index: usize) -> Option<u8> {
        self.bytes().get(index).copied()
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn prev_byte(&self, index: usize) -> Option<u8> {
        index.checked_sub(1).and_then(|i| self.byte_at(i))
    }

    fn emit(&mut self, kind: LexKind, end: usize) -> LexEvent {
        let event = LexEvent::new(kind, self.pos..end);
        match &event.kind {
            LexKind::Terminator | LexKind::DelimiterChange { .. } => {
                self.statement_has_code = false;
            }
            _ => {
                if event.is_code(self.text) {
                    self.statement_has_code = true;
                }
            }
        }
        self.pos = end;
        event
    }

    fn fail(&mut self, construct: &'static str, offset: usize) -> SplitError {
        self.finished = true;
        SplitError::unbalanced(construct, self.text, offset)
    }

    /// Terminator at `index`, respecting word boundaries for word-like
    /// terminators such as `GO`.
    fn terminator_at(&self, index: usize) -> bool {
        let term = self.terminator.as_bytes();
        if !self.bytes()[index..].starts_with(term) {
            return false;
        }
        let first_is_word = term.first().copied().is_some_and(is_word_byte);
        let last_is_word = term.last().copied().is_some_and(is_word_byte);
        if first_is_word && self.prev_byte(index).is_some_and(is_word_byte) {
            return false;
        }
        if last_is_word && self.byte_at(index + term.len()).is_some_and(is_word_byte) {
            return false;
        }
        true
    }

    fn scan_line_comment(&mut self) -> LexEvent {
        let end = self
            .rest()
            .find('\n')
            .map_or(self.text.len(), |i| self.pos + i);
        self.emit(
            LexKind::Comment {
                style: CommentStyle::Line,
            },
            end,
        )
    }

    fn scan_block_comment(&mut self) -> Result<LexEvent, SplitError> {
        let bytes = self.bytes();
        let mut depth = 1usize;
        let mut i = self.pos + 2;
        while i < bytes.len() {
            if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Ok(self.emit(
                        LexKind::Comment {
                            style: CommentStyle::Block,
                        },
                        i,
                    ));
                }
            } else if self.options.nested_block_comments
                && bytes[i] == b'/'
                && bytes.get(i + 1) == Some(&b'*')
            {
                depth += 1;
                i += 2;
            } else {
                i += 1;
            }
        }
        let start = self.pos;
        Err(self.fail("block comment", start))
    }

    /// Quoted span closed by `quote`, where a doubled quote is an escape
    fn scan_quoted(
        &mut self,
        quote: u8,
        style: LiteralStyle,
        construct: &'static str,
    ) -> Result<LexEvent, SplitError> {
        let bytes = self.bytes();
        let backslash = self.options.backslash_escapes && style == LiteralStyle::SingleQuoted;
        let mut i = self.pos + 1;
        while i < bytes.len() {
            let b = bytes[i];
            if backslash && b == b'\\' {
                i += 2;
            } else if b == quote {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                } else {
                    return Ok(self.emit(LexKind::Literal { style }, i + 1));
                }
            } else {
                i += 1;
            }
        }
        let start = self.pos;
        Err(self.fail(construct, start))
    }

    /// Length of a `$tag$` marker at the current position, if any
    fn dollar_marker_len(&self) -> Option<usize> {
        if self.prev_byte(self.pos).is_some_and(is_word_byte) {
            return None;
        }
        let bytes = self.bytes();
        let mut i = self.pos + 1;
        if let Some(&first) = bytes.get(i)
            && (first.is_ascii_alphabetic() || first == b'_')
        {
            while bytes.get(i).copied().is_some_and(is_word_byte) {
                i += 1;
            }
        }
        (bytes.get(i) == Some(&b'$')).then(|| i + 1 - self.pos)
    }

    fn scan_dollar_quoted(&mut self, marker_len: usize) -> Result<LexEvent, SplitError> {
        let text = self.text;
        let marker = &text[self.pos..self.pos + marker_len];
        let body_start = self.pos + marker_len;
        match text[body_start..].find(marker) {
            Some(i) => {
                let end = body_start + i + marker_len;
                Ok(self.emit(
                    LexKind::Literal {
                        style: LiteralStyle::Dollar,
                    },
                    end,
                ))
            }
            None => {
                let start = self.pos;
                Err(self.fail("dollar-quoted string", start))
            }
        }
    }

    /// Next word after `from`, skipping whitespace. `None` at end of input
    /// or when a non-word character follows.
    fn next_word(&self, from: usize) -> Option<Range<usize>> {
        let start = skip_whitespace(self.bytes(), from);
        let end = word_end(self.bytes(), start);
        (end > start).then_some(start..end)
    }

    fn at_line_start(&self) -> bool {
        let line_start = self.text[..self.pos].rfind('\n').map_or(0, |i| i + 1);
        self.text[line_start..self.pos].trim().is_empty()
    }

    /// `DELIMITER <token>` at the start of a line, outside any block, before
    /// the pending statement has code.
    fn scan_directive(&mut self, after: usize) -> Option<LexEvent> {
        if !self.open_blocks.is_empty() || self.statement_has_code || !self.at_line_start() {
            return None;
        }
        let bytes = self.bytes();
        let text = self.text;
        let mut start = after;
        while matches!(bytes.get(start), Some(b' ' | b'\t')) {
            start += 1;
        }
        // Whitespace is required between the keyword and the token.
        if start == after {
            return None;
        }
        let mut end = start;
        while bytes.get(end).is_some_and(|b| !b.is_ascii_whitespace()) {
            end += 1;
        }
        let delimiter = &text[start..end];
        if !is_valid_terminator(delimiter) {
            return None;
        }
        let delimiter = delimiter.to_string();
        let line_end = text[end..]
            .find('\n')
            .map_or(text.len(), |i| end + i + 1);

        tracing::trace!(delimiter = %delimiter, "delimiter changed");
        self.terminator = delimiter.clone();
        Some(self.emit(LexKind::DelimiterChange { delimiter }, line_end))
    }

    fn scan_word(&mut self) -> LexEvent {
        let text = self.text;
        let options = self.options;
        let end = word_end(self.bytes(), self.pos);
        let word = &text[self.pos..end];

        if let Some(keyword) = &options.delimiter_keyword
            && word.eq_ignore_ascii_case(keyword)
            && let Some(event) = self.scan_directive(end)
        {
            return event;
        }

        if !options.begin_end_blocks || self.prev_byte(self.pos) == Some(b'.') {
            return self.emit(LexKind::Code, end);
        }

        if word.eq_ignore_ascii_case("BEGIN") {
            if self.begin_opens_block(end) {
                return self.open_block(end);
            }
        } else if word.eq_ignore_ascii_case("CASE") {
            return self.open_block(end);
        } else if word.eq_ignore_ascii_case("END") && !self.open_blocks.is_empty() {
            match self.next_word(end) {
                Some(next) if is_one_of(&text[next.clone()], CONTROL_WORDS) => {}
                Some(next) if text[next.clone()].eq_ignore_ascii_case("CASE") => {
                    return self.close_block(next.end);
                }
                _ => return self.close_block(end),
            }
        }

        self.emit(LexKind::Code, end)
    }

    fn begin_opens_block(&self, after: usize) -> bool {
        let next = skip_whitespace(self.bytes(), after);
        if next >= self.text.len() || self.terminator_at(next) {
            return false;
        }
        match self.next_word(after) {
            Some(range) => !is_one_of(&self.text[range], TRANSACTION_WORDS),
            None => true,
        }
    }

    fn open_block(&mut self, end: usize) -> LexEvent {
        self.open_blocks.push(self.pos);
        let depth = self.open_blocks.len();
        self.emit(LexKind::BlockBegin { depth }, end)
    }

    fn close_block(&mut self, end: usize) -> LexEvent {
        self.open_blocks.pop();
        let depth = self.open_blocks.len();
        self.emit(LexKind::BlockEnd { depth }, end)
    }

    /// Length of an enabled comment opener at the current position, or 0.
    ///
    /// A longer opener beats a terminator it starts with, so `/` as a
    /// terminator never splits a `/* ... */` comment.
    fn comment_opener_len(&self) -> usize {
        let rest = self.rest();
        if (self.options.line_comments && rest.starts_with("--"))
            || (self.options.block_comments && rest.starts_with("/*"))
        {
            2
        } else {
            0
        }
    }

    fn scan_next(&mut self) -> Result<LexEvent, SplitError> {
        let bytes = self.bytes();
        let b = bytes[self.pos];
        let next = bytes.get(self.pos + 1).copied();

        if self.open_blocks.is_empty()
            && self.terminator_at(self.pos)
            && self.comment_opener_len() <= self.terminator.len()
        {
            let end = self.pos + self.terminator.len();
            return Ok(self.emit(LexKind::Terminator, end));
        }

        match b {
            b'-' if next == Some(b'-') && self.options.line_comments => {
                Ok(self.scan_line_comment())
            }
            b'/' if next == Some(b'*') && self.options.block_comments => {
                self.scan_block_comment()
            }
            b'\'' => self.scan_quoted(b'\'', LiteralStyle::SingleQuoted, "single-quoted string"),
            b'"' => self.scan_quoted(b'"', LiteralStyle::DoubleQuoted, "double-quoted identifier"),
            b'`' if self.options.backtick_identifiers => {
                self.scan_quoted(b'`', LiteralStyle::Backtick, "backtick identifier")
            }
            b'$' if self.options.dollar_quotes => match self.dollar_marker_len() {
                Some(len) if self.rest()[..len] != *self.terminator => {
                    self.scan_dollar_quoted(len)
                }
                _ => Ok(self.emit(LexKind::Code, self.pos + 1)),
            },
            _ if is_word_byte(b) => Ok(self.scan_word()),
            _ if b.is_ascii_whitespace() => {
                let end = skip_whitespace(bytes, self.pos);
                Ok(self.emit(LexKind::Code, end))
            }
            _ => {
                let width = self.rest().chars().next().map_or(1, char::len_utf8);
                Ok(self.emit(LexKind::Code, self.pos + width))
            }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<LexEvent, SplitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.pos >= self.text.len() {
            self.finished = true;
            if self.options.strict
                && let Some(&offset) = self.open_blocks.first()
            {
                return Some(Err(SplitError::unbalanced(
                    "BEGIN ... END block",
                    self.text,
                    offset,
                )));
            }
            return None;
        }
        Some(self.scan_next())
    }
}

impl std::iter::FusedIterator for Scanner<'_> {}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn word_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while bytes.get(end).copied().is_some_and(is_word_byte) {
        end += 1;
    }
    end
}

fn skip_whitespace(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while bytes.get(end).is_some_and(u8::is_ascii_whitespace) {
        end += 1;
    }
    end
}

fn is_one_of(word: &str, candidates: &[&str]) -> bool {
    candidates.iter().any(|c| word.eq_ignore_ascii_case(c))
}
