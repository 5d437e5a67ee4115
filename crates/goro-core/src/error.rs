//! Error types surfaced by the goroutine profile model.
//!
//! # Error Handling Strategy
//!
//! - [`ParseError`]: fatal. Parsing a dump is atomic per file — on any
//!   `ParseError` the partial `ParsedFile` is discarded and the caller's
//!   collection is left untouched.
//! - [`ConfigError`]: a malformed rule in an effective configuration
//!   (invalid regex, malformed substitution literal, invalid capture group).
//!   Non-fatal: the offending rule is dropped and the remainder of the rule
//!   list still applies, see [`crate::config::Settings::compile`].
//! - [`DuplicateFileNameError`]: `addFile` would collide on display name;
//!   the collection is unchanged.
//! - [`FilterParseError`]: a filter string failed to parse; the previous
//!   filter stays in effect.

use std::fmt;

/// Which dialect was being parsed when a [`ParseError`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Aggregated `goroutine profile: total N` dump.
    Aggregated,
    /// Per-goroutine `goroutine N [state]:` dump.
    PerGoroutine,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Aggregated => write!(f, "aggregated"),
            Dialect::PerGoroutine => write!(f, "per-goroutine"),
        }
    }
}

/// Category of parse error, for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Unrecognized goroutine/record header.
    BadHeader,
    /// Non-numeric or otherwise malformed goroutine count.
    BadCount,
    /// Non-numeric wait-minutes value.
    BadWait,
    /// Non-numeric line number in a frame.
    BadLineNumber,
    /// Malformed central frame pair (function or file:line line).
    BadFrame,
    /// Invalid JSON on a `# labels:` line.
    BadLabelsJson,
}

impl ParseErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseErrorKind::BadHeader => "bad_header",
            ParseErrorKind::BadCount => "bad_count",
            ParseErrorKind::BadWait => "bad_wait",
            ParseErrorKind::BadLineNumber => "bad_line_number",
            ParseErrorKind::BadFrame => "bad_frame",
            ParseErrorKind::BadLabelsJson => "bad_labels_json",
        }
    }
}

/// Error encountered while parsing a goroutine dump.
///
/// Carries enough context (dialect, section, line) to point a caller at the
/// offending text without re-scanning the input.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub dialect: Dialect,
    /// 0-based index of the record/section being parsed.
    pub section_index: usize,
    /// 1-based line number within the input.
    pub line_number: usize,
    pub kind: ParseErrorKind,
    pub snippet: String,
}

impl ParseError {
    pub fn new(
        dialect: Dialect,
        section_index: usize,
        line_number: usize,
        kind: ParseErrorKind,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            dialect,
            section_index,
            line_number,
            kind,
            snippet: snippet.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dump, section {}, line {}: {} ({:?})",
            self.dialect,
            self.section_index,
            self.line_number,
            self.kind.as_str(),
            self.snippet
        )
    }
}

impl std::error::Error for ParseError {}

/// A malformed rule in an effective configuration.
///
/// Config errors are non-fatal: the offending rule is dropped and the
/// remainder of the rule list continues to apply.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid rule {rule:?}: {reason}")]
pub struct ConfigError {
    pub rule: String,
    pub reason: String,
}

impl ConfigError {
    pub fn new(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

/// `addFile` would collide on display name; the collection is unchanged.
#[derive(Debug, Clone, thiserror::Error)]
#[error("a file named {0:?} is already loaded")]
pub struct DuplicateFileNameError(pub String);

/// A filter string failed to parse. The previous filter stays in effect.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid filter token {token:?}: {reason}")]
pub struct FilterParseError {
    pub reason: String,
    pub token: String,
}

impl FilterParseError {
    pub fn new(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            reason: reason.into(),
        }
    }
}
