//! Goroutine dump parser: dialect detection and the shared `ParsedFile`
//! output shape. The two dialect grammars live in [`aggregated`] and
//! [`per_goroutine`]; both share [`common::LineCursor`].

pub mod aggregated;
pub mod common;
pub mod per_goroutine;

use crate::config::ExtractionPattern;
use crate::error::ParseError;
use crate::frame::{fingerprint, Frame};

/// One parsed group of goroutines sharing a `(fingerprint, state)` within a
/// single file: the parser's output unit before `ProfileCollection` merges
/// groups across files.
#[derive(Debug, Clone)]
pub struct ParsedGroup {
    pub trace: Vec<Frame>,
    pub fingerprint: String,
    pub state: String,
    pub labels: Vec<String>,
    pub count: usize,
    /// Numeric goroutine ids contributed by this group (empty for the
    /// aggregated dialect, which does not enumerate ids).
    pub goroutines: Vec<ParsedGoroutine>,
}

/// A single goroutine extracted from the per-goroutine dialect.
#[derive(Debug, Clone)]
pub struct ParsedGoroutine {
    pub id: u64,
    pub wait_minutes: u32,
    pub creator_id: Option<u64>,
}

/// The result of parsing one dump file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub original_name: String,
    pub extracted_name: Option<String>,
    pub total_goroutines: Option<usize>,
    pub groups: Vec<ParsedGroup>,
}

/// Recognizes which dialect `content` is written in: **Dialect-B**
/// (per-goroutine) if the trimmed content begins with a line matching
/// `goroutine <digits> [`, otherwise **Dialect-A** (aggregated).
pub fn detect_dialect(content: &str) -> crate::error::Dialect {
    let first_line = content.trim_start().lines().next().unwrap_or("");
    if common::matches_goroutine_header(first_line) {
        crate::error::Dialect::PerGoroutine
    } else {
        crate::error::Dialect::Aggregated
    }
}

/// Parses `content` (the bytes of one dump file, already decoded as UTF-8)
/// into a [`ParsedFile`], detecting the dialect automatically.
///
/// Parsing is atomic: on any [`ParseError`] the partial output is discarded.
pub fn parse_file(
    content: &str,
    original_name: &str,
    extraction_patterns: &[ExtractionPattern],
) -> Result<ParsedFile, ParseError> {
    let extracted_name = extract_name(content, extraction_patterns);
    match detect_dialect(content) {
        crate::error::Dialect::PerGoroutine => per_goroutine::parse(content, original_name, extracted_name),
        crate::error::Dialect::Aggregated => aggregated::parse(content, original_name, extracted_name),
    }
}

/// Scans every line of `content` against `patterns` in order; the first
/// pattern that matches the first line it can match wins.
fn extract_name(content: &str, patterns: &[ExtractionPattern]) -> Option<String> {
    for line in content.lines() {
        for pattern in patterns {
            if let Some(name) = pattern.apply(line) {
                return Some(name);
            }
        }
    }
    None
}

pub(crate) fn compute_fingerprint(trace: &[Frame]) -> String {
    fingerprint(trace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_per_goroutine_dialect() {
        let content = "goroutine 1 [running]:\nmain.worker()\n\t/main.go:10\n";
        assert_eq!(detect_dialect(content), crate::error::Dialect::PerGoroutine);
    }

    #[test]
    fn detects_aggregated_dialect() {
        let content = "goroutine profile: total 3\n1 @ 0x1\n#\t0x1\tmain.worker+0x1\t/main.go:10\n";
        assert_eq!(detect_dialect(content), crate::error::Dialect::Aggregated);
    }

    #[test]
    fn detects_aggregated_dialect_without_header() {
        let content = "2 @ 0x1\n#\t0x1\tmain.worker+0x1\t/main.go:10\n";
        assert_eq!(detect_dialect(content), crate::error::Dialect::Aggregated);
    }

    #[test]
    fn extract_name_first_matching_line_wins() {
        let patterns = vec![crate::config::ExtractionPattern {
            regex: regex::Regex::new(r"^pod: (\S+)$").unwrap(),
            replacement: "$1".to_string(),
        }];
        let content = "unrelated line\npod: worker-7\npod: worker-8\n";
        assert_eq!(extract_name(content, &patterns), Some("worker-7".to_string()));
    }
}
