//! Shared scanning primitives used by both dialect parsers: a line cursor
//! and the per-goroutine frame-pair sub-scanner, shared because both
//! dialects tokenize a `func(args)` / `file:line` pair the same way.

use crate::error::{Dialect, ParseError, ParseErrorKind};
use crate::frame::{strip_pc_offset, Frame};
use std::sync::OnceLock;

/// A simple line-oriented cursor over a dump's contents. Tracks the current
/// 1-based line number for error reporting and skips blank lines on
/// request.
pub struct LineCursor<'a> {
    lines: std::iter::Peekable<std::str::Lines<'a>>,
    pub line_number: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            lines: content.lines().peekable(),
            line_number: 0,
        }
    }

    pub fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.next();
        if line.is_some() {
            self.line_number += 1;
        }
        line
    }

    pub fn peek_line(&mut self) -> Option<&&'a str> {
        self.lines.peek()
    }

    /// Advances past any run of blank (or whitespace-only) lines.
    pub fn skip_blank(&mut self) {
        while matches!(self.peek_line(), Some(l) if l.trim().is_empty()) {
            self.next_line();
        }
    }
}

fn goroutine_header_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^goroutine \d+ \[").unwrap())
}

/// True if `line` matches `goroutine <digits> [`, the per-goroutine dialect
/// sentinel used for dialect detection.
pub fn matches_goroutine_header(line: &str) -> bool {
    goroutine_header_regex().is_match(line)
}

/// Parses a `func(args)` line, stripping the argument list and returning
/// only the qualified function name.
pub fn parse_func_call(line: &str) -> Option<&str> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if close < open {
        return None;
    }
    Some(&line[..open])
}

/// Parses a TAB-indented `<file>:<line>[ +0x<hex>]` location line into a
/// `(file, line_number)` pair.
pub fn parse_location(
    line: &str,
    dialect: Dialect,
    section_index: usize,
    line_number: usize,
) -> Result<(String, u32), ParseError> {
    let trimmed = line.trim_start_matches(['\t', ' ']);
    let without_pc = match trimmed.find(" +0x") {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };
    let colon = without_pc.rfind(':').ok_or_else(|| {
        ParseError::new(dialect, section_index, line_number, ParseErrorKind::BadFrame, line)
    })?;
    let file = &without_pc[..colon];
    let line_str = &without_pc[colon + 1..];
    let line_num: u32 = line_str
        .parse()
        .map_err(|_| ParseError::new(dialect, section_index, line_number, ParseErrorKind::BadLineNumber, line))?;
    Ok((file.to_string(), line_num))
}

/// Parses one `func(args)` / `\t<file>:<line>` frame pair starting at the
/// cursor's current position. Returns `None` if the next line isn't a call
/// line (e.g. cursor is at a blank line or `created by`).
pub fn parse_frame_pair(
    cursor: &mut LineCursor<'_>,
    dialect: Dialect,
    section_index: usize,
) -> Result<Option<Frame>, ParseError> {
    let Some(call_line) = cursor.peek_line() else {
        return Ok(None);
    };
    if call_line.trim().is_empty() || call_line.starts_with("created by ") {
        return Ok(None);
    }
    let call_line = cursor.next_line().expect("peeked line exists");
    let call_line_no = cursor.line_number;
    let func = parse_func_call(call_line).ok_or_else(|| {
        ParseError::new(dialect, section_index, call_line_no, ParseErrorKind::BadFrame, call_line)
    })?;

    let loc_line = cursor.next_line().ok_or_else(|| {
        ParseError::new(dialect, section_index, call_line_no, ParseErrorKind::BadFrame, call_line)
    })?;
    let (file, line_num) = parse_location(loc_line, dialect, section_index, cursor.line_number)?;
    Ok(Some(Frame::new(strip_pc_offset(func), file, line_num)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_regex_matches() {
        assert!(matches_goroutine_header("goroutine 42 [running]:"));
        assert!(!matches_goroutine_header("goroutine profile: total 3"));
    }

    #[test]
    fn parses_func_call_stripping_args() {
        assert_eq!(parse_func_call("main.worker(0x1, 0x2)"), Some("main.worker"));
    }

    #[test]
    fn parses_location_with_pc_offset() {
        let (file, line) = parse_location("\t/main.go:10 +0x1a", Dialect::PerGoroutine, 0, 2).unwrap();
        assert_eq!(file, "/main.go");
        assert_eq!(line, 10);
    }

    #[test]
    fn parses_location_without_pc_offset() {
        let (file, line) = parse_location("\t/main.go:10", Dialect::PerGoroutine, 0, 2).unwrap();
        assert_eq!(file, "/main.go");
        assert_eq!(line, 10);
    }

    #[test]
    fn frame_pair_reads_both_lines() {
        let content = "main.worker(0x1)\n\t/main.go:10 +0x1a\n";
        let mut cursor = LineCursor::new(content);
        let frame = parse_frame_pair(&mut cursor, Dialect::PerGoroutine, 0).unwrap().unwrap();
        assert_eq!(frame.func, "main.worker");
        assert_eq!(frame.file, "/main.go");
        assert_eq!(frame.line, 10);
    }

    #[test]
    fn frame_pair_stops_at_blank_line() {
        let content = "\nmore\n";
        let mut cursor = LineCursor::new(content);
        assert!(parse_frame_pair(&mut cursor, Dialect::PerGoroutine, 0).unwrap().is_none());
    }

    #[test]
    fn frame_pair_stops_at_created_by() {
        let content = "created by main.spawn in goroutine 1\n";
        let mut cursor = LineCursor::new(content);
        assert!(parse_frame_pair(&mut cursor, Dialect::PerGoroutine, 0).unwrap().is_none());
    }
}
