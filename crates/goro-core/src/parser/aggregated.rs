//! Dialect-A: aggregated `goroutine profile` dumps.
//!
//! ```text
//! header?       := "goroutine profile: total " <uint>
//! record        := count_line label_line* frame_line+
//! count_line    := <uint> " @" …          |  <uint> " goroutine" "s"? " in stack:"
//! label_line    := "# labels: " <json-object>
//! frame_line    := "#" WS "0x" <hex> WS <func+offset> WS <file> ":" <uint>
//! ```

use super::common::LineCursor;
use super::{ParsedFile, ParsedGroup};
use crate::error::{Dialect, ParseError, ParseErrorKind};
use crate::frame::{strip_pc_offset, Frame};
use std::sync::OnceLock;

fn total_header_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^goroutine profile: total (\d+)$").unwrap())
}

fn count_line_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^(\d+)\s*(?:@|goroutines? in stack:)").unwrap())
}

fn frame_line_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^#\s+0x[0-9a-fA-F]+\s+(\S+)\s+(\S+):(\d+)$").unwrap())
}

pub fn parse(
    content: &str,
    original_name: &str,
    extracted_name: Option<String>,
) -> Result<ParsedFile, ParseError> {
    let mut cursor = LineCursor::new(content);
    let mut total_goroutines = None;
    let mut groups = Vec::new();
    let mut section_index = 0usize;

    cursor.skip_blank();
    if let Some(&line) = cursor.peek_line() {
        if let Some(caps) = total_header_regex().captures(line) {
            cursor.next_line();
            let total: usize = caps[1].parse().map_err(|_| {
                ParseError::new(
                    Dialect::Aggregated,
                    section_index,
                    cursor.line_number,
                    ParseErrorKind::BadCount,
                    line,
                )
            })?;
            total_goroutines = Some(total);
            cursor.skip_blank();
        }
    }

    while cursor.peek_line().is_some() {
        let group = parse_record(&mut cursor, section_index)?;
        groups.push(group);
        section_index += 1;
        cursor.skip_blank();
    }

    Ok(ParsedFile {
        original_name: original_name.to_string(),
        extracted_name,
        total_goroutines,
        groups,
    })
}

fn parse_record(cursor: &mut LineCursor<'_>, section_index: usize) -> Result<ParsedGroup, ParseError> {
    let count_line = cursor.next_line().expect("caller checked peek_line");
    let count_line_no = cursor.line_number;
    let caps = count_line_regex().captures(count_line).ok_or_else(|| {
        ParseError::new(Dialect::Aggregated, section_index, count_line_no, ParseErrorKind::BadCount, count_line)
    })?;
    let count: usize = caps[1].parse().map_err(|_| {
        ParseError::new(Dialect::Aggregated, section_index, count_line_no, ParseErrorKind::BadCount, count_line)
    })?;

    let mut labels = Vec::new();
    while let Some(&line) = cursor.peek_line() {
        let Some(json_text) = line.strip_prefix("# labels: ") else {
            break;
        };
        cursor.next_line();
        labels = parse_labels(json_text, section_index, cursor.line_number, line)?;
    }

    let mut trace = Vec::new();
    while let Some(&line) = cursor.peek_line() {
        if line.trim().is_empty() {
            break;
        }
        let Some(caps) = frame_line_regex().captures(line) else {
            return Err(ParseError::new(
                Dialect::Aggregated,
                section_index,
                cursor.line_number + 1,
                ParseErrorKind::BadFrame,
                line,
            ));
        };
        cursor.next_line();
        let func = strip_pc_offset(&caps[1]).to_string();
        let file = caps[2].to_string();
        let line_num: u32 = caps[3].parse().map_err(|_| {
            ParseError::new(
                Dialect::Aggregated,
                section_index,
                cursor.line_number,
                ParseErrorKind::BadLineNumber,
                line,
            )
        })?;
        trace.push(Frame::new(func, file, line_num));
    }

    if trace.is_empty() {
        return Err(ParseError::new(
            Dialect::Aggregated,
            section_index,
            count_line_no,
            ParseErrorKind::BadFrame,
            count_line,
        ));
    }

    let fingerprint = super::compute_fingerprint(&trace);
    // An empty or missing `state=` label normalizes to "unknown".
    let state = labels
        .iter()
        .find_map(|l| l.strip_prefix("state=").map(str::to_string))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(ParsedGroup {
        trace,
        fingerprint,
        state,
        labels,
        count,
        goroutines: Vec::new(),
    })
}

/// Decodes a `# labels: {...}` JSON object into an ordered list of
/// `key=value` strings, preserving source key order.
fn parse_labels(
    json_text: &str,
    section_index: usize,
    line_number: usize,
    snippet: &str,
) -> Result<Vec<String>, ParseError> {
    let value: serde_json::Value = serde_json::from_str(json_text).map_err(|_| {
        ParseError::new(Dialect::Aggregated, section_index, line_number, ParseErrorKind::BadLabelsJson, snippet)
    })?;
    let obj = value.as_object().ok_or_else(|| {
        ParseError::new(Dialect::Aggregated, section_index, line_number, ParseErrorKind::BadLabelsJson, snippet)
    })?;
    Ok(obj
        .iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{k}={v}")
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_single_record() {
        let content = "goroutine profile: total 2\n2 @ 0x1 0x2\n#\t0x1\tmain.worker+0x1a\t/main.go:10\n";
        let parsed = parse(content, "stacks.txt", None).unwrap();
        assert_eq!(parsed.total_goroutines, Some(2));
        assert_eq!(parsed.groups.len(), 1);
        assert_eq!(parsed.groups[0].count, 2);
        assert_eq!(parsed.groups[0].trace[0].func, "main.worker");
        assert_eq!(parsed.groups[0].trace[0].line, 10);
    }

    #[test]
    fn parses_without_header() {
        let content = "1 @ 0x1\n#\t0x1\tio.read\t/io.go:5\n";
        let parsed = parse(content, "stacks.txt", None).unwrap();
        assert!(parsed.total_goroutines.is_none());
        assert_eq!(parsed.groups[0].count, 1);
    }

    #[test]
    fn parses_goroutines_in_stack_form() {
        let content = "3 goroutines in stack:\n#\t0x1\tmain.worker\t/main.go:10\n";
        let parsed = parse(content, "stacks.txt", None).unwrap();
        assert_eq!(parsed.groups[0].count, 3);
    }

    #[test]
    fn parses_labels_preserving_order_and_state() {
        let content = "1 @ 0x1\n# labels: {\"state\":\"select\",\"pool\":\"a\"}\n#\t0x1\tmain.worker\t/main.go:10\n";
        let parsed = parse(content, "stacks.txt", None).unwrap();
        assert_eq!(parsed.groups[0].labels, vec!["state=select".to_string(), "pool=a".to_string()]);
        assert_eq!(parsed.groups[0].state, "select");
    }

    #[test]
    fn missing_state_label_normalizes_to_unknown() {
        let content = "1 @ 0x1\n#\t0x1\tmain.worker\t/main.go:10\n";
        let parsed = parse(content, "stacks.txt", None).unwrap();
        assert_eq!(parsed.groups[0].state, "unknown");
    }

    #[test]
    fn scenario_s2_two_groups_sum_to_three() {
        let content = "\
goroutine profile: total 3
2 @ 0x1
#\t0x1\tmain.worker\t/main.go:10
1 @ 0x2
#\t0x2\tio.read\t/io.go:5
";
        let parsed = parse(content, "stacks.txt", None).unwrap();
        assert_eq!(parsed.groups.len(), 2);
        assert_eq!(parsed.groups.iter().map(|g| g.count).sum::<usize>(), 3);
    }

    #[test]
    fn rejects_bad_labels_json() {
        let content = "1 @ 0x1\n# labels: {not json}\n#\t0x1\tmain.worker\t/main.go:10\n";
        let err = parse(content, "stacks.txt", None).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::BadLabelsJson);
    }

    #[test]
    fn rejects_malformed_frame_line() {
        let content = "1 @ 0x1\nnot a frame line\n";
        let err = parse(content, "stacks.txt", None).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::BadFrame);
    }
}
