//! Dialect-B: per-goroutine records, each carrying a numeric id.
//!
//! ```text
//! record       := "goroutine " <uint> " [" <state>("," WS <uint> " minute" "s"?)? "]:" NL
//!                 (frame_pair)+
//!                 ("created by " <func-sig> " in goroutine " <uint> NL frame_pair?)?
//! ```

use super::common::{parse_frame_pair, LineCursor};
use super::{ParsedFile, ParsedGoroutine, ParsedGroup};
use crate::error::{Dialect, ParseError, ParseErrorKind};
use crate::frame::Frame;
use std::collections::HashMap;
use std::sync::OnceLock;

fn header_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^goroutine (\d+) \[([^,\]]+)(?:, (\d+) minutes?)?\]:$").unwrap()
    })
}

fn created_by_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^created by .+ in goroutine (\d+)$").unwrap())
}

struct RawGoroutine {
    id: u64,
    state: String,
    wait_minutes: u32,
    trace: Vec<Frame>,
    creator_id: Option<u64>,
}

pub fn parse(
    content: &str,
    original_name: &str,
    extracted_name: Option<String>,
) -> Result<ParsedFile, ParseError> {
    let mut cursor = LineCursor::new(content);
    let mut raw_goroutines = Vec::new();
    let mut section_index = 0usize;

    cursor.skip_blank();
    while cursor.peek_line().is_some() {
        let goroutine = parse_record(&mut cursor, section_index)?;
        raw_goroutines.push(goroutine);
        section_index += 1;
        cursor.skip_blank();
    }

    let groups = fuse_groups(raw_goroutines);
    let total = groups.iter().map(|g| g.count).sum();

    Ok(ParsedFile {
        original_name: original_name.to_string(),
        extracted_name,
        total_goroutines: Some(total),
        groups,
    })
}

fn parse_record(cursor: &mut LineCursor<'_>, section_index: usize) -> Result<RawGoroutine, ParseError> {
    let header_line_no_start = cursor.line_number + 1;
    let header = cursor.next_line().expect("caller checked peek_line");
    let caps = header_regex().captures(header).ok_or_else(|| {
        ParseError::new(
            Dialect::PerGoroutine,
            section_index,
            header_line_no_start,
            ParseErrorKind::BadHeader,
            header,
        )
    })?;

    let id: u64 = caps[1].parse().map_err(|_| {
        ParseError::new(
            Dialect::PerGoroutine,
            section_index,
            header_line_no_start,
            ParseErrorKind::BadHeader,
            header,
        )
    })?;
    let state = caps[2].to_string();
    let wait_minutes: u32 = match caps.get(3) {
        Some(m) => m.as_str().parse().map_err(|_| {
            ParseError::new(
                Dialect::PerGoroutine,
                section_index,
                header_line_no_start,
                ParseErrorKind::BadWait,
                header,
            )
        })?,
        None => 0,
    };

    let mut trace = Vec::new();
    while let Some(frame) = parse_frame_pair(cursor, Dialect::PerGoroutine, section_index)? {
        trace.push(frame);
    }

    let mut creator_id = None;
    if let Some(created_line) = cursor.peek_line().copied() {
        if created_line.starts_with("created by ") {
            cursor.next_line();
            let creator_line_no = cursor.line_number;
            let caps = created_by_regex().captures(created_line).ok_or_else(|| {
                ParseError::new(
                    Dialect::PerGoroutine,
                    section_index,
                    creator_line_no,
                    ParseErrorKind::BadFrame,
                    created_line,
                )
            })?;
            let cid: u64 = caps[1].parse().map_err(|_| {
                ParseError::new(
                    Dialect::PerGoroutine,
                    section_index,
                    creator_line_no,
                    ParseErrorKind::BadHeader,
                    created_line,
                )
            })?;
            creator_id = Some(cid);
            // optional indented file:line for the creation site; it's not
            // part of the goroutine's own trace so we just consume it.
            if let Some(loc_line) = cursor.peek_line().copied() {
                if loc_line.starts_with('\t') || loc_line.starts_with(' ') {
                    cursor.next_line();
                }
            }
        }
    }

    Ok(RawGoroutine {
        id,
        state,
        wait_minutes,
        trace,
        creator_id,
    })
}

/// Fuses per-goroutine records sharing `(fingerprint, state)` into a single
/// `ParsedGroup` whose `labels = ["state=<state>"]`.
fn fuse_groups(raw: Vec<RawGoroutine>) -> Vec<ParsedGroup> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: HashMap<(String, String), ParsedGroup> = HashMap::new();

    for g in raw {
        let fp = super::compute_fingerprint(&g.trace);
        let key = (fp.clone(), g.state.clone());
        let entry = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            ParsedGroup {
                trace: g.trace.clone(),
                fingerprint: fp.clone(),
                state: g.state.clone(),
                labels: vec![format!("state={}", g.state)],
                count: 0,
                goroutines: Vec::new(),
            }
        });
        entry.count += 1;
        entry.goroutines.push(ParsedGoroutine {
            id: g.id,
            wait_minutes: g.wait_minutes,
            creator_id: g.creator_id,
        });
    }

    order
        .into_iter()
        .map(|key| groups.remove(&key).expect("key was just inserted"))
        .collect()
}
