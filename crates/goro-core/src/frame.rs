//! Canonical stack frame record and the content fingerprint used as stack identity.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// One `(function, file, line)` triple in a stack trace.
///
/// Frames are immutable once parsed and compared/hashed by all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Frame {
    pub func: String,
    pub file: String,
    pub line: u32,
}

impl Frame {
    pub fn new(func: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            func: func.into(),
            file: file.into(),
            line,
        }
    }
}

/// Length, in hex characters, of a stack fingerprint.
pub const FINGERPRINT_LEN: usize = 24;

/// Computes the stable fingerprint of a frame sequence: the last 24 hex
/// characters of the SHA-256 digest of the newline-joined
/// `"<func> <file>:<line>"` representation of each frame.
///
/// Deterministic and dialect-independent: two traces that compare equal as
/// `Frame` sequences always fingerprint identically, regardless of which
/// dialect produced them.
pub fn fingerprint(trace: &[Frame]) -> String {
    let mut hasher = Sha256::new();
    for (i, frame) in trace.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(frame.func.as_bytes());
        hasher.update(b" ");
        hasher.update(frame.file.as_bytes());
        hasher.update(b":");
        hasher.update(frame.line.to_string().as_bytes());
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        write!(hex, "{byte:02x}").expect("writing to a String cannot fail");
    }
    hex.split_off(hex.len() - FINGERPRINT_LEN)
}

/// Lower-cased, space-joined `func file:line` text used for stack search.
pub fn searchable_text(trace: &[Frame]) -> String {
    let mut out = String::new();
    for frame in trace {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&frame.func);
        out.push(' ');
        out.push_str(&frame.file);
        out.push(':');
        out.push_str(&frame.line.to_string());
    }
    out.make_ascii_lowercase();
    out
}

/// Heuristic used by the naming DSL's `while: stdlib` sentinel.
///
/// A function with no `/` is stdlib unless it begins with `main`; otherwise
/// it is stdlib iff the path segment before the first `/` contains no `.`
/// (i.e. it is not a module path like `github.com/...`).
pub fn is_stdlib_func(func: &str) -> bool {
    match func.find('/') {
        None => !func.starts_with("main"),
        Some(idx) => !func[..idx].contains('.'),
    }
}

/// Strips a trailing `+0x<hex>` program-counter offset from a function name,
/// as found in aggregated-dialect frame lines (e.g. `main.worker+0x1a`, with
/// no space before the offset — unlike the space-prefixed `" +0x"` offset on
/// a per-goroutine dialect's *file* line, see `parser::common::parse_location`).
pub fn strip_pc_offset(func: &str) -> &str {
    match func.rfind("+0x") {
        Some(idx) if idx > 0 && func[idx + 3..].bytes().all(|b| b.is_ascii_hexdigit()) && !func[idx + 3..].is_empty() => {
            &func[..idx]
        }
        _ => func,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_24_hex_chars() {
        let trace = vec![Frame::new("main.worker", "/main.go", 10)];
        let fp = fingerprint(&trace);
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let trace = vec![
            Frame::new("main.worker", "/main.go", 10),
            Frame::new("runtime.gopark", "/runtime/proc.go", 400),
        ];
        assert_eq!(fingerprint(&trace), fingerprint(&trace));
    }

    #[test]
    fn fingerprint_distinguishes_traces() {
        let a = vec![Frame::new("main.worker", "/main.go", 10)];
        let b = vec![Frame::new("main.other", "/main.go", 20)];
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn stdlib_heuristic() {
        assert!(is_stdlib_func("runtime.gopark"));
        assert!(is_stdlib_func("sync.(*WaitGroup).Wait"));
        assert!(!is_stdlib_func("main.worker"));
        assert!(!is_stdlib_func("github.com/acme/widget.Run"));
        assert!(is_stdlib_func("internal/poll.runtime_pollWait"));
    }

    #[test]
    fn strips_pc_offset() {
        assert_eq!(strip_pc_offset("main.worker+0x1a"), "main.worker");
        assert_eq!(strip_pc_offset("main.worker"), "main.worker");
    }

    #[test]
    fn searchable_text_is_lowercased() {
        let trace = vec![Frame::new("Main.Worker", "/Main.go", 10)];
        assert_eq!(searchable_text(&trace), "main.worker /main.go:10");
    }
}
