//! The stack-naming DSL: an ordered list of `{Skip, Trim, Fold, Find}` rules
//! evaluated against a frame sequence to produce a human-readable stack name.
//!
//! The raw, serializable rule shape lives in [`crate::config`]; this module
//! holds the compiled pattern types and the evaluator.

use crate::error::ConfigError;
use crate::frame::{is_stdlib_func, Frame};
use regex::Regex;

const SEPARATOR: &str = " → ";

/// A compiled match pattern usable by `Skip`/`Fold`/`Find` rules: either a
/// literal prefix or a regex. (The `stdlib` sentinel is only valid for
/// `while` clauses — see [`WhilePattern`].)
#[derive(Debug, Clone)]
pub enum FramePattern {
    Prefix(String),
    Regex(Regex),
}

impl FramePattern {
    pub fn matches(&self, func: &str) -> bool {
        match self {
            FramePattern::Prefix(p) => func.starts_with(p.as_str()),
            FramePattern::Regex(r) => r.is_match(func),
        }
    }

    /// Parses a raw pattern string. `"regex:<pat>"` compiles `<pat>` as a
    /// regex; anything else is a literal prefix. The bare sentinel
    /// `"stdlib"` is rejected here — it is only meaningful for `while`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw == "stdlib" {
            return Err(ConfigError::new(
                raw,
                "the stdlib sentinel is only valid in a while clause",
            ));
        }
        parse_regex_or_prefix(raw)
    }
}

/// A compiled pattern usable by a `while` clause: literal prefix, regex, or
/// the `stdlib` sentinel (frames whose function is a Go standard library
/// symbol, per [`is_stdlib_func`]).
#[derive(Debug, Clone)]
pub enum WhilePattern {
    Prefix(String),
    Regex(Regex),
    Stdlib,
}

impl WhilePattern {
    pub fn matches(&self, func: &str) -> bool {
        match self {
            WhilePattern::Prefix(p) => func.starts_with(p.as_str()),
            WhilePattern::Regex(r) => r.is_match(func),
            WhilePattern::Stdlib => is_stdlib_func(func),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw == "stdlib" {
            return Ok(WhilePattern::Stdlib);
        }
        match parse_regex_or_prefix(raw)? {
            FramePattern::Prefix(p) => Ok(WhilePattern::Prefix(p)),
            FramePattern::Regex(r) => Ok(WhilePattern::Regex(r)),
        }
    }
}

fn parse_regex_or_prefix(raw: &str) -> Result<FramePattern, ConfigError> {
    if let Some(pat) = raw.strip_prefix("regex:") {
        let compiled = Regex::new(pat)
            .map_err(|e| ConfigError::new(raw, format!("invalid regex: {e}")))?;
        Ok(FramePattern::Regex(compiled))
    } else {
        Ok(FramePattern::Prefix(raw.to_string()))
    }
}

/// A `Trim` rule's pattern: either a literal prefix to strip, or an
/// `s/…/…/`-style substitution.
#[derive(Debug, Clone)]
pub enum TrimPattern {
    Strip(String),
    Subst {
        regex: Regex,
        replacement: String,
    },
}

impl TrimPattern {
    /// Parses the textual Trim pattern syntax: a substitution literal
    /// `s/<pat>/<repl>/` or `s|<pat>|<repl>|<flags>`, or (if it doesn't
    /// match that shape) a plain literal prefix.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if let Some(subst) = parse_substitution(raw)? {
            Ok(subst)
        } else {
            Ok(TrimPattern::Strip(raw.to_string()))
        }
    }

    fn apply(&self, func: &str) -> String {
        match self {
            TrimPattern::Strip(prefix) => func.strip_prefix(prefix.as_str()).unwrap_or(func).to_string(),
            TrimPattern::Subst { regex, replacement } => {
                regex.replace(func, replacement.as_str()).into_owned()
            }
        }
    }

    fn matches(&self, func: &str) -> bool {
        match self {
            TrimPattern::Strip(prefix) => func.starts_with(prefix.as_str()),
            TrimPattern::Subst { regex, .. } => regex.is_match(func),
        }
    }
}

/// Parses `s/<pat>/<repl>/` or `s|<pat>|<repl>|<flags>`. Returns `Ok(None)`
/// if `raw` doesn't have the substitution shape (caller falls back to a
/// literal-prefix trim).
fn parse_substitution(raw: &str) -> Result<Option<TrimPattern>, ConfigError> {
    let mut chars = raw.chars();
    if chars.next() != Some('s') {
        return Ok(None);
    }
    let delim = match chars.next() {
        Some(c) if !c.is_alphanumeric() => c,
        _ => return Ok(None),
    };
    let rest: String = chars.collect();
    let parts: Vec<&str> = rest.splitn(3, delim).collect();
    if parts.len() != 3 {
        return Err(ConfigError::new(raw, "unterminated s/../../ substitution literal"));
    }
    let (pattern, replacement, flags) = (parts[0], parts[1], parts[2]);
    let mut builder = String::new();
    if flags.contains('i') {
        builder.push_str("(?i)");
    }
    builder.push_str(pattern);
    let regex = Regex::new(&builder).map_err(|e| ConfigError::new(raw, format!("invalid regex: {e}")))?;
    Ok(Some(TrimPattern::Subst {
        regex,
        replacement: replacement.to_string(),
    }))
}

/// One rule in an ordered stack-naming rule list.
#[derive(Debug, Clone)]
pub enum NameRule {
    /// Drop a leading frame whose function matches `pattern`.
    Skip(FramePattern),
    /// Strip or substitute part of a frame's function name.
    Trim(TrimPattern),
    /// Fold a frame (and any `while`-matched run after it) into a single
    /// named segment.
    Fold {
        pattern: FramePattern,
        to: String,
        while_pattern: Option<WhilePattern>,
    },
    /// Look ahead for a distinguishing frame further up the call chain.
    Find {
        pattern: FramePattern,
        to: String,
        while_pattern: Option<WhilePattern>,
    },
}

fn skip_matches(rules: &[NameRule], func: &str) -> bool {
    rules.iter().any(|r| matches!(r, NameRule::Skip(p) if p.matches(func)))
}

fn find_fold(rules: &[NameRule], func: &str) -> Option<(&str, Option<&WhilePattern>)> {
    rules.iter().find_map(|r| match r {
        NameRule::Fold {
            pattern,
            to,
            while_pattern,
        } if pattern.matches(func) => Some((to.as_str(), while_pattern.as_ref())),
        _ => None,
    })
}

/// Prepends `piece` to `name` with the DSL separator. When `dedupe` is set
/// (used by `Fold`), a `piece` that `name` already begins with is dropped.
fn prepend(name: &mut String, piece: &str, dedupe: bool) {
    if dedupe && name.starts_with(piece) {
        return;
    }
    if name.is_empty() {
        *name = piece.to_string();
    } else {
        *name = format!("{piece}{SEPARATOR}{name}");
    }
}

/// Advances `i` past any run of frames matching `while_pattern`, treating
/// frames matched by a `Skip` rule as transparently consumable too.
fn consume_while(trace: &[Frame], mut i: usize, while_pattern: Option<&WhilePattern>, rules: &[NameRule]) -> usize {
    let Some(while_pattern) = while_pattern else {
        return i;
    };
    while i < trace.len() {
        let func = &trace[i].func;
        if while_pattern.matches(func) || skip_matches(rules, func) {
            i += 1;
        } else {
            break;
        }
    }
    i
}

/// Scans `trace[start..]` for the Find rule match with the largest frame
/// index, returning `(frame_index, to, while_pattern)`.
fn find_lookahead<'a>(
    trace: &[Frame],
    start: usize,
    rules: &'a [NameRule],
) -> Option<(usize, &'a str, Option<&'a WhilePattern>)> {
    let mut best: Option<(usize, &str, Option<&WhilePattern>)> = None;
    for rule in rules {
        let NameRule::Find {
            pattern,
            to,
            while_pattern,
        } = rule
        else {
            continue;
        };
        if let Some(j) = (start..trace.len()).filter(|&j| pattern.matches(&trace[j].func)).next_back() {
            if best.map(|(bi, ..)| j > bi).unwrap_or(true) {
                best = Some((j, to.as_str(), while_pattern.as_ref()));
            }
        }
    }
    best
}

/// Evaluates the naming DSL against `trace`, producing a human-readable
/// stack name.
pub fn evaluate_name(trace: &[Frame], rules: &[NameRule]) -> String {
    if trace.is_empty() {
        return "empty".to_string();
    }

    let mut name = String::new();
    let mut i = 0;

    'outer: loop {
        // Step 1: skip.
        while i < trace.len() && skip_matches(rules, &trace[i].func) {
            i += 1;
        }
        if i >= trace.len() {
            break;
        }

        // Step 2: fold.
        if let Some((to, while_pattern)) = find_fold(rules, &trace[i].func) {
            let to = to.to_string();
            prepend(&mut name, &to, true);
            i += 1;
            i = consume_while(trace, i, while_pattern, rules);
            continue 'outer;
        }

        // Step 3: trim + prepend.
        let mut trimmed = trace[i].func.clone();
        for rule in rules {
            if let NameRule::Trim(tp) = rule {
                if tp.matches(&trimmed) {
                    trimmed = tp.apply(&trimmed);
                }
            }
        }
        prepend(&mut name, &trimmed, false);

        // Step 4: find lookahead.
        if let Some((j, to, while_pattern)) = find_lookahead(trace, i + 1, rules) {
            prepend(&mut name, to, false);
            i = consume_while(trace, j + 1, while_pattern, rules);
            continue 'outer;
        }

        // Step 5: terminate.
        break;
    }

    if name.is_empty() {
        trace.last().map(|f| f.func.clone()).unwrap_or_else(|| "empty".to_string())
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_skip(p: &str) -> NameRule {
        NameRule::Skip(FramePattern::parse(p).unwrap())
    }

    fn rule_fold(p: &str, to: &str, while_: Option<&str>) -> NameRule {
        NameRule::Fold {
            pattern: FramePattern::parse(p).unwrap(),
            to: to.to_string(),
            while_pattern: while_.map(|w| WhilePattern::parse(w).unwrap()),
        }
    }

    #[test]
    fn fold_produces_name_s4() {
        let trace = vec![
            Frame::new("sync.(*WaitGroup).Wait", "/sync/waitgroup.go", 130),
            Frame::new("main.worker", "/main.go", 10),
        ];
        let rules = vec![rule_fold("sync.(*WaitGroup).Wait", "waitgroup", None)];
        let name = evaluate_name(&trace, &rules);
        assert!(name.starts_with("waitgroup"), "got {name:?}");
    }

    #[test]
    fn empty_trace_falls_back_to_literal() {
        assert_eq!(evaluate_name(&[], &[]), "empty");
    }

    #[test]
    fn no_rules_names_after_top_frame() {
        // Step 3 always trims and prepends the current frame, rule list or
        // not, so an empty rule list terminates after the very first frame.
        let trace = vec![
            Frame::new("runtime.gopark", "/runtime/proc.go", 400),
            Frame::new("main.worker", "/main.go", 10),
        ];
        assert_eq!(evaluate_name(&trace, &[]), "runtime.gopark");
    }

    #[test]
    fn skip_consumes_leading_frames() {
        let trace = vec![
            Frame::new("runtime.gopark", "/runtime/proc.go", 400),
            Frame::new("main.worker", "/main.go", 10),
        ];
        let rules = vec![rule_skip("runtime.")];
        assert_eq!(evaluate_name(&trace, &rules), "main.worker");
    }

    #[test]
    fn fold_dedupes_repeated_prefix() {
        let trace = vec![
            Frame::new("sync.(*WaitGroup).Wait", "/sync/waitgroup.go", 130),
            Frame::new("sync.(*WaitGroup).Wait", "/sync/waitgroup.go", 140),
            Frame::new("main.worker", "/main.go", 10),
        ];
        let rules = vec![rule_fold("sync.(*WaitGroup).Wait", "waitgroup", None)];
        assert_eq!(evaluate_name(&trace, &rules), "waitgroup → main.worker");
    }

    #[test]
    fn trim_strips_literal_prefix() {
        let trace = vec![Frame::new("main.worker", "/main.go", 10)];
        let rules = vec![NameRule::Trim(TrimPattern::parse("main.").unwrap())];
        assert_eq!(evaluate_name(&trace, &rules), "worker");
    }

    #[test]
    fn trim_substitution_literal() {
        let trace = vec![Frame::new("main.worker", "/main.go", 10)];
        let rules = vec![NameRule::Trim(TrimPattern::parse("s/^main\\.//").unwrap())];
        assert_eq!(evaluate_name(&trace, &rules), "worker");
    }

    #[test]
    fn find_lookahead_picks_largest_index() {
        let trace = vec![
            Frame::new("runtime.selectgo", "/runtime/select.go", 500),
            Frame::new("pkg.helper", "/pkg/helper.go", 5),
            Frame::new("main.worker", "/main.go", 10),
        ];
        let rules = vec![
            NameRule::Find {
                pattern: FramePattern::parse("pkg.").unwrap(),
                to: "helper".to_string(),
                while_pattern: None,
            },
            NameRule::Find {
                pattern: FramePattern::parse("main.").unwrap(),
                to: "worker".to_string(),
                while_pattern: None,
            },
        ];
        // frame 0 trims to "runtime.selectgo"; lookahead finds both "pkg."
        // (index 1) and "main." (index 2) — largest index wins ("worker").
        let name = evaluate_name(&trace, &rules);
        assert_eq!(name, "worker → runtime.selectgo");
    }

    #[test]
    fn stdlib_while_consumes_runtime_frames() {
        let trace = vec![
            Frame::new("sync.(*Mutex).Lock", "/sync/mutex.go", 80),
            Frame::new("sync.(*Mutex).lockSlow", "/sync/mutex.go", 150),
            Frame::new("runtime.futexsleep", "/runtime/os_linux.go", 60),
            Frame::new("main.worker", "/main.go", 10),
        ];
        let rules = vec![rule_fold("sync.(*Mutex).Lock", "mutex", Some("stdlib"))];
        assert_eq!(evaluate_name(&trace, &rules), "mutex → main.worker");
    }
}
