//! The category DSL: picks a coarse category label for a stack from its
//! bottom-most non-skipped frame.

use crate::error::ConfigError;
use crate::frame::Frame;
use regex::Regex;

/// A compiled `Skip` prefix for the category DSL.
#[derive(Debug, Clone)]
pub struct SkipPattern(String);

impl SkipPattern {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    fn matches(&self, func: &str) -> bool {
        func.starts_with(self.0.as_str())
    }
}

/// A compiled `Match` expression: `<regex>[#N][ -- comment]`.
///
/// `N` selects which capture group supplies the category name (default 1;
/// `0` means the whole match). The trailing `-- comment` is cosmetic and
/// discarded at parse time.
#[derive(Debug, Clone)]
pub struct MatchRule {
    regex: Regex,
    group: usize,
}

impl MatchRule {
    /// Parses the `<regex>[#N][ -- comment]` textual form.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let without_comment = match raw.find(" -- ") {
            Some(idx) => &raw[..idx],
            None => raw,
        };
        let (pattern, group) = match without_comment.rfind('#') {
            Some(idx) if without_comment[idx + 1..].chars().all(|c| c.is_ascii_digit() ) && idx + 1 < without_comment.len() => {
                let group: usize = without_comment[idx + 1..]
                    .parse()
                    .map_err(|_| ConfigError::new(raw, "invalid capture group number"))?;
                (&without_comment[..idx], group)
            }
            _ => (without_comment, 1),
        };
        let regex = Regex::new(pattern).map_err(|e| ConfigError::new(raw, format!("invalid regex: {e}")))?;
        Ok(Self { regex, group })
    }

    /// Attempts the match against `func`, returning the captured category
    /// name on success.
    fn apply(&self, func: &str) -> Option<String> {
        let caps = self.regex.captures(func)?;
        if self.group == 0 {
            Some(caps.get(0)?.as_str().to_string())
        } else {
            caps.get(self.group).map(|m| m.as_str().to_string())
        }
    }
}

/// One rule in an ordered category rule list.
#[derive(Debug, Clone)]
pub enum CategoryRule {
    Skip(SkipPattern),
    Match(MatchRule),
}

/// The default fallback: a function name truncated at the first `/`, or the
/// whole name if it contains none.
fn fallback_category(func: &str) -> String {
    match func.find('/') {
        Some(idx) => func[..idx].to_string(),
        None => func.to_string(),
    }
}

fn skip_matches(rules: &[CategoryRule], func: &str) -> bool {
    rules
        .iter()
        .any(|r| matches!(r, CategoryRule::Skip(p) if p.matches(func)))
}

fn apply_match_rules(rules: &[CategoryRule], func: &str) -> Option<String> {
    rules.iter().find_map(|r| match r {
        CategoryRule::Match(m) => m.apply(func),
        CategoryRule::Skip(_) => None,
    })
}

/// Evaluates the category DSL against `trace`, scanning bottom-up for the
/// first frame not matched by any `Skip` rule, then applying `Match` rules
/// in order. Falls back to the top-most frame if every frame is skipped.
pub fn evaluate_category(trace: &[Frame], rules: &[CategoryRule]) -> String {
    let Some(last) = trace.last() else {
        return "unknown".to_string();
    };

    for frame in trace.iter().rev() {
        if skip_matches(rules, &frame.func) {
            continue;
        }
        return apply_match_rules(rules, &frame.func).unwrap_or_else(|| fallback_category(&frame.func));
    }

    // every frame skipped: fall back on the top-most frame
    apply_match_rules(rules, &trace[0].func).unwrap_or_else(|| fallback_category(&last.func))
}
