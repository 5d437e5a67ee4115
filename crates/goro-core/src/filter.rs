//! The user filter string: free text plus `wait:` wait-time predicates.

use crate::error::FilterParseError;

/// A parsed filter: at most one free-text query plus an optional wait-time
/// bound and an optional "forced" goroutine id (one that must always match,
/// set by the caller outside of string parsing — e.g. to keep a
/// user-selected goroutine visible).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub text: String,
    pub min_wait: Option<u32>,
    pub max_wait: Option<u32>,
    pub forced_goroutine: Option<String>,
}

impl Filter {
    /// Parses a whitespace-split filter string. Tokens beginning with
    /// `wait:` are predicates; at most one other token is permitted (the
    /// free-text query).
    pub fn parse(input: &str) -> Result<Self, FilterParseError> {
        let mut text: Option<&str> = None;
        let mut min_wait = None;
        let mut max_wait = None;
        let mut saw_exact = false;
        let mut saw_bound = false;

        for token in input.split_whitespace() {
            if let Some(predicate) = token.strip_prefix("wait:") {
                let (tok_min, tok_max, is_exact) = parse_wait_predicate(token, predicate)?;
                let this_is_bound = !is_exact;

                if is_exact && (saw_exact || saw_bound) {
                    return Err(FilterParseError::new(token, "cannot combine an exact wait: with another wait: token"));
                }
                if this_is_bound && saw_exact {
                    return Err(FilterParseError::new(token, "cannot combine an exact wait: with another wait: token"));
                }
                if let Some(new_min) = tok_min {
                    if min_wait.is_some() {
                        return Err(FilterParseError::new(token, "multiple lower wait: bounds"));
                    }
                    min_wait = Some(new_min);
                }
                if let Some(new_max) = tok_max {
                    if max_wait.is_some() {
                        return Err(FilterParseError::new(token, "multiple upper wait: bounds"));
                    }
                    max_wait = Some(new_max);
                }
                saw_exact |= is_exact;
                saw_bound |= this_is_bound;
            } else {
                if text.is_some() {
                    return Err(FilterParseError::new(token, "at most one free-text token is permitted"));
                }
                text = Some(token);
            }
        }

        if let (Some(min), Some(max)) = (min_wait, max_wait) {
            if min > max {
                return Err(FilterParseError::new(input, "wait: lower bound exceeds upper bound"));
            }
        }

        Ok(Filter {
            text: text.unwrap_or("").to_string(),
            min_wait,
            max_wait,
            forced_goroutine: None,
        })
    }

    /// Returns a copy of this filter with `forced_goroutine` set, used to
    /// keep a specific goroutine visible regardless of text/wait matching.
    pub fn with_forced_goroutine(mut self, id: impl Into<String>) -> Self {
        self.forced_goroutine = Some(id.into());
        self
    }

    pub fn is_empty_text(&self) -> bool {
        self.text.is_empty()
    }

    /// True if `wait_minutes` satisfies this filter's wait-time bounds (a
    /// filter with no bounds matches everything).
    pub fn wait_matches(&self, wait_minutes: u32) -> bool {
        self.min_wait.map_or(true, |min| wait_minutes >= min) && self.max_wait.map_or(true, |max| wait_minutes <= max)
    }
}

/// Parses one `wait:...` token. Returns `(min, max, is_exact)`.
fn parse_wait_predicate(token: &str, predicate: &str) -> Result<(Option<u32>, Option<u32>, bool), FilterParseError> {
    if let Some(rest) = predicate.strip_prefix('>') {
        let n = parse_non_negative(token, rest)?;
        return Ok((Some(n.saturating_add(1)), None, false));
    }
    if let Some(rest) = predicate.strip_prefix('<') {
        let n = parse_non_negative(token, rest)?;
        if n == 0 {
            return Err(FilterParseError::new(token, "negative wait: bound"));
        }
        return Ok((None, Some(n - 1), false));
    }
    if let Some(rest) = predicate.strip_suffix('+') {
        let n = parse_non_negative(token, rest)?;
        return Ok((Some(n), None, false));
    }
    if let Some((a, b)) = predicate.split_once('-') {
        let min = parse_non_negative(token, a)?;
        let max = parse_non_negative(token, b)?;
        if min > max {
            return Err(FilterParseError::new(token, "wait: range lower bound exceeds upper bound"));
        }
        return Ok((Some(min), Some(max), false));
    }
    let n = parse_non_negative(token, predicate)?;
    Ok((Some(n), Some(n), true))
}

fn parse_non_negative(token: &str, raw: &str) -> Result<u32, FilterParseError> {
    if raw.starts_with('-') {
        return Err(FilterParseError::new(token, "negative wait: bound"));
    }
    raw.parse::<u32>()
        .map_err(|_| FilterParseError::new(token, "malformed wait: bound"))
}
