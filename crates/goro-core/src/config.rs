//! Effective configuration consumed by the profile model, and the compiler
//! that turns a serializable, user-authored rule set into it.
//!
//! A malformed rule produces a [`ConfigError`] but is non-fatal: it is
//! dropped, logged, and the remainder of the rule list still applies.

use crate::category::{CategoryRule, MatchRule, SkipPattern};
use crate::error::ConfigError;
use crate::naming::{FramePattern, NameRule, TrimPattern, WhilePattern};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Serializable naming rule, as authored by a user (e.g. in a JSON config
/// file). Compiles into [`NameRule`].
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NameRuleSpec {
    Skip { pattern: String },
    Trim { pattern: String },
    Fold {
        pattern: String,
        to: String,
        #[serde(default, rename = "while")]
        while_: Option<String>,
    },
    Find {
        pattern: String,
        to: String,
        #[serde(default, rename = "while")]
        while_: Option<String>,
    },
}

/// Serializable category rule, as authored by a user.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryRuleSpec {
    Skip { pattern: String },
    Match { expr: String },
}

/// A `(regex, replacement)` pair for extracting a display file name by
/// scanning the input. `replacement` supports `$N` capture interpolation and
/// a `hex:` prefix that re-interprets `$1` as base-16 before substitution.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ExtractionPatternSpec {
    pub pattern: String,
    pub replacement: String,
}

/// The raw, user-authored, serializable settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RawSettings {
    #[serde(default)]
    pub function_prefix_trims: Vec<String>,
    #[serde(default)]
    pub file_prefix_trims: Vec<String>,
    #[serde(default)]
    pub name_rules: Vec<NameRuleSpec>,
    #[serde(default)]
    pub category_rules: Vec<CategoryRuleSpec>,
    #[serde(default)]
    pub name_extraction_patterns: Vec<ExtractionPatternSpec>,
    #[serde(default = "default_archive_path_pattern")]
    pub archive_path_pattern: String,
}

fn default_archive_path_pattern() -> String {
    r"^(.*/)?stacks\.txt$".to_string()
}

/// An anchored regex applied to strip a leading path/prefix segment from a
/// frame's function or file.
#[derive(Debug, Clone)]
pub struct PrefixTrim(Regex);

impl PrefixTrim {
    fn compile(raw: &str) -> Result<Self, ConfigError> {
        let anchored = if raw.starts_with('^') {
            raw.to_string()
        } else {
            format!("^{raw}")
        };
        Regex::new(&anchored)
            .map(PrefixTrim)
            .map_err(|e| ConfigError::new(raw, format!("invalid regex: {e}")))
    }

    pub fn apply(&self, s: &str) -> String {
        self.0.replace(s, "").into_owned()
    }
}

/// A compiled `(regex, replacement)` name-extraction pattern: the first
/// pattern to match any input line wins; its replacement is interpolated
/// with that match's captures.
#[derive(Debug, Clone)]
pub struct ExtractionPattern {
    pub regex: Regex,
    pub replacement: String,
}

impl ExtractionPattern {
    fn compile(spec: &ExtractionPatternSpec) -> Result<Self, ConfigError> {
        let regex = Regex::new(&spec.pattern)
            .map_err(|e| ConfigError::new(&spec.pattern, format!("invalid regex: {e}")))?;
        Ok(Self {
            regex,
            replacement: spec.replacement.clone(),
        })
    }

    /// Applies this pattern's replacement to the first line it matches,
    /// honoring the `hex:` prefix that re-interprets `$1` as base-16 before
    /// substitution.
    pub fn apply(&self, line: &str) -> Option<String> {
        let caps = self.regex.captures(line)?;
        if let Some(hex_repl) = self.replacement.strip_prefix("hex:") {
            let cap1 = caps.get(1)?.as_str();
            let decimal = u64::from_str_radix(cap1, 16).ok()?;
            let interpolated = interpolate(hex_repl, &caps, Some(decimal.to_string().as_str()));
            Some(interpolated)
        } else {
            Some(interpolate(&self.replacement, &caps, None))
        }
    }
}

/// Interpolates `$N` references in `template` against `caps`. When
/// `hex_override` is set, `$1` is replaced with it instead of the raw
/// capture (used by the `hex:` prefix form).
fn interpolate(template: &str, caps: &regex::Captures<'_>, hex_override: Option<&str>) -> String {
    let mut out = String::new();
    let mut chars = template.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '$' {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_ascii_digit() {
                    let start = i + 1;
                    let mut end = start;
                    let bytes = template.as_bytes();
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                    let n: usize = template[start..end].parse().unwrap_or(0);
                    if n == 1 {
                        if let Some(over) = hex_override {
                            out.push_str(over);
                        } else if let Some(m) = caps.get(n) {
                            out.push_str(m.as_str());
                        }
                    } else if let Some(m) = caps.get(n) {
                        out.push_str(m.as_str());
                    }
                    for _ in start..end {
                        chars.next();
                    }
                    continue;
                }
            }
            out.push('$');
        } else {
            out.push(c);
        }
    }
    out
}

/// The compiled, effective configuration consumed by the core.
#[derive(Debug, Clone)]
pub struct Settings {
    pub function_prefix_trims: Vec<PrefixTrim>,
    pub file_prefix_trims: Vec<PrefixTrim>,
    pub name_rules: Vec<NameRule>,
    pub category_rules: Vec<CategoryRule>,
    pub name_extraction_patterns: Vec<ExtractionPattern>,
    pub archive_path_pattern: Regex,
}

impl Settings {
    /// Compiles a [`RawSettings`] document into effective [`Settings`].
    ///
    /// Each rule list is validated independently; a malformed entry yields a
    /// [`ConfigError`] and is dropped, but does not prevent the remaining
    /// valid rules in that same list (or other lists) from compiling.
    pub fn compile(raw: &RawSettings) -> (Settings, Vec<ConfigError>) {
        let mut errors = Vec::new();

        let function_prefix_trims = compile_list(&raw.function_prefix_trims, &mut errors, |s| PrefixTrim::compile(s));
        let file_prefix_trims = compile_list(&raw.file_prefix_trims, &mut errors, |s| PrefixTrim::compile(s));
        let name_rules = compile_list(&raw.name_rules, &mut errors, compile_name_rule);
        let category_rules = compile_list(&raw.category_rules, &mut errors, compile_category_rule);
        let name_extraction_patterns =
            compile_list(&raw.name_extraction_patterns, &mut errors, |s| ExtractionPattern::compile(s));

        let archive_path_pattern = Regex::new(&raw.archive_path_pattern).unwrap_or_else(|e| {
            errors.push(ConfigError::new(&raw.archive_path_pattern, format!("invalid regex: {e}")));
            Regex::new(&default_archive_path_pattern()).expect("default archive pattern is valid")
        });

        (
            Settings {
                function_prefix_trims,
                file_prefix_trims,
                name_rules,
                category_rules,
                name_extraction_patterns,
                archive_path_pattern,
            },
            errors,
        )
    }
}

fn compile_list<T, U>(
    items: &[T],
    errors: &mut Vec<ConfigError>,
    mut compile_one: impl FnMut(&T) -> Result<U, ConfigError>,
) -> Vec<U> {
    items
        .iter()
        .filter_map(|item| match compile_one(item) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(rule = %e.rule, reason = %e.reason, "dropping invalid config rule");
                errors.push(e);
                None
            }
        })
        .collect()
}

fn compile_name_rule(spec: &NameRuleSpec) -> Result<NameRule, ConfigError> {
    Ok(match spec {
        NameRuleSpec::Skip { pattern } => NameRule::Skip(FramePattern::parse(pattern)?),
        NameRuleSpec::Trim { pattern } => NameRule::Trim(TrimPattern::parse(pattern)?),
        NameRuleSpec::Fold { pattern, to, while_ } => NameRule::Fold {
            pattern: FramePattern::parse(pattern)?,
            to: to.clone(),
            while_pattern: while_.as_deref().map(WhilePattern::parse).transpose()?,
        },
        NameRuleSpec::Find { pattern, to, while_ } => NameRule::Find {
            pattern: FramePattern::parse(pattern)?,
            to: to.clone(),
            while_pattern: while_.as_deref().map(WhilePattern::parse).transpose()?,
        },
    })
}

fn compile_category_rule(spec: &CategoryRuleSpec) -> Result<CategoryRule, ConfigError> {
    Ok(match spec {
        CategoryRuleSpec::Skip { pattern } => CategoryRule::Skip(SkipPattern::new(pattern.clone())),
        CategoryRuleSpec::Match { expr } => CategoryRule::Match(MatchRule::parse(expr)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_empty_raw_settings_without_errors() {
        let (settings, errors) = Settings::compile(&RawSettings::default());
        assert!(errors.is_empty());
        assert!(settings.name_rules.is_empty());
        assert!(settings.archive_path_pattern.is_match("foo/stacks.txt"));
    }

    #[test]
    fn invalid_rule_is_dropped_but_remainder_compiles() {
        let raw = RawSettings {
            name_rules: vec![
                NameRuleSpec::Skip { pattern: "regex:(".to_string() },
                NameRuleSpec::Skip { pattern: "runtime.".to_string() },
            ],
            ..Default::default()
        };
        let (settings, errors) = Settings::compile(&raw);
        assert_eq!(errors.len(), 1);
        assert_eq!(settings.name_rules.len(), 1);
    }

    #[test]
    fn extraction_pattern_interpolates_capture() {
        let spec = ExtractionPatternSpec {
            pattern: r"^pod: (\S+)$".to_string(),
            replacement: "$1".to_string(),
        };
        let pattern = ExtractionPattern::compile(&spec).unwrap();
        assert_eq!(pattern.apply("pod: worker-7"), Some("worker-7".to_string()));
        assert_eq!(pattern.apply("other line"), None);
    }

    #[test]
    fn extraction_pattern_hex_prefix_reinterprets_capture() {
        let spec = ExtractionPatternSpec {
            pattern: r"^shard-([0-9a-fA-F]+)$".to_string(),
            replacement: "hex:shard-$1".to_string(),
        };
        let pattern = ExtractionPattern::compile(&spec).unwrap();
        assert_eq!(pattern.apply("shard-1a"), Some("shard-26".to_string()));
    }

    #[test]
    fn prefix_trim_strips_anchored_match() {
        let trim = PrefixTrim::compile(r"github\.com/acme/").unwrap();
        assert_eq!(trim.apply("github.com/acme/widget.Run"), "widget.Run");
        assert_eq!(trim.apply("other.Func"), "other.Func");
    }
}
