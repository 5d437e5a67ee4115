//! Builds an effective `RawSettings` document from CLI flags and optional
//! rule files, and loads dump sources into a `ProfileCollection`, reporting
//! every non-fatal error along the way. Shared by `parse` and `serve`.

use anyhow::{Context, Result};
use goro_core::{ParseError, ProfileCollection, RawSettings, Settings};
use std::path::{Path, PathBuf};

use crate::input::{read_sources, Source};

/// Flags common to `parse` and `serve` that shape the effective
/// configuration.
pub struct SettingsArgs<'a> {
    pub function_trim: &'a [String],
    pub file_trim: &'a [String],
    pub name_rules: Option<&'a PathBuf>,
    pub category_rules: Option<&'a PathBuf>,
    pub archive_path_pattern: Option<&'a str>,
}

/// Builds a [`RawSettings`] document from CLI flags, loading any
/// `--name-rules`/`--category-rules` JSON files.
pub fn build_raw_settings(args: &SettingsArgs) -> Result<RawSettings> {
    let mut raw = RawSettings {
        function_prefix_trims: args.function_trim.to_vec(),
        file_prefix_trims: args.file_trim.to_vec(),
        ..Default::default()
    };

    if let Some(path) = args.name_rules {
        raw.name_rules = load_rule_file(path).context("Failed to load --name-rules file")?;
    }
    if let Some(path) = args.category_rules {
        raw.category_rules = load_rule_file(path).context("Failed to load --category-rules file")?;
    }
    if let Some(pattern) = args.archive_path_pattern {
        raw.archive_path_pattern = pattern.to_string();
    }

    Ok(raw)
}

fn load_rule_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {} as JSON", path.display()))
}

/// Compiles `raw` into effective [`Settings`], printing any dropped-rule
/// [`ConfigError`]s to stderr. Dropping a rule is non-fatal: the rest of its
/// list still applies.
pub fn compile_settings(raw: &RawSettings) -> Settings {
    let (settings, errors) = Settings::compile(raw);
    for err in &errors {
        eprintln!("goroprof: warning: {err}");
    }
    settings
}

/// Reads every source under `paths`, parses each with `settings`'s
/// extraction patterns, and loads the ones that parse cleanly into a fresh
/// [`ProfileCollection`]. Parse failures and name collisions are printed to
/// stderr and the offending file is skipped; parsing remains atomic per file.
pub fn load_collection(paths: &[PathBuf], settings: Settings, archive_pattern: &regex::Regex) -> Result<ProfileCollection> {
    let sources = read_sources(paths, archive_pattern)?;
    let mut collection = ProfileCollection::with_settings(settings);
    for source in sources {
        load_one(&mut collection, source);
    }
    Ok(collection)
}

pub fn load_one(collection: &mut ProfileCollection, source: Source) {
    match goro_core::parse_file(&source.content, &source.name, &collection.settings().name_extraction_patterns) {
        Ok(parsed) => {
            if let Err(e) = collection.add_file(parsed, None) {
                eprintln!("goroprof: warning: {e}");
            }
        }
        Err(e) => print_parse_error(&source.name, &e),
    }
}

fn print_parse_error(name: &str, err: &ParseError) {
    eprintln!("goroprof: warning: failed to parse {name}: {err}");
}

/// Applies `--pin-category`/`--pin-stack` flags by name/id, ignoring names
/// that don't match a loaded category or stack.
pub fn apply_pins(collection: &mut ProfileCollection, pin_categories: &[String], pin_stacks: &[String]) {
    for name in pin_categories {
        if let Some(category_id) = collection
            .categories()
            .find(|c| &c.name == name)
            .map(|c| c.category_id)
        {
            collection.toggle_category_pin(category_id);
        } else {
            eprintln!("goroprof: warning: no category named {name:?} to pin");
        }
    }
    for stack_id in pin_stacks {
        let found = collection
            .categories()
            .flat_map(|c| c.stacks.iter().copied())
            .find(|&idx| collection.stack_at(idx).is_some_and(|s| &s.stack_id == stack_id));
        if let Some(idx) = found {
            collection.toggle_stack_pin(idx);
        } else {
            eprintln!("goroprof: warning: no stack with id {stack_id:?} to pin");
        }
    }
}
