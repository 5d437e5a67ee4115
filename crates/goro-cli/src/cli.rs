//! CLI argument parsing using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// goroprof - inspector for Go goroutine dump profiles
#[derive(Parser, Debug)]
#[command(name = "goroprof")]
#[command(about = "Parse, dedupe and inspect Go goroutine dumps", long_about = None)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse one or more dumps and print a summary
    Parse(ParseArgs),
    /// Serve a collection over a local HTTP API, re-parsing on file change
    #[cfg(feature = "serve")]
    Serve(ServeArgs),
}

#[derive(Parser, Debug)]
pub struct ParseArgs {
    /// Dump files, directories, or zip archives to load
    #[arg(value_name = "PATHS", required = true)]
    pub paths: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Filter string: free text plus `wait:` predicates (see README)
    #[arg(long)]
    pub filter: Option<String>,

    /// Pin a category by name before printing the summary (repeatable)
    #[arg(long = "pin-category", value_name = "NAME")]
    pub pin_category: Vec<String>,

    /// Pin a stack by id before printing the summary (repeatable)
    #[arg(long = "pin-stack", value_name = "STACK_ID")]
    pub pin_stack: Vec<String>,

    /// Anchored regex stripped from the start of a frame's function name
    /// (repeatable, first match per frame wins)
    #[arg(long = "function-trim", value_name = "REGEX")]
    pub function_trim: Vec<String>,

    /// Anchored regex stripped from the start of a frame's file path
    /// (repeatable, first match per frame wins)
    #[arg(long = "file-trim", value_name = "REGEX")]
    pub file_trim: Vec<String>,

    /// JSON file of name rules (overrides the built-in defaults)
    #[arg(long = "name-rules", value_name = "FILE")]
    pub name_rules: Option<PathBuf>,

    /// JSON file of category rules (overrides the built-in defaults)
    #[arg(long = "category-rules", value_name = "FILE")]
    pub category_rules: Option<PathBuf>,

    /// Regex filtering which archive entries are treated as dumps
    #[arg(long = "archive-path-pattern", value_name = "REGEX")]
    pub archive_path_pattern: Option<String>,

    /// Compact JSON output (no pretty-printing); ignored for other formats
    #[arg(long)]
    pub compact: bool,
}

#[cfg(feature = "serve")]
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Dump files, directories, or zip archives to load and watch
    #[arg(value_name = "PATHS", required = true)]
    pub paths: Vec<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value = "4747")]
    pub port: u16,

    /// JSON file of name rules (overrides the built-in defaults)
    #[arg(long = "name-rules", value_name = "FILE")]
    pub name_rules: Option<PathBuf>,

    /// JSON file of category rules (overrides the built-in defaults)
    #[arg(long = "category-rules", value_name = "FILE")]
    pub category_rules: Option<PathBuf>,

    /// Anchored regex stripped from the start of a frame's function name
    /// (repeatable, first match per frame wins)
    #[arg(long = "function-trim", value_name = "REGEX")]
    pub function_trim: Vec<String>,

    /// Anchored regex stripped from the start of a frame's file path
    /// (repeatable, first match per frame wins)
    #[arg(long = "file-trim", value_name = "REGEX")]
    pub file_trim: Vec<String>,

    /// Regex filtering which archive entries are treated as dumps
    #[arg(long = "archive-path-pattern", value_name = "REGEX")]
    pub archive_path_pattern: Option<String>,
}

/// Output format options for `goroprof parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format (default)
    Table,
    /// JSON output of the full taxonomy
    Json,
    /// Indented ASCII tree: category -> stack -> file section -> group
    Tree,
}
