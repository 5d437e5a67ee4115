//! Human-readable table output formatting.

use goro_core::ProfileCollection;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use std::fmt::Write;
use tabled::{builder::Builder, settings::Style};

/// Format the collection summary as human-readable text with optional
/// colors: a per-category table followed by a per-file table.
pub fn format_table(collection: &ProfileCollection, use_colors: bool) -> String {
    let colored = use_colors && std::io::stdout().is_terminal();
    let mut out = String::new();

    write_header(&mut out, colored);
    write_category_table(&mut out, collection);
    write_file_table(&mut out, collection, colored);

    out
}

fn write_header(out: &mut String, colored: bool) {
    let title = "goroprof";
    let line = "─".repeat(40);
    if colored {
        writeln!(out, "{}", title.bold()).unwrap();
        writeln!(out, "{}", line.dimmed()).unwrap();
    } else {
        writeln!(out, "{title}").unwrap();
        writeln!(out, "{line}").unwrap();
    }
}

fn write_category_table(out: &mut String, collection: &ProfileCollection) {
    let stats = collection.stack_statistics();
    writeln!(
        out,
        "{} stacks, {} goroutines, {} matching",
        stats.total_stacks, stats.total_goroutines, stats.matching_goroutines
    )
    .unwrap();
    writeln!(out).unwrap();

    let mut builder = Builder::default();
    builder.push_record(["category", "stacks", "total", "matches", "filter", "pinned"]);

    let mut categories: Vec<_> = collection.categories().collect();
    categories.sort_by(|a, b| b.counts.total.cmp(&a.counts.total).then_with(|| a.name.cmp(&b.name)));

    for category in &categories {
        builder.push_record([
            category.name.clone(),
            category.stacks.len().to_string(),
            category.counts.total.to_string(),
            category.counts.matches.to_string(),
            category.counts.filter_matches.to_string(),
            if category.pinned { "yes".to_string() } else { String::new() },
        ]);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    writeln!(out, "{table}").unwrap();
}

fn write_file_table(out: &mut String, collection: &ProfileCollection, colored: bool) {
    let files = collection.file_statistics();
    if files.is_empty() {
        return;
    }
    writeln!(out).unwrap();
    let heading = "Files:";
    if colored {
        writeln!(out, "{}", heading.bold()).unwrap();
    } else {
        writeln!(out, "{heading}").unwrap();
    }

    let mut builder = Builder::default();
    builder.push_record(["file", "total", "matching"]);
    for file in &files {
        builder.push_record([
            file.file_name.clone(),
            file.total_goroutines.to_string(),
            file.matching_goroutines.to_string(),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    writeln!(out, "{table}").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use goro_core::parser::per_goroutine;

    #[test]
    fn renders_category_and_file_tables() {
        let mut collection = ProfileCollection::new();
        let parsed = per_goroutine::parse(
            "goroutine 1 [running]:\nmain.worker()\n\t/main.go:10\n",
            "stacks.txt",
            None,
        )
        .unwrap();
        collection.add_file(parsed, Some("A".to_string())).unwrap();

        let output = format_table(&collection, false);
        assert!(output.contains("goroprof"));
        assert!(output.contains("category"));
        assert!(output.contains("Files:"));
    }

    #[test]
    fn renders_empty_collection() {
        let collection = ProfileCollection::new();
        let output = format_table(&collection, false);
        assert!(output.contains("0 stacks, 0 goroutines"));
    }
}
