//! Indented ASCII tree rendering: category -> stack -> file section -> group.

use goro_core::ProfileCollection;
use std::fmt::Write;

/// Renders the loaded taxonomy as an indented tree. Only entries whose
/// `matches` flag is set are shown, mirroring the filtered/pinned view the
/// core maintains: a category/stack/section/group/goroutine with zero
/// matches is considered hidden.
pub fn format_tree(collection: &ProfileCollection) -> String {
    let mut out = String::new();

    let mut categories: Vec<_> = collection.categories().filter(|c| c.counts.matches > 0).collect();
    categories.sort_by(|a, b| b.counts.matches.cmp(&a.counts.matches).then_with(|| a.name.cmp(&b.name)));

    for category in categories {
        writeln!(
            out,
            "{}{} ({} matches / {} total)",
            category.name,
            if category.pinned { " *" } else { "" },
            category.counts.matches,
            category.counts.total,
        )
        .unwrap();

        let mut stacks: Vec<_> = category
            .stacks
            .iter()
            .filter_map(|&idx| collection.stack_at(idx))
            .filter(|s| s.counts.matches > 0)
            .collect();
        stacks.sort_by(|a, b| b.counts.matches.cmp(&a.counts.matches));

        for stack in stacks {
            writeln!(
                out,
                "  {} [{}]{} ({} matches / {} total)",
                stack.name,
                stack.stack_id,
                if stack.pinned { " *" } else { "" },
                stack.counts.matches,
                stack.counts.total,
            )
            .unwrap();

            for section in stack.files.iter().filter(|s| s.counts.matches > 0) {
                writeln!(
                    out,
                    "    {} ({} matches / {} total)",
                    section.file_name, section.counts.matches, section.counts.total,
                )
                .unwrap();

                for group in section.groups.iter().filter(|g| g.counts.matches > 0) {
                    let labels = if group.labels.is_empty() {
                        String::new()
                    } else {
                        format!(" {{{}}}", group.labels.join(", "))
                    };
                    writeln!(
                        out,
                        "      group{}{} ({} matches / {} total)",
                        labels,
                        if group.pinned { " *" } else { "" },
                        group.counts.matches,
                        group.counts.total,
                    )
                    .unwrap();

                    for goroutine in group.goroutines.iter().filter_map(|&idx| collection.goroutine_at(idx)) {
                        if !goroutine.matches {
                            continue;
                        }
                        writeln!(
                            out,
                            "        #{}{} {}",
                            goroutine.id,
                            if goroutine.pinned { " *" } else { "" },
                            goroutine.state,
                        )
                        .unwrap();
                    }
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use goro_core::parser::per_goroutine;

    #[test]
    fn renders_nested_tree() {
        let mut collection = ProfileCollection::new();
        let parsed = per_goroutine::parse(
            "goroutine 1 [running]:\nmain.worker()\n\t/main.go:10\n",
            "stacks.txt",
            None,
        )
        .unwrap();
        collection.add_file(parsed, Some("A".to_string())).unwrap();

        let tree = format_tree(&collection);
        assert!(tree.contains("main.worker") || tree.contains("worker"));
        assert!(tree.contains("#1"));
    }

    #[test]
    fn filtered_out_entries_are_omitted() {
        let mut collection = ProfileCollection::new();
        let parsed = per_goroutine::parse(
            "goroutine 1 [running]:\nmain.worker()\n\t/main.go:10\n",
            "stacks.txt",
            None,
        )
        .unwrap();
        collection.add_file(parsed, Some("A".to_string())).unwrap();
        collection.set_filter(goro_core::Filter::parse("doesnotmatch").unwrap());

        let tree = format_tree(&collection);
        assert!(tree.is_empty());
    }
}
