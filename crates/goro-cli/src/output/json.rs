//! JSON output formatting: a fully nested snapshot of the loaded taxonomy.

use goro_core::collection::{Counts, FileSection, Group};
use goro_core::ProfileCollection;
use serde::Serialize;

#[derive(Serialize)]
struct CollectionView {
    files: Vec<String>,
    categories: Vec<CategoryView>,
}

#[derive(Serialize)]
struct CategoryView {
    category_id: usize,
    name: String,
    pinned: bool,
    counts: Counts,
    stacks: Vec<StackView>,
}

#[derive(Serialize)]
struct StackView {
    stack_id: String,
    name: String,
    pinned: bool,
    counts: Counts,
    searchable_text: String,
    trace: Vec<goro_core::Frame>,
    files: Vec<FileSectionView>,
}

#[derive(Serialize)]
struct FileSectionView {
    section_id: usize,
    file_name: String,
    counts: Counts,
    groups: Vec<GroupView>,
}

#[derive(Serialize)]
struct GroupView {
    group_id: usize,
    labels: Vec<String>,
    pinned: bool,
    counts: Counts,
    goroutines: Vec<GoroutineView>,
}

#[derive(Serialize)]
struct GoroutineView {
    id: String,
    state: String,
    wait_minutes: u32,
    creator_id: String,
    creator_exists: bool,
    created: Vec<String>,
    matches: bool,
    pinned: bool,
}

fn build_view(collection: &ProfileCollection) -> CollectionView {
    CollectionView {
        files: collection.file_names(),
        categories: collection
            .categories()
            .map(|category| CategoryView {
                category_id: category.category_id,
                name: category.name.clone(),
                pinned: category.pinned,
                counts: category.counts,
                stacks: category
                    .stacks
                    .iter()
                    .filter_map(|&idx| collection.stack_at(idx))
                    .map(|stack| StackView {
                        stack_id: stack.stack_id.clone(),
                        name: stack.name.clone(),
                        pinned: stack.pinned,
                        counts: stack.counts,
                        searchable_text: stack.searchable_text.clone(),
                        trace: stack.trace.clone(),
                        files: stack.files.iter().map(|s| file_section_view(s, collection)).collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn file_section_view(section: &FileSection, collection: &ProfileCollection) -> FileSectionView {
    FileSectionView {
        section_id: section.section_id,
        file_name: section.file_name.clone(),
        counts: section.counts,
        groups: section.groups.iter().map(|g| group_view(g, collection)).collect(),
    }
}

fn group_view(group: &Group, collection: &ProfileCollection) -> GroupView {
    GroupView {
        group_id: group.group_id,
        labels: group.labels.clone(),
        pinned: group.pinned,
        counts: group.counts,
        goroutines: group
            .goroutines
            .iter()
            .filter_map(|&idx| collection.goroutine_at(idx))
            .map(|g| GoroutineView {
                id: g.id.clone(),
                state: g.state.clone(),
                wait_minutes: g.wait_minutes,
                creator_id: g.creator_id.clone(),
                creator_exists: g.creator_exists,
                created: g.created.clone(),
                matches: g.matches,
                pinned: g.pinned,
            })
            .collect(),
    }
}

/// Renders the full taxonomy as JSON. `compact` suppresses pretty-printing.
pub fn format_json(collection: &ProfileCollection, compact: bool) -> serde_json::Result<String> {
    let view = build_view(collection);
    if compact {
        serde_json::to_string(&view)
    } else {
        serde_json::to_string_pretty(&view)
    }
}

/// Renders the full taxonomy as a [`serde_json::Value`], for embedding in
/// API responses (`crate::server::api`).
pub fn collection_snapshot(collection: &ProfileCollection) -> serde_json::Value {
    serde_json::to_value(build_view(collection)).expect("view serialization cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use goro_core::parser::per_goroutine;

    #[test]
    fn renders_nested_json() {
        let mut collection = ProfileCollection::new();
        let parsed = per_goroutine::parse(
            "goroutine 1 [running]:\nmain.worker()\n\t/main.go:10\n",
            "stacks.txt",
            None,
        )
        .unwrap();
        collection.add_file(parsed, Some("A".to_string())).unwrap();

        let json = format_json(&collection, false).unwrap();
        assert!(json.contains("\"categories\""));
        assert!(json.contains("\"id\": \"1\""));
    }

    #[test]
    fn compact_has_no_newlines() {
        let collection = ProfileCollection::new();
        let json = format_json(&collection, true).unwrap();
        assert!(!json.contains('\n'));
    }
}
