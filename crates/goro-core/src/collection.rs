//! `ProfileCollection`: owns every loaded file's taxonomy (categories,
//! unique stacks, file sections, groups, goroutines), assigns stable ids,
//! deduplicates stacks by fingerprint, and evaluates hierarchical filter and
//! pin state.

use crate::config::{RawSettings, Settings};
use crate::error::{ConfigError, DuplicateFileNameError};
use crate::filter::Filter;
use crate::frame::{fingerprint, searchable_text, Frame};
use crate::parser::{ParsedFile, ParsedGroup};
use crate::{category, naming};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Visibility and aggregation counters carried at every taxonomy level.
///
/// `0 <= matches <= total`; `filterMatches <= matches` (pinned contributions
/// count toward `matches` but not `filterMatches`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Counts {
    pub total: usize,
    pub matches: usize,
    pub prior_matches: usize,
    pub filter_matches: usize,
}

impl Counts {
    fn unfiltered(total: usize) -> Self {
        Counts {
            total,
            matches: total,
            prior_matches: total,
            filter_matches: total,
        }
    }

    fn sum(children: impl Iterator<Item = Counts>) -> Self {
        let mut acc = Counts::default();
        for c in children {
            acc.total += c.total;
            acc.matches += c.matches;
            acc.prior_matches += c.prior_matches;
            acc.filter_matches += c.filter_matches;
        }
        acc
    }
}

/// One goroutine, with a non-owning back-reference to its [`UniqueStack`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Goroutine {
    pub id: String,
    pub state: String,
    pub wait_minutes: u32,
    pub creator_id: String,
    pub creator_exists: bool,
    pub created: Vec<String>,
    pub matches: bool,
    pub pinned: bool,
    pub stack_idx: usize,
    #[serde(skip)]
    raw_id: u64,
    #[serde(skip)]
    file_id: usize,
}

/// Within a file section, goroutines sharing the same labels (dialect A) or
/// state (dialect B).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Group {
    pub group_id: usize,
    pub labels: Vec<String>,
    pub goroutines: Vec<usize>,
    pub pinned: bool,
    pub counts: Counts,
}

/// The portion of a [`UniqueStack`] contributed by a single loaded file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileSection {
    pub section_id: usize,
    pub file_id: usize,
    pub file_name: String,
    pub groups: Vec<Group>,
    pub counts: Counts,
}

/// The set of all goroutines sharing a fingerprint, across all loaded files.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UniqueStack {
    pub stack_id: String,
    pub name: String,
    pub trace: Vec<Frame>,
    pub files: Vec<FileSection>,
    pub counts: Counts,
    pub searchable_text: String,
    pub pinned: bool,
    #[serde(skip)]
    category_idx: usize,
}

/// A coarse bucket (typically a package prefix) under which stacks are
/// listed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Category {
    pub category_id: usize,
    pub name: String,
    pub stacks: Vec<usize>,
    pub counts: Counts,
    pub pinned: bool,
}

struct LoadedFile {
    file_id: usize,
    display_name: String,
    parsed: ParsedFile,
}

/// Summary returned by [`ProfileCollection::file_statistics`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileStatistics {
    pub file_name: String,
    pub total_goroutines: usize,
    pub matching_goroutines: usize,
}

/// Summary returned by [`ProfileCollection::stack_statistics`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct StackStatistics {
    pub total_stacks: usize,
    pub total_goroutines: usize,
    pub matching_goroutines: usize,
}

/// Owns all loaded files' taxonomy and evaluates filter/pin state.
pub struct ProfileCollection {
    settings: Settings,
    categories: Vec<Option<Category>>,
    stacks: Vec<Option<UniqueStack>>,
    goroutines: Vec<Option<Goroutine>>,
    category_index: HashMap<String, usize>,
    fingerprint_index: HashMap<String, usize>,
    goroutine_index: HashMap<String, usize>,
    loaded_files: Vec<LoadedFile>,
    next_file_id: usize,
    next_section_id: usize,
    next_group_id: usize,
    current_filter: Filter,
}

impl Default for ProfileCollection {
    fn default() -> Self {
        let (settings, _) = Settings::compile(&RawSettings::default());
        Self::with_settings(settings)
    }
}

impl ProfileCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            categories: Vec::new(),
            stacks: Vec::new(),
            goroutines: Vec::new(),
            category_index: HashMap::new(),
            fingerprint_index: HashMap::new(),
            goroutine_index: HashMap::new(),
            loaded_files: Vec::new(),
            next_file_id: 0,
            next_section_id: 0,
            next_group_id: 0,
            current_filter: Filter::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn file_count(&self) -> usize {
        self.loaded_files.len()
    }

    /// Ingests a parsed file into the collection.
    pub fn add_file(&mut self, parsed: ParsedFile, custom_name: Option<String>) -> Result<(), DuplicateFileNameError> {
        let display_name = custom_name
            .or_else(|| parsed.extracted_name.clone())
            .unwrap_or_else(|| parsed.original_name.clone());

        if self.loaded_files.iter().any(|f| f.display_name == display_name) {
            return Err(DuplicateFileNameError(display_name));
        }

        let file_id = self.next_file_id;
        self.next_file_id += 1;

        let was_single = self.loaded_files.len() == 1;
        let will_be_multi = self.loaded_files.len() + 1 > 1;

        if was_single && will_be_multi {
            let existing_file_id = self.loaded_files[0].file_id;
            self.reprefix_file(existing_file_id, true);
        }

        self.ingest_groups(&parsed, file_id, &display_name, will_be_multi);

        self.loaded_files.push(LoadedFile {
            file_id,
            display_name,
            parsed,
        });

        self.recompute_counts();
        Ok(())
    }

    fn ingest_groups(&mut self, parsed: &ParsedFile, file_id: usize, display_name: &str, prefix_mode: bool) {
        let file_raw_ids: HashSet<u64> = parsed
            .groups
            .iter()
            .flat_map(|g| g.goroutines.iter().map(|pg| pg.id))
            .collect();

        let mut children_of: HashMap<u64, Vec<u64>> = HashMap::new();
        for group in &parsed.groups {
            for pg in &group.goroutines {
                if let Some(creator) = pg.creator_id {
                    children_of.entry(creator).or_default().push(pg.id);
                }
            }
        }

        for group in &parsed.groups {
            self.ingest_one_group(group, file_id, display_name, prefix_mode, &file_raw_ids, &children_of);
        }
    }

    fn ingest_one_group(
        &mut self,
        group: &ParsedGroup,
        file_id: usize,
        display_name: &str,
        prefix_mode: bool,
        file_raw_ids: &HashSet<u64>,
        children_of: &HashMap<u64, Vec<u64>>,
    ) {
        let trimmed_trace: Vec<Frame> = group
            .trace
            .iter()
            .map(|f| self.apply_trims(f))
            .collect();
        let trace_fingerprint = fingerprint(&trimmed_trace);

        let stack_idx = match self.fingerprint_index.get(&trace_fingerprint) {
            Some(&idx) => idx,
            None => self.create_stack(trace_fingerprint.clone(), trimmed_trace),
        };

        let section_id = self.next_section_id;
        self.next_section_id += 1;
        let group_id = self.next_group_id;
        self.next_group_id += 1;

        let mut goroutine_indices = Vec::with_capacity(group.goroutines.len());
        for pg in &group.goroutines {
            let display_id = Self::format_id(display_name, pg.id, prefix_mode);
            let creator_display = pg.creator_id.map(|c| Self::format_id(display_name, c, prefix_mode));
            let creator_exists = pg.creator_id.is_some_and(|c| file_raw_ids.contains(&c));
            let created = children_of
                .get(&pg.id)
                .into_iter()
                .flatten()
                .map(|&child| Self::format_id(display_name, child, prefix_mode))
                .collect();

            let goroutine = Goroutine {
                id: display_id.clone(),
                state: group.state.clone(),
                wait_minutes: pg.wait_minutes,
                creator_id: creator_display.unwrap_or_default(),
                creator_exists,
                created,
                matches: true,
                pinned: false,
                stack_idx,
                raw_id: pg.id,
                file_id,
            };
            let idx = self.goroutines.len();
            self.goroutines.push(Some(goroutine));
            self.goroutine_index.insert(display_id, idx);
            goroutine_indices.push(idx);
        }

        let new_section = FileSection {
            section_id,
            file_id,
            file_name: display_name.to_string(),
            groups: vec![Group {
                group_id,
                labels: group.labels.clone(),
                goroutines: goroutine_indices,
                pinned: false,
                counts: Counts::unfiltered(group.count),
            }],
            counts: Counts::unfiltered(group.count),
        };

        let stack = self.stacks[stack_idx].as_mut().expect("stack_idx valid");
        match stack.files.iter_mut().find(|s| s.file_id == file_id) {
            Some(existing) => {
                existing.groups.push(new_section.groups.into_iter().next().unwrap());
            }
            None => stack.files.push(new_section),
        }
    }

    fn format_id(display_name: &str, raw_id: u64, prefix_mode: bool) -> String {
        if prefix_mode {
            format!("{display_name}.{raw_id}")
        } else {
            raw_id.to_string()
        }
    }

    fn apply_trims(&self, frame: &Frame) -> Frame {
        let mut func = frame.func.clone();
        for trim in &self.settings.function_prefix_trims {
            let trimmed = trim.apply(&func);
            if trimmed != func {
                func = trimmed;
                break;
            }
        }
        let mut file = frame.file.clone();
        for trim in &self.settings.file_prefix_trims {
            let trimmed = trim.apply(&file);
            if trimmed != file {
                file = trimmed;
                break;
            }
        }
        Frame::new(func, file, frame.line)
    }

    fn create_stack(&mut self, trace_fingerprint: String, trimmed_trace: Vec<Frame>) -> usize {
        let name = naming::evaluate_name(&trimmed_trace, &self.settings.name_rules);
        let searchable = searchable_text(&trimmed_trace);
        let category_name = category::evaluate_category(&trimmed_trace, &self.settings.category_rules);
        let category_idx = self.find_or_create_category(category_name);

        let stack_idx = self.stacks.len();
        self.stacks.push(Some(UniqueStack {
            stack_id: format!("s{trace_fingerprint}"),
            name,
            trace: trimmed_trace,
            files: Vec::new(),
            counts: Counts::default(),
            searchable_text: searchable,
            pinned: false,
            category_idx,
        }));
        self.fingerprint_index.insert(trace_fingerprint, stack_idx);

        let category = self.categories[category_idx].as_mut().expect("category_idx valid");
        category.stacks.push(stack_idx);
        stack_idx
    }

    fn find_or_create_category(&mut self, name: String) -> usize {
        if let Some(&idx) = self.category_index.get(&name) {
            return idx;
        }
        let idx = self.categories.len();
        self.categories.push(Some(Category {
            category_id: idx,
            name: name.clone(),
            stacks: Vec::new(),
            counts: Counts::default(),
            pinned: false,
        }));
        self.category_index.insert(name, idx);
        idx
    }

    /// Rewrites every goroutine id/creator-id/created-list entry belonging
    /// to `file_id` to/from the `<fileName>.<rawId>` form. Unloading back to
    /// a single file restores bare ids.
    fn reprefix_file(&mut self, file_id: usize, prefix: bool) {
        let display_name = self
            .loaded_files
            .iter()
            .find(|f| f.file_id == file_id)
            .map(|f| f.display_name.clone())
            .unwrap_or_default();

        let mut rewritten: HashMap<u64, String> = HashMap::new();
        for goroutine in self.goroutines.iter().flatten() {
            if goroutine.file_id == file_id {
                rewritten.insert(goroutine.raw_id, Self::format_id(&display_name, goroutine.raw_id, prefix));
            }
        }

        // remove stale index entries before mutating ids
        let stale_ids: Vec<String> = self
            .goroutines
            .iter()
            .flatten()
            .filter(|g| g.file_id == file_id)
            .map(|g| g.id.clone())
            .collect();
        for id in stale_ids {
            self.goroutine_index.remove(&id);
        }

        for goroutine in self.goroutines.iter_mut().flatten() {
            if goroutine.file_id != file_id {
                continue;
            }
            goroutine.id = rewritten[&goroutine.raw_id].clone();
            if !goroutine.creator_id.is_empty() {
                if let Some(creator_raw) = parse_raw_suffix(&goroutine.creator_id) {
                    if let Some(new_id) = rewritten.get(&creator_raw) {
                        goroutine.creator_id = new_id.clone();
                    }
                }
            }
            goroutine.created = goroutine
                .created
                .iter()
                .map(|child_id| {
                    parse_raw_suffix(child_id)
                        .and_then(|raw| rewritten.get(&raw).cloned())
                        .unwrap_or_else(|| child_id.clone())
                })
                .collect();
        }

        for (idx, goroutine) in self.goroutines.iter().enumerate() {
            if let Some(g) = goroutine {
                if g.file_id == file_id {
                    self.goroutine_index.insert(g.id.clone(), idx);
                }
            }
        }
    }

    /// Drops a loaded file: removes its groups/sections, prunes stacks and
    /// categories that become empty, and restores bare ids if exactly one
    /// file remains.
    pub fn remove_file(&mut self, name: &str) {
        let Some(pos) = self.loaded_files.iter().position(|f| f.display_name == name) else {
            return;
        };
        let file_id = self.loaded_files[pos].file_id;
        self.loaded_files.remove(pos);

        let removed_goroutine_ids: Vec<String> = self
            .goroutines
            .iter()
            .flatten()
            .filter(|g| g.file_id == file_id)
            .map(|g| g.id.clone())
            .collect();
        for (idx, slot) in self.goroutines.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|g| g.file_id == file_id) {
                *slot = None;
            }
            let _ = idx;
        }
        for id in removed_goroutine_ids {
            self.goroutine_index.remove(&id);
        }

        for stack_slot in self.stacks.iter_mut() {
            if let Some(stack) = stack_slot {
                stack.files.retain(|s| s.file_id != file_id);
            }
        }

        let emptied_stack_ids: Vec<(usize, String, usize)> = self
            .stacks
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                slot.as_ref()
                    .filter(|s| s.files.is_empty())
                    .map(|s| (idx, s.stack_id.clone(), s.category_idx))
            })
            .collect();

        for (stack_idx, _stack_id, category_idx) in &emptied_stack_ids {
            self.stacks[*stack_idx] = None;
            if let Some(cat) = self.categories[*category_idx].as_mut() {
                cat.stacks.retain(|&idx| idx != *stack_idx);
            }
        }
        self.fingerprint_index.retain(|_, &mut idx| self.stacks[idx].is_some());

        let emptied_categories: Vec<usize> = self
            .categories
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().filter(|c| c.stacks.is_empty()).map(|_| idx))
            .collect();
        for idx in emptied_categories {
            if let Some(c) = &self.categories[idx] {
                self.category_index.remove(&c.name);
            }
            self.categories[idx] = None;
        }

        if self.loaded_files.len() == 1 {
            let remaining_id = self.loaded_files[0].file_id;
            self.reprefix_file(remaining_id, false);
        }

        self.recompute_counts();
    }

    /// Renames a loaded file's display name, optionally forcing id
    /// prefixing regardless of collection size. Equivalent to
    /// `removeFile(old)` followed by re-ingest under `new`.
    pub fn rename_file(&mut self, old: &str, new: &str, prefix_ids: bool) -> Result<(), DuplicateFileNameError> {
        if old != new && self.loaded_files.iter().any(|f| f.display_name == new) {
            return Err(DuplicateFileNameError(new.to_string()));
        }
        let Some(entry) = self.loaded_files.iter().find(|f| f.display_name == old) else {
            return Ok(());
        };
        let parsed = entry.parsed.clone();
        self.remove_file(old);
        let effective_multi = self.loaded_files.len() + 1 > 1 || prefix_ids;
        let file_id = self.next_file_id;
        self.next_file_id += 1;
        self.ingest_groups(&parsed, file_id, new, effective_multi);
        self.loaded_files.push(LoadedFile {
            file_id,
            display_name: new.to_string(),
            parsed,
        });
        self.recompute_counts();
        Ok(())
    }

    /// Replaces the effective configuration and re-ingests every loaded
    /// file in its original order. Rule changes can rename or regroup
    /// stacks; pins are not carried across a settings change since stack
    /// identity is not guaranteed stable (see `DESIGN.md`).
    pub fn update_settings(&mut self, raw: &RawSettings) -> Vec<ConfigError> {
        let (settings, errors) = Settings::compile(raw);
        self.settings = settings;

        let files: Vec<(String, ParsedFile)> = self
            .loaded_files
            .iter()
            .map(|f| (f.display_name.clone(), f.parsed.clone()))
            .collect();

        self.categories.clear();
        self.stacks.clear();
        self.goroutines.clear();
        self.category_index.clear();
        self.fingerprint_index.clear();
        self.goroutine_index.clear();
        self.loaded_files.clear();
        self.next_file_id = 0;
        self.next_section_id = 0;
        self.next_group_id = 0;

        for (display_name, parsed) in files {
            let file_id = self.next_file_id;
            self.next_file_id += 1;
            let will_be_multi = self.loaded_files.len() + 1 > 1;
            self.ingest_groups(&parsed, file_id, &display_name, will_be_multi);
            self.loaded_files.push(LoadedFile {
                file_id,
                display_name,
                parsed,
            });
        }

        self.recompute_counts();
        errors
    }

    /// Recomputes `total` and resets `matches`/`filterMatches` to `total`
    /// at every aggregate level from their children, without touching leaf
    /// (group/goroutine) state. Used after structural changes; filter
    /// re-application is a separate, explicit step ([`Self::set_filter`]).
    fn recompute_counts(&mut self) {
        for stack_slot in self.stacks.iter_mut() {
            let Some(stack) = stack_slot else { continue };
            for section in stack.files.iter_mut() {
                section.counts = Counts::sum(section.groups.iter().map(|g| g.counts));
            }
            stack.counts = Counts::sum(stack.files.iter().map(|s| s.counts));
        }
        for category_slot in self.categories.iter_mut() {
            let Some(category) = category_slot else { continue };
            category.counts = Counts::sum(
                category
                    .stacks
                    .iter()
                    .filter_map(|&idx| self.stacks[idx].as_ref())
                    .map(|s| s.counts),
            );
        }
    }

    /// Parses and applies a filter string, updating `matches`/
    /// `filterMatches` throughout the taxonomy.
    pub fn set_filter(&mut self, filter: Filter) {
        self.current_filter = filter;
        self.apply_current_filter();
    }

    pub fn current_filter(&self) -> &Filter {
        &self.current_filter
    }

    fn apply_current_filter(&mut self) {
        let filter = self.current_filter.clone();
        let text = filter.text.to_lowercase();

        for stack_slot in self.stacks.iter_mut() {
            let Some(stack) = stack_slot else { continue };
            let stack_text_match = text.is_empty() || stack.searchable_text.contains(&text);

            for section in stack.files.iter_mut() {
                for group in section.groups.iter_mut() {
                    Self::evaluate_group(group, &mut self.goroutines, &filter, &text, stack_text_match);
                }
                section.counts = Counts::sum(group_counts(&section.groups));
            }
            stack.counts = Counts::sum(stack.files.iter().map(|s| s.counts));
            if stack.pinned && stack.counts.matches == 0 {
                stack.counts.matches = stack.counts.total;
            }
        }

        // A pinned category makes every descendant visible (stacks, file
        // sections, groups, individual goroutines), not just its own
        // rolled-up counter — otherwise a UI walking the taxonomy by
        // `matches` would still find everything under it hidden.
        // `filterMatches` is left as genuinely computed: pinning overrides
        // visibility, not whether the filter text itself matched.
        let pinned_category_stacks: Vec<usize> = self
            .categories
            .iter()
            .flatten()
            .filter(|c| c.pinned)
            .flat_map(|c| c.stacks.iter().copied())
            .collect();
        for stack_idx in pinned_category_stacks {
            Self::force_stack_visible(&mut self.stacks, &mut self.goroutines, stack_idx);
        }

        for category_slot in self.categories.iter_mut() {
            let Some(category) = category_slot else { continue };
            category.counts = Counts::sum(
                category
                    .stacks
                    .iter()
                    .filter_map(|&idx| self.stacks[idx].as_ref())
                    .map(|s| s.counts),
            );
        }
    }

    /// Forces `matches` to true throughout a stack's subtree (groups,
    /// goroutines) and recomputes the section/stack counters to match,
    /// without touching `filterMatches` anywhere.
    fn force_stack_visible(stacks: &mut [Option<UniqueStack>], goroutines: &mut [Option<Goroutine>], stack_idx: usize) {
        let Some(stack) = stacks.get_mut(stack_idx).and_then(|s| s.as_mut()) else {
            return;
        };
        for section in stack.files.iter_mut() {
            for group in section.groups.iter_mut() {
                for &idx in &group.goroutines {
                    if let Some(g) = goroutines.get_mut(idx).and_then(|g| g.as_mut()) {
                        g.matches = true;
                    }
                }
                group.counts.matches = group.counts.total;
            }
            section.counts.matches = section.counts.total;
        }
        stack.counts.matches = stack.counts.total;
    }

    fn evaluate_group(
        group: &mut Group,
        goroutines: &mut [Option<Goroutine>],
        filter: &Filter,
        text: &str,
        stack_text_match: bool,
    ) {
        let group_label_match = !text.is_empty() && group.labels.iter().any(|l| l.to_lowercase().contains(text));

        if group.goroutines.is_empty() {
            // Dialect-A aggregate group: no individual goroutines, no wait data.
            let real_match = stack_text_match || group_label_match;
            let visible = real_match || group.pinned;
            group.counts = Counts {
                total: group.counts.total,
                matches: if visible { group.counts.total } else { 0 },
                prior_matches: group.counts.prior_matches,
                filter_matches: if real_match { group.counts.total } else { 0 },
            };
            return;
        }

        let mut total = 0usize;
        let mut matches = 0usize;
        let mut filter_matches = 0usize;

        for &idx in &group.goroutines {
            let Some(g) = goroutines[idx].as_mut() else { continue };
            total += 1;
            let wait_ok = filter.wait_matches(g.wait_minutes);

            // real_match is true iff this goroutine is a genuine text+wait
            // match, as opposed to merely pin/forced-visible.
            let real_match = if stack_text_match {
                wait_ok
            } else if group_label_match {
                wait_ok
            } else if group.pinned {
                false
            } else {
                (text.is_empty() || g.id.to_lowercase().contains(text)) && wait_ok
            };

            let forced = filter.forced_goroutine.as_deref() == Some(g.id.as_str());
            let visible = real_match || g.pinned || forced || group.pinned;

            g.matches = visible;
            if visible {
                matches += 1;
            }
            if real_match {
                filter_matches += 1;
            }
        }

        group.counts = Counts {
            total,
            matches,
            prior_matches: group.counts.prior_matches,
            filter_matches,
        };
    }

    /// Sets `priorMatches := matches` everywhere, for incremental UI diffing
    /// between consecutive filter applications.
    pub fn clear_filter_changes(&mut self) {
        for stack_slot in self.stacks.iter_mut() {
            let Some(stack) = stack_slot else { continue };
            for section in stack.files.iter_mut() {
                for group in section.groups.iter_mut() {
                    group.counts.prior_matches = group.counts.matches;
                }
                section.counts.prior_matches = section.counts.matches;
            }
            stack.counts.prior_matches = stack.counts.matches;
        }
        for category_slot in self.categories.iter_mut() {
            if let Some(category) = category_slot {
                category.counts.prior_matches = category.counts.matches;
            }
        }
    }

    // -- Pin operations --------------------------------------------------

    pub fn toggle_category_pin(&mut self, category_idx: usize) {
        if let Some(c) = self.categories.get_mut(category_idx).and_then(|c| c.as_mut()) {
            c.pinned = !c.pinned;
        }
        self.apply_current_filter();
    }

    pub fn toggle_category_pin_with_children(&mut self, category_idx: usize) {
        let new_state = self
            .categories
            .get(category_idx)
            .and_then(|c| c.as_ref())
            .map(|c| !c.pinned)
            .unwrap_or(false);
        let stack_indices: Vec<usize> = self
            .categories
            .get(category_idx)
            .and_then(|c| c.as_ref())
            .map(|c| c.stacks.clone())
            .unwrap_or_default();
        if let Some(c) = self.categories.get_mut(category_idx).and_then(|c| c.as_mut()) {
            c.pinned = new_state;
        }
        for stack_idx in stack_indices {
            self.set_stack_pinned_with_children(stack_idx, new_state);
        }
        self.apply_current_filter();
    }

    pub fn toggle_stack_pin(&mut self, stack_idx: usize) {
        if let Some(s) = self.stacks.get_mut(stack_idx).and_then(|s| s.as_mut()) {
            s.pinned = !s.pinned;
        }
        self.apply_current_filter();
    }

    pub fn toggle_stack_pin_with_children(&mut self, stack_idx: usize) {
        let new_state = self
            .stacks
            .get(stack_idx)
            .and_then(|s| s.as_ref())
            .map(|s| !s.pinned)
            .unwrap_or(false);
        self.set_stack_pinned_with_children(stack_idx, new_state);
        self.apply_current_filter();
    }

    fn set_stack_pinned_with_children(&mut self, stack_idx: usize, pinned: bool) {
        let Some(stack) = self.stacks.get_mut(stack_idx).and_then(|s| s.as_mut()) else {
            return;
        };
        stack.pinned = pinned;
        for section in stack.files.iter_mut() {
            for group in section.groups.iter_mut() {
                group.pinned = pinned;
                for &idx in &group.goroutines {
                    if let Some(g) = self.goroutines.get_mut(idx).and_then(|g| g.as_mut()) {
                        g.pinned = pinned;
                    }
                }
            }
        }
    }

    pub fn toggle_group_pin(&mut self, stack_idx: usize, section_id: usize, group_id: usize) {
        if let Some(group) = self.find_group_mut(stack_idx, section_id, group_id) {
            group.pinned = !group.pinned;
        }
        self.apply_current_filter();
    }

    pub fn toggle_group_pin_with_children(&mut self, stack_idx: usize, section_id: usize, group_id: usize) {
        let goroutine_indices: Vec<usize> = self
            .find_group_mut(stack_idx, section_id, group_id)
            .map(|g| {
                g.pinned = !g.pinned;
                g.goroutines.clone()
            })
            .unwrap_or_default();
        let new_state = self
            .find_group_mut(stack_idx, section_id, group_id)
            .map(|g| g.pinned)
            .unwrap_or(false);
        for idx in goroutine_indices {
            if let Some(g) = self.goroutines.get_mut(idx).and_then(|g| g.as_mut()) {
                g.pinned = new_state;
            }
        }
        self.apply_current_filter();
    }

    fn find_group_mut(&mut self, stack_idx: usize, section_id: usize, group_id: usize) -> Option<&mut Group> {
        self.stacks
            .get_mut(stack_idx)?
            .as_mut()?
            .files
            .iter_mut()
            .find(|s| s.section_id == section_id)?
            .groups
            .iter_mut()
            .find(|g| g.group_id == group_id)
    }

    pub fn toggle_goroutine_pin(&mut self, goroutine_id: &str) {
        if let Some(&idx) = self.goroutine_index.get(goroutine_id) {
            if let Some(g) = self.goroutines.get_mut(idx).and_then(|g| g.as_mut()) {
                g.pinned = !g.pinned;
            }
        }
        self.apply_current_filter();
    }

    /// Clears every pinned flag in the collection.
    pub fn unpin_all_items(&mut self) {
        for c in self.categories.iter_mut().flatten() {
            c.pinned = false;
        }
        for s in self.stacks.iter_mut().flatten() {
            s.pinned = false;
            for section in s.files.iter_mut() {
                for g in section.groups.iter_mut() {
                    g.pinned = false;
                }
            }
        }
        for g in self.goroutines.iter_mut().flatten() {
            g.pinned = false;
        }
        self.apply_current_filter();
    }

    pub fn has_any_pinned_items(&self) -> bool {
        self.categories.iter().flatten().any(|c| c.pinned)
            || self.stacks.iter().flatten().any(|s| {
                s.pinned || s.files.iter().any(|sec| sec.groups.iter().any(|g| g.pinned))
            })
            || self.goroutines.iter().flatten().any(|g| g.pinned)
    }

    // -- Lookups ----------------------------------------------------------

    pub fn goroutine_by_id(&self, id: &str) -> Option<&Goroutine> {
        let idx = *self.goroutine_index.get(id)?;
        self.goroutines[idx].as_ref()
    }

    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded_files.iter().map(|f| f.display_name.clone()).collect();
        names.sort();
        names
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().flatten()
    }

    pub fn stacks(&self) -> impl Iterator<Item = &UniqueStack> {
        self.stacks.iter().flatten()
    }

    /// Looks up a stack by the arena index found in [`Category::stacks`].
    pub fn stack_at(&self, idx: usize) -> Option<&UniqueStack> {
        self.stacks.get(idx)?.as_ref()
    }

    /// Looks up a goroutine by the arena index found in [`Group::goroutines`].
    pub fn goroutine_at(&self, idx: usize) -> Option<&Goroutine> {
        self.goroutines.get(idx)?.as_ref()
    }

    pub fn stack_statistics(&self) -> StackStatistics {
        let mut stats = StackStatistics {
            total_stacks: 0,
            total_goroutines: 0,
            matching_goroutines: 0,
        };
        for stack in self.stacks() {
            stats.total_stacks += 1;
            stats.total_goroutines += stack.counts.total;
            stats.matching_goroutines += stack.counts.matches;
        }
        stats
    }

    pub fn file_statistics(&self) -> Vec<FileStatistics> {
        self.loaded_files
            .iter()
            .map(|f| {
                let mut total = 0usize;
                let mut matching = 0usize;
                for stack in self.stacks() {
                    for section in &stack.files {
                        if section.file_id == f.file_id {
                            total += section.counts.total;
                            matching += section.counts.matches;
                        }
                    }
                }
                FileStatistics {
                    file_name: f.display_name.clone(),
                    total_goroutines: total,
                    matching_goroutines: matching,
                }
            })
            .collect()
    }

    pub fn category_for_goroutine(&self, goroutine_id: &str) -> Option<&Category> {
        let goroutine = self.goroutine_by_id(goroutine_id)?;
        let stack = self.stacks[goroutine.stack_idx].as_ref()?;
        self.categories[stack.category_idx].as_ref()
    }
}

fn group_counts(groups: &[Group]) -> impl Iterator<Item = Counts> + '_ {
    groups.iter().map(|g| g.counts)
}

/// Extracts the numeric suffix after the last `.` in a (possibly prefixed)
/// goroutine id, e.g. `"file.7" -> 7`, `"7" -> 7`.
fn parse_raw_suffix(id: &str) -> Option<u64> {
    match id.rfind('.') {
        Some(idx) => id[idx + 1..].parse().ok(),
        None => id.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn collection() -> ProfileCollection {
        ProfileCollection::new()
    }

    fn parse_per_goroutine(content: &str) -> ParsedFile {
        parser::per_goroutine::parse(content, "stacks.txt", None).unwrap()
    }

    #[test]
    fn single_file_ids_are_bare() {
        let mut c = collection();
        let parsed = parse_per_goroutine("goroutine 7 [running]:\nmain.worker(0x1)\n\t/main.go:10\n");
        c.add_file(parsed, Some("A".to_string())).unwrap();
        assert!(c.goroutine_by_id("7").is_some());
    }

    #[test]
    fn scenario_s3_two_files_prefix_ids() {
        let mut c = collection();
        let a = parse_per_goroutine("goroutine 7 [running]:\nmain.worker(0x1)\n\t/main.go:10\n");
        c.add_file(a, Some("A".to_string())).unwrap();
        assert!(c.goroutine_by_id("7").is_some());

        let b = parse_per_goroutine("goroutine 7 [select]:\nmain.other(0x1)\n\t/other.go:1\n");
        c.add_file(b, Some("B".to_string())).unwrap();

        assert!(c.goroutine_by_id("7").is_none());
        assert!(c.goroutine_by_id("A.7").is_some());
        assert!(c.goroutine_by_id("B.7").is_some());
    }

    #[test]
    fn scenario_s6_prefix_reversibility() {
        let mut c = collection();
        let a = parse_per_goroutine("goroutine 7 [running]:\nmain.worker(0x1)\n\t/main.go:10\n");
        c.add_file(a, Some("A".to_string())).unwrap();
        let b = parse_per_goroutine("goroutine 9 [select]:\nmain.other(0x1)\n\t/other.go:1\n");
        c.add_file(b, Some("B".to_string())).unwrap();
        assert!(c.goroutine_by_id("A.7").is_some());

        c.remove_file("B");
        assert!(c.goroutine_by_id("7").is_some());
        assert!(c.goroutine_by_id("A.7").is_none());
    }

    #[test]
    fn duplicate_file_name_rejected() {
        let mut c = collection();
        let a = parse_per_goroutine("goroutine 1 [running]:\nmain.worker(0x1)\n\t/main.go:10\n");
        c.add_file(a.clone(), Some("A".to_string())).unwrap();
        let err = c.add_file(a, Some("A".to_string())).unwrap_err();
        assert_eq!(err.0, "A");
        assert_eq!(c.file_count(), 1);
    }

    #[test]
    fn counts_roll_up_from_groups() {
        let mut c = collection();
        let content = "\
goroutine 1 [running]:
main.alpha(0x1)
\t/a.go:1

goroutine 2 [select]:
main.worker(0x1)
\t/main.go:10

goroutine 3 [select]:
main.worker(0x1)
\t/main.go:10
";
        c.add_file(parse_per_goroutine(content), Some("A".to_string())).unwrap();
        let stats = c.stack_statistics();
        assert_eq!(stats.total_goroutines, 3);
        assert_eq!(stats.matching_goroutines, 3);
    }

    #[test]
    fn creator_inverse_holds() {
        let mut c = collection();
        let content = "\
goroutine 1 [running]:
main.spawn(0x1)
\t/main.go:1

goroutine 2 [chan receive]:
main.worker(0x1)
\t/main.go:10
created by main.spawn in goroutine 1
\t/main.go:5
";
        c.add_file(parse_per_goroutine(content), Some("A".to_string())).unwrap();
        let child = c.goroutine_by_id("2").unwrap();
        assert!(child.creator_exists);
        assert_eq!(child.creator_id, "1");
        let parent = c.goroutine_by_id("1").unwrap();
        assert_eq!(parent.created, vec!["2".to_string()]);
    }

    #[test]
    fn scenario_s5_wait_filter() {
        let mut c = collection();
        let content = "\
goroutine 1 [select]:
main.worker(0x1)
\t/main.go:10

goroutine 2 [select, 5 minutes]:
main.worker(0x1)
\t/main.go:10

goroutine 3 [select, 10 minutes]:
main.worker(0x1)
\t/main.go:10
";
        c.add_file(parse_per_goroutine(content), Some("A".to_string())).unwrap();
        let filter = Filter::parse("wait:5+ worker").unwrap();
        c.set_filter(filter);
        let stats = c.stack_statistics();
        assert_eq!(stats.matching_goroutines, 2);
    }

    #[test]
    fn scenario_s6_pin_overrides_non_matching_filter() {
        let mut c = collection();
        let content = "goroutine 1 [running]:\nmain.worker(0x1)\n\t/main.go:10\n";
        c.add_file(parse_per_goroutine(content), Some("A".to_string())).unwrap();
        let category_idx = c.categories().next().unwrap().category_id;
        c.toggle_category_pin(category_idx);

        c.set_filter(Filter::parse("doesnotmatch").unwrap());
        let category = c.categories().find(|cat| cat.category_id == category_idx).unwrap();
        assert_eq!(category.counts.matches, category.counts.total);
        assert_eq!(category.counts.filter_matches, 0);

        c.toggle_category_pin(category_idx);
        let category = c.categories().find(|cat| cat.category_id == category_idx).unwrap();
        assert_eq!(category.counts.matches, 0);
    }

    #[test]
    fn category_pin_cascades_matches_to_goroutines() {
        let mut c = collection();
        let content = "goroutine 1 [running]:\nmain.worker(0x1)\n\t/main.go:10\n";
        c.add_file(parse_per_goroutine(content), Some("A".to_string())).unwrap();
        let category_idx = c.categories().next().unwrap().category_id;
        c.toggle_category_pin(category_idx);

        c.set_filter(Filter::parse("doesnotmatch").unwrap());
        assert!(c.goroutine_by_id("1").unwrap().matches);
        let stack = c.stacks().next().unwrap();
        assert_eq!(stack.counts.matches, stack.counts.total);
        let group = &stack.files[0].groups[0];
        assert_eq!(group.counts.matches, group.counts.total);
        assert_eq!(group.counts.filter_matches, 0);

        c.toggle_category_pin(category_idx);
        c.set_filter(Filter::parse("doesnotmatch").unwrap());
        assert!(!c.goroutine_by_id("1").unwrap().matches);
    }

    #[test]
    fn idempotent_filter_application() {
        let mut c = collection();
        let content = "goroutine 1 [running]:\nmain.worker(0x1)\n\t/main.go:10\n";
        c.add_file(parse_per_goroutine(content), Some("A".to_string())).unwrap();
        c.set_filter(Filter::parse("worker").unwrap());
        let first = c.stack_statistics();
        c.set_filter(Filter::parse("worker").unwrap());
        let second = c.stack_statistics();
        assert_eq!(first.matching_goroutines, second.matching_goroutines);
    }

    #[test]
    fn empty_filter_matches_everything() {
        let mut c = collection();
        let content = "goroutine 1 [running]:\nmain.worker(0x1)\n\t/main.go:10\n";
        c.add_file(parse_per_goroutine(content), Some("A".to_string())).unwrap();
        c.set_filter(Filter::parse("").unwrap());
        let stats = c.stack_statistics();
        assert_eq!(stats.matching_goroutines, stats.total_goroutines);
    }
}
