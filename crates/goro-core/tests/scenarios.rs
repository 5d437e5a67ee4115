//! End-to-end scenarios against the public API, mirroring the collection's
//! literal worked examples (two dump dialects merged through one
//! `ProfileCollection`).

use goro_core::frame::fingerprint;
use goro_core::parser::{aggregated, per_goroutine};
use goro_core::{Filter, ProfileCollection};
use rstest::rstest;

#[rstest]
#[case::per_goroutine(
    "goroutine 1 [running]:\nmain.worker(0x1)\n\t/main.go:10\n",
    "per-goroutine"
)]
#[case::aggregated(
    "1 @ 0x1\n#\t0x1\tmain.worker+0x2a\t/main.go:10\n",
    "aggregated"
)]
fn both_dialects_fingerprint_the_same_trace_identically(#[case] content: &str, #[case] label: &str) {
    let trace = if label == "per-goroutine" {
        per_goroutine::parse(content, "stacks.txt", None).unwrap().groups[0].trace.clone()
    } else {
        aggregated::parse(content, "stacks.txt", None).unwrap().groups[0].trace.clone()
    };
    assert_eq!(trace[0].func, "main.worker");
    assert_eq!(fingerprint(&trace).len(), 24);
}

/// S1: three goroutines `[1 running]`, `[2 select]`, `[3 select]`, where 2
/// and 3 share a trace. Expect two stacks, three goroutines total, and the
/// select-state group at the shared stack holding exactly two goroutines.
#[test]
fn s1_shared_trace_goroutines_share_one_stack() {
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
    let mut collection = ProfileCollection::new();
    let parsed = per_goroutine::parse(content, "stacks.txt", None).unwrap();
    collection.add_file(parsed, Some("A".to_string())).unwrap();

    assert_eq!(collection.stacks().count(), 2);
    let shared = collection
        .stacks()
        .find(|s| s.name.contains("worker"))
        .expect("a stack named after main.worker");
    assert_eq!(shared.counts.total, 2);

    let stats = collection.stack_statistics();
    assert_eq!(stats.total_goroutines, 3);
}

/// S2: aggregated dialect with `goroutine profile: total 3`, one record of
/// count 2 and one of count 1, produces two groups summing to 3.
#[test]
fn s2_aggregated_groups_sum_to_total() {
    let content = "\
goroutine profile: total 3
2 @ 0x1
#\t0x1\tmain.worker\t/main.go:10
1 @ 0x2
#\t0x2\tio.read\t/io.go:5
";
    let mut collection = ProfileCollection::new();
    let parsed = aggregated::parse(content, "stacks.txt", None).unwrap();
    assert_eq!(parsed.total_goroutines, Some(3));
    collection.add_file(parsed, Some("A".to_string())).unwrap();

    assert_eq!(collection.stacks().count(), 2);
    let stats = collection.stack_statistics();
    assert_eq!(stats.total_goroutines, 3);
}

/// S3: loading file A (goroutine id 7) then file B (also id 7) rewrites both
/// to `A.7`/`B.7`, each retrievable via `goroutine_by_id`.
#[test]
fn s3_two_files_prefix_colliding_raw_ids() {
    let mut collection = ProfileCollection::new();
    let a = per_goroutine::parse("goroutine 7 [running]:\nmain.worker(0x1)\n\t/main.go:10\n", "a.txt", None).unwrap();
    collection.add_file(a, Some("A".to_string())).unwrap();
    assert_eq!(collection.goroutine_by_id("7").unwrap().id, "7");

    let b = per_goroutine::parse("goroutine 7 [select]:\nmain.other(0x1)\n\t/other.go:1\n", "b.txt", None).unwrap();
    collection.add_file(b, Some("B".to_string())).unwrap();

    assert!(collection.goroutine_by_id("7").is_none());
    assert_eq!(collection.goroutine_by_id("A.7").unwrap().id, "A.7");
    assert_eq!(collection.goroutine_by_id("B.7").unwrap().id, "B.7");
}

/// S5: `wait:5+ worker` matches only goroutines whose wait is >= 5 and whose
/// stack mentions `worker`; `wait:>10 wait:<5` is an unsatisfiable filter
/// string that must be rejected outright.
#[test]
fn s5_wait_filter_and_conflicting_bounds() {
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
    let mut collection = ProfileCollection::new();
    let parsed = per_goroutine::parse(content, "stacks.txt", None).unwrap();
    collection.add_file(parsed, Some("A".to_string())).unwrap();

    collection.set_filter(Filter::parse("wait:5+ worker").unwrap());
    assert_eq!(collection.stack_statistics().matching_goroutines, 2);

    assert!(Filter::parse("wait:>10 wait:<5").is_err());
}

/// S6: pinning a category keeps it fully visible (`matches == total`) under
/// a non-matching filter, but its `filterMatches` stays at zero; unpinning
/// drops `matches` back to zero.
#[test]
fn s6_pin_overrides_nonmatching_filter() {
    let content = "goroutine 1 [running]:\nmain.worker(0x1)\n\t/main.go:10\n";
    let mut collection = ProfileCollection::new();
    collection
        .add_file(per_goroutine::parse(content, "stacks.txt", None).unwrap(), Some("A".to_string()))
        .unwrap();

    let category_id = collection.categories().next().unwrap().category_id;
    collection.toggle_category_pin(category_id);
    collection.set_filter(Filter::parse("doesnotmatch").unwrap());

    let category = collection.categories().find(|c| c.category_id == category_id).unwrap();
    assert_eq!(category.counts.matches, category.counts.total);
    assert_eq!(category.counts.filter_matches, 0);

    collection.toggle_category_pin(category_id);
    let category = collection.categories().find(|c| c.category_id == category_id).unwrap();
    assert_eq!(category.counts.matches, 0);
}
