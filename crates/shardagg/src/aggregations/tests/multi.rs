use crate::{
    aggregations::{AggregatorHandle, BucketCollector, MultiBucketCollector},
    index::Query,
    search::{CollectStatus, IndexSearcher, PassStats, ShardSearcher},
    test_support::{CallLog, Script, fixture_index, fixture_query, recording_handle},
};
use proptest::prelude::*;
use std::{collections::BTreeSet, sync::Arc};

fn run_pass(handles: Vec<AggregatorHandle>, query: &Query) -> PassStats {
    let searcher = IndexSearcher::new(Arc::new(fixture_index()));
    let mut collector = MultiBucketCollector::new(handles).expect("fan-out should build");
    collector
        .pre_collection()
        .expect("pre collection should succeed");

    searcher
        .search(query, &mut collector)
        .expect("pass should succeed")
}

fn stop_after(limit: u32, status: CollectStatus) -> Script {
    Script {
        stop_after: Some((limit, status)),
        ..Script::default()
    }
}

const MATCHING: [(u32, u32); 5] = [(0, 0), (0, 1), (0, 3), (1, 1), (1, 3)];

#[test]
fn fan_out_visits_children_in_declaration_order() {
    let log = CallLog::default();
    run_pass(
        vec![
            recording_handle("a", Script::default(), &log),
            recording_handle("b", Script::default(), &log),
        ],
        &fixture_query(),
    );

    let collects: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|entry| entry.contains(":collect:"))
        .collect();
    let expected: Vec<String> = MATCHING
        .iter()
        .flat_map(|(segment, doc)| {
            ["a", "b"].map(|name| format!("{name}:collect:{segment}:{doc}"))
        })
        .collect();

    assert_eq!(collects, expected);
}

#[test]
fn pre_collection_reaches_every_child_once() {
    let log = CallLog::default();
    run_pass(
        vec![
            recording_handle("a", Script::default(), &log),
            recording_handle("b", Script::default(), &log),
        ],
        &fixture_query(),
    );

    for name in ["a", "b"] {
        let pre = log.calls_of(name).iter().filter(|c| *c == "pre").count();
        assert_eq!(pre, 1, "{name} should see exactly one pre_collection");
    }
}

#[test]
fn segment_done_child_rejoins_on_next_segment() {
    let log = CallLog::default();
    let stats = run_pass(
        vec![
            recording_handle("a", stop_after(1, CollectStatus::SegmentDone), &log),
            recording_handle("b", Script::default(), &log),
        ],
        &fixture_query(),
    );

    assert_eq!(log.collected_by("a"), vec![(0, 0), (1, 1)]);
    assert_eq!(log.collected_by("b"), MATCHING.to_vec());
    assert!(!stats.terminated_early);
}

#[test]
fn exhausted_child_sits_out_remaining_segments() {
    let log = CallLog::default();
    run_pass(
        vec![
            recording_handle("a", stop_after(2, CollectStatus::Exhausted), &log),
            recording_handle("b", Script::default(), &log),
        ],
        &fixture_query(),
    );

    assert_eq!(log.collected_by("a"), vec![(0, 0), (0, 1)]);
    assert!(!log.calls_of("a").contains(&"segment:1".to_string()));
    assert_eq!(log.collected_by("b"), MATCHING.to_vec());
}

#[test]
fn pass_stops_once_every_child_is_exhausted() {
    let log = CallLog::default();
    let stats = run_pass(
        vec![
            recording_handle("a", stop_after(1, CollectStatus::Exhausted), &log),
            recording_handle("b", stop_after(2, CollectStatus::Exhausted), &log),
        ],
        &fixture_query(),
    );

    assert_eq!(log.collected_by("a"), vec![(0, 0)]);
    assert_eq!(log.collected_by("b"), vec![(0, 0), (0, 1)]);
    assert_eq!(stats.segments_searched, 1);
    assert!(stats.terminated_early);
}

#[test]
fn collect_failure_is_attributed_to_the_child() {
    let log = CallLog::default();
    let searcher = IndexSearcher::new(Arc::new(fixture_index()));
    let mut collector = MultiBucketCollector::new(vec![
        recording_handle("ok", Script::default(), &log),
        recording_handle(
            "broken",
            Script {
                fail_on_doc: Some(3),
                ..Script::default()
            },
            &log,
        ),
    ])
    .expect("fan-out should build");

    let err = searcher
        .search(&fixture_query(), &mut collector)
        .expect_err("doc 3 should fail");

    assert_eq!(err.aggregator(), Some("broken"));
    assert_eq!(log.collected_by("ok"), vec![(0, 0), (0, 1), (0, 3)]);
}

#[test]
fn empty_fan_out_is_rejected() {
    assert!(MultiBucketCollector::new(Vec::new()).is_err());
}

#[test]
fn describe_lists_children() {
    let log = CallLog::default();
    let collector = MultiBucketCollector::new(vec![
        recording_handle("a", Script::default(), &log),
        recording_handle("b", Script::default(), &log),
    ])
    .expect("fan-out should build");

    assert_eq!(collector.describe(), "MultiBucketCollector: [a, b]");
    assert_eq!(collector.len(), 2);
}

fn arb_script() -> impl Strategy<Value = Script> {
    prop::option::of((1_u32..4, any::<bool>())).prop_map(|stop| Script {
        stop_after: stop.map(|(limit, exhaust)| {
            let status = if exhaust {
                CollectStatus::Exhausted
            } else {
                CollectStatus::SegmentDone
            };
            (limit, status)
        }),
        ..Script::default()
    })
}

proptest! {
    #[test]
    fn fan_out_matches_solo_runs(scripts in prop::collection::vec(arb_script(), 1..5)) {
        let log = CallLog::default();
        let names: Vec<String> = (0..scripts.len()).map(|i| format!("agg{i}")).collect();
        let handles = names
            .iter()
            .zip(&scripts)
            .map(|(name, script)| recording_handle(name, *script, &log))
            .collect();
        run_pass(handles, &Query::MatchAll);

        for (name, script) in names.iter().zip(&scripts) {
            let solo = CallLog::default();
            run_pass(vec![recording_handle(name, *script, &solo)], &Query::MatchAll);

            let combined = log.collected_by(name);
            prop_assert_eq!(&combined, &solo.collected_by(name));

            let unique: BTreeSet<_> = combined.iter().collect();
            prop_assert_eq!(unique.len(), combined.len());
        }
    }
}
