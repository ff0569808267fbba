/*!
 * Trace Store Tests
 * Ordering, eviction, link integrity, query correctness, isolation
 */

use crate::common::*;
use pretty_assertions::assert_eq;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::atomic::AtomicU64;
use telemetry_store::traces::types::span_fields;
use telemetry_store::{
    FieldFilter, FilterCondition, QueryError, RepositoryConfig, SpanId, TelemetryRepository,
    TraceId, TraceQuery,
};

fn small_repo(max_traces: usize) -> TelemetryRepository {
    TelemetryRepository::new(RepositoryConfig {
        max_trace_count: max_traces,
        ..Default::default()
    })
}

fn all_traces(repo: &TelemetryRepository) -> Vec<telemetry_store::Trace> {
    repo.get_traces(&TraceQuery {
        count: usize::MAX,
        ..Default::default()
    })
    .page
    .items
}

#[test]
fn test_ordering_invariant_under_shuffled_arrival() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let repo = TelemetryRepository::with_defaults();
        let failures = AtomicU64::new(0);

        let mut records: Vec<_> = (1..=12u8)
            .map(|i| span(i, i, None, "op", u64::from(i) * 10, u64::from(i) * 10 + 5))
            .collect();
        records.shuffle(&mut rng);
        for record in records {
            repo.add_traces(&failures, span_batch("app-a", vec![record]));
            repo.verify_consistency();
        }

        let starts: Vec<u64> = all_traces(&repo)
            .iter()
            .map(|t| t.first_span().start_time)
            .collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
    }
}

#[test]
fn test_late_root_repositions_trace() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    repo.add_traces(&failures, span_batch("app-a", vec![span(1, 2, Some(9), "child", 50, 90)]));
    repo.add_traces(&failures, span_batch("app-a", vec![span(2, 3, None, "other", 10, 20)]));
    repo.add_traces(&failures, span_batch("app-a", vec![span(1, 9, None, "root", 5, 100)]));

    let ids: Vec<String> = all_traces(&repo).iter().map(|t| t.trace_id.hex()).collect();
    assert_eq!(ids, vec!["01", "02"]);
    repo.verify_consistency();
}

#[test]
fn test_eviction_cascade_removes_links_and_back_links() {
    let repo = small_repo(2);
    let failures = AtomicU64::new(0);

    repo.add_traces(&failures, span_batch("app-a", vec![span(1, 1, None, "oldest", 0, 10)]));
    repo.add_traces(
        &failures,
        span_batch("app-a", vec![linked(span(2, 2, None, "mid", 20, 30), 1, 1)]),
    );
    repo.add_traces(&failures, span_batch("app-a", vec![span(3, 3, None, "new", 40, 50)]));

    // Capacity 2: the oldest trace is gone.
    assert!(repo.get_trace("01").unwrap().is_none());
    assert_eq!(all_traces(&repo).len(), 2);

    // A span reusing the evicted ids must not inherit a stale back-link.
    repo.add_traces(&failures, span_batch("app-a", vec![span(1, 1, None, "reborn", 60, 70)]));
    let reborn = repo
        .get_span(&TraceId::from(vec![1u8]), &SpanId::from(vec![1u8]))
        .unwrap();
    assert!(reborn.back_links.is_empty());
    repo.verify_consistency();
}

#[test]
fn test_back_link_resolution_either_order() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    // Link arrives before its target.
    repo.add_traces(
        &failures,
        span_batch("app-a", vec![linked(span(1, 1, None, "source", 0, 10), 2, 2)]),
    );
    repo.add_traces(&failures, span_batch("app-a", vec![span(2, 2, None, "target", 5, 15)]));

    let target = repo
        .get_span(&TraceId::from(vec![2u8]), &SpanId::from(vec![2u8]))
        .unwrap();
    assert_eq!(target.back_links.len(), 1);
    assert_eq!(target.back_links[0].source_trace_id, TraceId::from(vec![1u8]));

    let source = repo
        .get_span(&TraceId::from(vec![1u8]), &SpanId::from(vec![1u8]))
        .unwrap();
    assert_eq!(source.links.len(), 1);
    repo.verify_consistency();
}

#[test]
fn test_filters_match_spans_with_and_semantics() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    repo.add_traces(
        &failures,
        span_batch(
            "app-a",
            vec![span(1, 1, None, "GET /users", 0, 10), span(1, 2, Some(1), "db select", 1, 9)],
        ),
    );
    repo.add_traces(&failures, span_batch("app-a", vec![span(2, 3, None, "GET /orders", 20, 30)]));

    // Both filters must hold on a single span.
    let result = repo.get_traces(&TraceQuery {
        count: 10,
        filters: vec![
            FieldFilter::new(span_fields::NAME, FilterCondition::Contains, "GET"),
            FieldFilter::new(span_fields::NAME, FilterCondition::Contains, "users"),
        ],
        ..Default::default()
    });
    assert_eq!(result.page.total_count, 1);
    assert_eq!(result.page.items[0].trace_id.hex(), "01");

    // No single span satisfies both, even though the trace does.
    let result = repo.get_traces(&TraceQuery {
        count: 10,
        filters: vec![
            FieldFilter::new(span_fields::NAME, FilterCondition::Contains, "GET"),
            FieldFilter::new(span_fields::NAME, FilterCondition::Contains, "select"),
        ],
        ..Default::default()
    });
    assert_eq!(result.page.total_count, 0);
}

#[test]
fn test_query_matches_filter_then_slice_reference() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    for i in 1..=9u8 {
        let name = if i % 2 == 0 { "even" } else { "odd" };
        repo.add_traces(
            &failures,
            span_batch("app-a", vec![span(i, i, None, name, u64::from(i), u64::from(i) + 1)]),
        );
    }

    let filters = vec![FieldFilter::new(span_fields::NAME, FilterCondition::Equals, "even")];
    let result = repo.get_traces(&TraceQuery {
        count: 2,
        start_index: 1,
        filters: filters.clone(),
        ..Default::default()
    });

    // Reference: filter the full ordered listing, then slice.
    let reference: Vec<String> = all_traces(&repo)
        .iter()
        .filter(|t| t.spans().iter().any(|s| s.matches_all(&filters)))
        .map(|t| t.trace_id.hex())
        .collect();
    assert_eq!(result.page.total_count, reference.len());
    let page_ids: Vec<String> = result.page.items.iter().map(|t| t.trace_id.hex()).collect();
    assert_eq!(page_ids, reference[1..3].to_vec());
}

#[test]
fn test_free_text_matches_full_name() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);
    repo.add_traces(&failures, span_batch("checkout", vec![span(1, 1, None, "POST /pay", 0, 1)]));
    repo.add_traces(&failures, span_batch("catalog", vec![span(2, 2, None, "GET /items", 2, 3)]));

    let result = repo.get_traces(&TraceQuery {
        count: 10,
        free_text: Some("CHECKOUT: post".to_string()),
        ..Default::default()
    });
    assert_eq!(result.page.total_count, 1);
    assert_eq!(result.page.items[0].trace_id.hex(), "01");
}

#[test]
fn test_trace_prefix_lookup_and_ambiguity() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);
    repo.add_traces(&failures, span_batch("app-a", vec![span(0xab, 1, None, "a", 0, 1)]));
    repo.add_traces(&failures, span_batch("app-a", vec![span(0xac, 2, None, "b", 2, 3)]));

    assert!(repo.get_trace("ab").unwrap().is_some());
    assert!(repo.get_trace("ff").unwrap().is_none());
    assert!(matches!(repo.get_trace("a"), Err(QueryError::AmbiguousTraceId(_))));
}

#[test]
fn test_returned_trace_is_a_frozen_snapshot() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);
    repo.add_traces(&failures, span_batch("app-a", vec![span(1, 1, None, "root", 0, 100)]));

    let snapshot = repo.get_trace("01").unwrap().unwrap();
    assert_eq!(snapshot.spans().len(), 1);

    // Keep mutating the live trace after the read lock is gone.
    repo.add_traces(&failures, span_batch("app-a", vec![span(1, 2, Some(1), "late", 10, 90)]));
    repo.add_traces(
        &failures,
        span_batch("app-a", vec![linked(span(2, 3, None, "linker", 5, 6), 1, 1)]),
    );

    assert_eq!(snapshot.spans().len(), 1);
    assert!(snapshot.first_span().back_links.is_empty());
    let live = repo.get_trace("01").unwrap().unwrap();
    assert_eq!(live.spans().len(), 2);
    assert_eq!(live.root_span().unwrap().back_links.len(), 1);
}

#[test]
fn test_is_full_reports_possible_missing_data() {
    let repo = small_repo(2);
    let failures = AtomicU64::new(0);
    repo.add_traces(&failures, span_batch("app-a", vec![span(1, 1, None, "a", 0, 1)]));
    assert!(!repo.get_traces(&TraceQuery { count: 10, ..Default::default() }).page.is_full);

    repo.add_traces(&failures, span_batch("app-a", vec![span(2, 2, None, "b", 2, 3)]));
    let page = repo.get_traces(&TraceQuery { count: 10, ..Default::default() }).page;
    assert!(page.is_full);
    assert_eq!(page.total_count, 2);
}

#[test]
fn test_trace_property_keys_and_field_values() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    let mut record = span(1, 1, None, "GET /", 0, 1);
    record.attributes = telemetry_store::Attributes::from_pairs(vec![
        ("http.method".into(), serde_json::json!("GET")),
        ("http.status".into(), serde_json::json!(200)),
    ]);
    repo.add_traces(&failures, span_batch("app-a", vec![record]));
    repo.add_traces(&failures, span_batch("app-a", vec![span(2, 2, None, "GET /", 2, 3)]));

    let keys: Vec<String> = repo
        .get_trace_property_keys(Some(&key("app-a")))
        .iter()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(keys, vec!["http.method", "http.status"]);

    let histogram = repo.get_trace_field_values(span_fields::NAME);
    assert_eq!(histogram["GET /"], 2);
}
