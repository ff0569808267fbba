/*!
 * Log Store Tests
 * Timestamp ordering, filters, badges, viewing through the repository
 */

use crate::common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::AtomicU64;
use telemetry_store::logs::log_fields;
use telemetry_store::{
    Attributes, FieldFilter, FilterCondition, LogQuery, RepositoryConfig, TelemetryRepository,
};

#[test]
fn test_out_of_order_records_listed_by_timestamp() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    repo.add_logs(
        &failures,
        log_batch(
            "app-a",
            vec![log(300, 9, "third"), log(100, 9, "first"), log(200, 9, "second")],
        ),
    );

    let page = repo.get_logs(&LogQuery {
        count: 10,
        ..Default::default()
    });
    let messages: Vec<&str> = page.items.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second", "third"]);
    // Internal ids reflect arrival, not listing order.
    assert_eq!(page.items[0].internal_id, 2);
    assert_eq!(page.items[2].internal_id, 1);
}

#[test]
fn test_severity_banding_and_filtering() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    // One record per band boundary.
    repo.add_logs(
        &failures,
        log_batch(
            "app-a",
            vec![log(1, 1, "t"), log(2, 5, "d"), log(3, 9, "i"), log(4, 13, "w"), log(5, 17, "e"), log(6, 21, "f")],
        ),
    );

    let errors = repo.get_logs(&LogQuery {
        count: 10,
        filters: vec![FieldFilter::new(
            log_fields::SEVERITY,
            FilterCondition::Equals,
            "Error",
        )],
        ..Default::default()
    });
    assert_eq!(errors.total_count, 1);
    assert_eq!(errors.items[0].message.as_str(), "e");

    let histogram = repo.get_logs_field_values(log_fields::SEVERITY);
    assert_eq!(histogram.len(), 6);
    assert_eq!(histogram["Fatal"], 1);
}

#[test]
fn test_attribute_filter_missing_field_semantics() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    let mut tagged = log(1, 9, "tagged");
    tagged.attributes =
        Attributes::from_pairs(vec![("user.id".into(), json!("u1"))]);
    repo.add_logs(&failures, log_batch("app-a", vec![tagged, log(2, 9, "plain")]));

    // A positive condition never matches an absent field.
    let page = repo.get_logs(&LogQuery {
        count: 10,
        filters: vec![FieldFilter::new("user.id", FilterCondition::Equals, "u1")],
        ..Default::default()
    });
    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].message.as_str(), "tagged");

    // A negative condition is satisfied by absence.
    let page = repo.get_logs(&LogQuery {
        count: 10,
        filters: vec![FieldFilter::new("user.id", FilterCondition::NotEqual, "u1")],
        ..Default::default()
    });
    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].message.as_str(), "plain");
}

#[test]
fn test_unviewed_badge_lifecycle_via_repository() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    repo.add_logs(&failures, log_batch("app-a", vec![log(1, 17, "boom")]));
    repo.add_logs(&failures, log_batch("app-b", vec![log(2, 21, "fatal"), log(3, 9, "info")]));

    let counts = repo.get_application_unviewed_error_logs_count();
    assert_eq!(counts[&key("app-a")], 1);
    assert_eq!(counts[&key("app-b")], 1);

    repo.mark_viewed_error_logs(Some(&key("app-a")));
    let counts = repo.get_application_unviewed_error_logs_count();
    assert!(!counts.contains_key(&key("app-a")));
    assert_eq!(counts[&key("app-b")], 1);

    repo.mark_viewed_error_logs(None);
    assert!(repo.get_application_unviewed_error_logs_count().is_empty());
}

#[test]
fn test_eviction_window_and_is_full() {
    let repo = TelemetryRepository::new(RepositoryConfig {
        max_log_count: 3,
        ..Default::default()
    });
    let failures = AtomicU64::new(0);

    repo.add_logs(
        &failures,
        log_batch("app-a", (1..=5u64).map(|i| log(i, 9, &format!("m{i}"))).collect()),
    );

    let page = repo.get_logs(&LogQuery {
        count: 10,
        ..Default::default()
    });
    assert!(page.is_full);
    let messages: Vec<&str> = page.items.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["m3", "m4", "m5"]);

    // Clearing resets the truncation marker along with the entries.
    repo.clear_structured_logs(None);
    let page = repo.get_logs(&LogQuery {
        count: 10,
        ..Default::default()
    });
    assert_eq!(page.total_count, 0);
    assert!(!page.is_full);
}

#[test]
fn test_clear_by_application_keeps_others() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    repo.add_logs(&failures, log_batch("app-a", vec![log(1, 17, "a-err")]));
    repo.add_logs(&failures, log_batch("app-b", vec![log(2, 9, "b-info")]));

    assert_eq!(repo.clear_structured_logs(Some(&key("app-a"))), 1);
    let page = repo.get_logs(&LogQuery {
        count: 10,
        ..Default::default()
    });
    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].message.as_str(), "b-info");
    assert!(repo.get_application_unviewed_error_logs_count().is_empty());
}

#[test]
fn test_log_property_keys_scoped_by_application() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    let mut a = log(1, 9, "a");
    a.attributes = Attributes::from_pairs(vec![("request.path".into(), json!("/"))]);
    let mut b = log(2, 9, "b");
    b.attributes = Attributes::from_pairs(vec![("job.id".into(), json!(42))]);
    repo.add_logs(&failures, log_batch("app-a", vec![a]));
    repo.add_logs(&failures, log_batch("app-b", vec![b]));

    let scoped: Vec<String> = repo
        .get_log_property_keys(Some(&key("app-a")))
        .iter()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(scoped, vec!["request.path"]);

    let all: Vec<String> = repo
        .get_log_property_keys(None)
        .iter()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(all, vec!["job.id", "request.path"]);
}

#[test]
fn test_log_trace_correlation_fields() {
    let repo = TelemetryRepository::with_defaults();
    let failures = AtomicU64::new(0);

    let mut correlated = log(1, 9, "inside span");
    correlated.trace_id = Some(bytes::Bytes::from(vec![0xab]));
    correlated.span_id = Some(bytes::Bytes::from(vec![0x01]));
    repo.add_logs(&failures, log_batch("app-a", vec![correlated, log(2, 9, "free")]));

    let page = repo.get_logs(&LogQuery {
        count: 10,
        filters: vec![FieldFilter::new(
            log_fields::TRACE_ID,
            FilterCondition::Equals,
            "ab",
        )],
        ..Default::default()
    });
    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].message.as_str(), "inside span");
}
