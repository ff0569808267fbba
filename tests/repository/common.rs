/*!
 * Shared batch builders for repository tests
 */

#![allow(dead_code)]

use bytes::Bytes;
use serde_json::json;
use telemetry_store::otlp::{
    LogRecord, Resource, ResourceLogs, ResourceMetrics, ResourceSpans, ScopeInfo, ScopeLogs,
    ScopeMetrics, ScopeSpans, SpanLinkRecord, SpanRecord, SERVICE_INSTANCE_ID, SERVICE_NAME,
};
use telemetry_store::{ApplicationKey, Attributes, SpanKind, SpanStatus};

pub fn key(name: &str) -> ApplicationKey {
    ApplicationKey::new(name, "inst-1")
}

pub fn resource(name: &str) -> Resource {
    Resource::new(Attributes::from_pairs(vec![
        (SERVICE_NAME.into(), json!(name)),
        (SERVICE_INSTANCE_ID.into(), json!("inst-1")),
    ]))
}

pub fn span(trace: u8, span: u8, parent: Option<u8>, name: &str, start: u64, end: u64) -> SpanRecord {
    SpanRecord {
        trace_id: Bytes::from(vec![trace]),
        span_id: Bytes::from(vec![span]),
        parent_span_id: parent.map(|p| Bytes::from(vec![p])),
        name: name.into(),
        kind: SpanKind::Internal,
        start_time_unix_nano: start,
        end_time_unix_nano: end,
        status: SpanStatus::Unset,
        status_message: Default::default(),
        attributes: Attributes::new(),
        events: Vec::new(),
        links: Vec::new(),
    }
}

pub fn linked(mut record: SpanRecord, trace: u8, span: u8) -> SpanRecord {
    record.links.push(SpanLinkRecord {
        trace_id: Bytes::from(vec![trace]),
        span_id: Bytes::from(vec![span]),
        trace_state: Default::default(),
        attributes: Attributes::new(),
    });
    record
}

pub fn span_batch(app: &str, spans: Vec<SpanRecord>) -> Vec<ResourceSpans> {
    vec![ResourceSpans {
        resource: resource(app),
        scopes: vec![ScopeSpans {
            scope: ScopeInfo::new("test-tracer", "1.0"),
            spans,
        }],
    }]
}

pub fn log(ts: u64, severity: u32, message: &str) -> LogRecord {
    LogRecord {
        time_unix_nano: ts,
        severity_number: severity,
        severity_text: Default::default(),
        body: json!(message),
        trace_id: None,
        span_id: None,
        attributes: Attributes::new(),
    }
}

pub fn log_batch(app: &str, records: Vec<LogRecord>) -> Vec<ResourceLogs> {
    vec![ResourceLogs {
        resource: resource(app),
        scopes: vec![ScopeLogs {
            scope: ScopeInfo::new("test-logger", "1.0"),
            records,
        }],
    }]
}

pub fn metric_batch(app: &str, metrics: Vec<telemetry_store::otlp::MetricRecord>) -> Vec<ResourceMetrics> {
    vec![ResourceMetrics {
        resource: resource(app),
        scopes: vec![ScopeMetrics {
            scope: ScopeInfo::new("test-meter", "1.0"),
            metrics,
        }],
    }]
}
