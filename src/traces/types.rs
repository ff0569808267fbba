/*!
 * Trace and Span Types
 * Assembled telemetry objects served to readers as deep clones
 */

use crate::applications::{ApplicationView, Scope};
use crate::core::types::{
    Attributes, InlineString, SpanId, SpanKind, SpanStatus, TraceId, UnixNanos,
};
use crate::query::FieldFilter;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;

/// Intrinsic span field names recognized by filters and histograms.
/// Any other field name resolves to a span attribute lookup.
pub mod span_fields {
    pub const TRACE_ID: &str = "trace.id";
    pub const SPAN_ID: &str = "span.id";
    pub const NAME: &str = "name";
    pub const KIND: &str = "kind";
    pub const STATUS: &str = "status";
    pub const APPLICATION: &str = "application";
}

/// One timed operation within a trace
#[derive(Debug, Clone, Serialize)]
pub struct Span {
    pub application: Arc<ApplicationView>,
    pub scope: Arc<Scope>,
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub name: InlineString,
    pub kind: SpanKind,
    pub start_time: UnixNanos,
    pub end_time: UnixNanos,
    pub status: SpanStatus,
    pub status_message: InlineString,
    pub attributes: Attributes,
    pub events: Vec<SpanEvent>,
    /// Outgoing references to other spans, possibly cross-trace,
    /// possibly not yet (or no longer) present in the window
    pub links: Vec<SpanLink>,
    /// Reverse pointers, populated when another span links to this one
    pub back_links: Vec<SpanLink>,
}

impl Span {
    #[inline]
    pub fn duration_ns(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Resolve a filter/histogram field to its text value
    pub fn field_value(&self, field: &str) -> Option<Cow<'_, str>> {
        match field {
            span_fields::TRACE_ID => Some(Cow::Owned(self.trace_id.hex())),
            span_fields::SPAN_ID => Some(Cow::Owned(self.span_id.hex())),
            span_fields::NAME => Some(Cow::Borrowed(self.name.as_str())),
            span_fields::KIND => Some(Cow::Borrowed(self.kind.as_str())),
            span_fields::STATUS => Some(Cow::Borrowed(self.status.as_str())),
            span_fields::APPLICATION => {
                Some(Cow::Borrowed(self.application.application_key.name.as_str()))
            }
            _ => self.attributes.get_text(field),
        }
    }

    /// AND semantics: every filter in the set must pass
    pub fn matches_all(&self, filters: &[FieldFilter]) -> bool {
        filters
            .iter()
            .all(|f| f.matches(self.field_value(&f.field).as_deref()))
    }
}

/// Timestamped event attached to a span
#[derive(Debug, Clone, Serialize)]
pub struct SpanEvent {
    pub name: InlineString,
    pub time: UnixNanos,
    pub attributes: Attributes,
}

/// Directed reference from one span to another. Held both inside the
/// owning span and in the central link index keyed by its target.
#[derive(Debug, Clone, Serialize)]
pub struct SpanLink {
    pub source_trace_id: TraceId,
    pub source_span_id: SpanId,
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub trace_state: InlineString,
    pub attributes: Attributes,
}

impl SpanLink {
    pub fn owned_by(&self, trace_id: &TraceId, span_id: &SpanId) -> bool {
        &self.source_trace_id == trace_id && &self.source_span_id == span_id
    }
}

/// Set of spans sharing a trace id, kept ordered by span start time.
/// Mutable while being assembled; always deep-cloned before being
/// handed to a reader.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub trace_id: TraceId,
    spans: Vec<Span>,
}

impl Trace {
    pub fn new(trace_id: TraceId, first_span: Span) -> Self {
        Self {
            trace_id,
            spans: vec![first_span],
        }
    }

    /// The span with the earliest start time. Determines the trace's
    /// position in the global ordering. Traces are never empty.
    #[inline]
    pub fn first_span(&self) -> &Span {
        &self.spans[0]
    }

    pub fn root_span(&self) -> Option<&Span> {
        self.spans.iter().find(|s| s.is_root())
    }

    /// Display name: application plus root (or earliest) span name
    pub fn full_name(&self) -> String {
        let span = self.root_span().unwrap_or_else(|| self.first_span());
        format!("{}: {}", span.application.application_key.name, span.name)
    }

    /// Wall-clock extent across all spans
    pub fn duration_ns(&self) -> u64 {
        let start = self.spans.iter().map(|s| s.start_time).min().unwrap_or(0);
        let end = self.spans.iter().map(|s| s.end_time).max().unwrap_or(0);
        end.saturating_sub(start)
    }

    #[inline]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn span(&self, span_id: &SpanId) -> Option<&Span> {
        self.spans.iter().find(|s| &s.span_id == span_id)
    }

    pub(crate) fn span_mut(&mut self, span_id: &SpanId) -> Option<&mut Span> {
        self.spans.iter_mut().find(|s| &s.span_id == span_id)
    }

    pub(crate) fn spans_mut(&mut self) -> &mut [Span] {
        &mut self.spans
    }

    /// Insert keeping start-time order. Returns true when the inserted
    /// span became the trace's new first span, which requires the
    /// caller to reposition the trace in the global ordering.
    pub(crate) fn insert_span(&mut self, span: Span) -> bool {
        let mut index = self.spans.len();
        while index > 0 && self.spans[index - 1].start_time > span.start_time {
            index -= 1;
        }
        self.spans.insert(index, span);
        index == 0
    }

    /// True when any span belongs to an application matched by `filter`
    pub fn matches_application(&self, filter: &crate::core::types::ApplicationKey) -> bool {
        self.spans
            .iter()
            .any(|s| filter.matches(&s.application.application_key))
    }
}
