/*!
 * Span Link Index
 * Flat central index of span links keyed by their TARGET, answering
 * "who links to span X" when the linked-to span arrives after the
 * linking span
 */

use super::types::SpanLink;
use crate::core::types::{SpanId, TraceId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LinkKey {
    trace_id: TraceId,
    span_id: SpanId,
}

#[derive(Debug, Default)]
pub(crate) struct SpanLinkIndex {
    by_target: HashMap<LinkKey, Vec<SpanLink>>,
}

impl SpanLinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outgoing link under its target key
    pub fn register(&mut self, link: SpanLink) {
        let key = LinkKey {
            trace_id: link.trace_id.clone(),
            span_id: link.span_id.clone(),
        };
        self.by_target.entry(key).or_default().push(link);
    }

    /// Links currently targeting `(trace_id, span_id)`, cloned so the
    /// caller can attach them as back-links
    pub fn links_to(&self, trace_id: &TraceId, span_id: &SpanId) -> Vec<SpanLink> {
        let key = LinkKey {
            trace_id: trace_id.clone(),
            span_id: span_id.clone(),
        };
        self.by_target.get(&key).cloned().unwrap_or_default()
    }

    /// Remove one owned link from its target bucket. Walks only that
    /// bucket, so eviction cleanup stays O(removed links).
    pub fn remove_owned(&mut self, link: &SpanLink) {
        let key = LinkKey {
            trace_id: link.trace_id.clone(),
            span_id: link.span_id.clone(),
        };
        if let Some(bucket) = self.by_target.get_mut(&key) {
            bucket.retain(|l| !l.owned_by(&link.source_trace_id, &link.source_span_id));
            if bucket.is_empty() {
                self.by_target.remove(&key);
            }
        }
    }

    /// Drop the whole bucket for an evicted target span. A leaked entry
    /// here could attach an incorrect back-link to a future span reusing
    /// the same ids.
    pub fn remove_target(&mut self, trace_id: &TraceId, span_id: &SpanId) {
        self.by_target.remove(&LinkKey {
            trace_id: trace_id.clone(),
            span_id: span_id.clone(),
        });
    }

    pub fn clear(&mut self) {
        self.by_target.clear();
    }

    pub fn link_count(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }

    /// Iterate every stored link (verification passes only; O(n))
    pub fn iter_links(&self) -> impl Iterator<Item = &SpanLink> {
        self.by_target.values().flatten()
    }
}
