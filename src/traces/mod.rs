/*!
 * Trace Store
 * Assembles span batches into the in-memory trace index
 *
 * Owns the bounded trace buffer, the global first-span-start ordering,
 * and the central span-link index. All mutation, including eviction
 * cleanup, completes under the write lock before an insert returns;
 * readers always receive deep clones.
 */

mod links;
pub mod types;

pub use types::{Span, SpanEvent, SpanLink, Trace};

use crate::applications::{ApplicationView, ScopeCatalog};
use crate::core::buffer::BoundedOrderedBuffer;
use crate::core::errors::{IngestError, QueryError};
use crate::core::types::{ApplicationKey, InlineString, SpanId, TraceId};
use crate::otlp::{ScopeInfo, SpanRecord};
use crate::query::{paginate, FieldFilter, PagedResult};
use links::SpanLinkIndex;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Trace listing query
#[derive(Debug, Clone, Default)]
pub struct TraceQuery {
    pub application_key: Option<ApplicationKey>,
    pub start_index: usize,
    pub count: usize,
    /// A trace matches when at least one span satisfies ALL filters
    pub filters: Vec<FieldFilter>,
    /// Case-insensitive match against the trace's composed full name
    pub free_text: Option<String>,
}

/// Page of traces plus the largest duration observed across the whole
/// filtered set (callers scale duration bars against it)
#[derive(Debug, Clone)]
pub struct GetTracesResult {
    pub page: PagedResult<Trace>,
    pub max_duration_ns: u64,
}

struct TraceStoreInner {
    traces: BoundedOrderedBuffer<Trace>,
    links: SpanLinkIndex,
    scopes: ScopeCatalog,
    property_keys: HashMap<ApplicationKey, BTreeSet<InlineString>>,
    max_span_events: usize,
}

pub struct TraceStore {
    inner: RwLock<TraceStoreInner>,
}

impl TraceStore {
    pub fn new(capacity: usize, max_span_events: usize) -> Self {
        Self {
            inner: RwLock::new(TraceStoreInner {
                traces: BoundedOrderedBuffer::new(capacity),
                links: SpanLinkIndex::new(),
                scopes: ScopeCatalog::new(),
                property_keys: HashMap::new(),
                max_span_events,
            }),
        }
    }

    /// Ingest one scope group of span records for an application view.
    /// Per-record failures are counted and skipped; the batch continues.
    /// Returns the number of records applied.
    pub fn add_spans(
        &self,
        view: &Arc<ApplicationView>,
        scope_info: &ScopeInfo,
        records: Vec<SpanRecord>,
        failures: &AtomicU64,
    ) -> usize {
        let mut inner = self.inner.write();
        let scope = inner.scopes.get_or_add(scope_info);
        let mut added = 0;
        for record in records {
            match inner.insert_record(view, &scope, record) {
                Ok(()) => added += 1,
                Err(err) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    debug!(error = %err, application = %view.application_key, "span record rejected");
                }
            }
        }
        if cfg!(debug_assertions) {
            inner.verify_consistency();
        }
        added
    }

    /// Look up a trace by full hex id or unique hex prefix. An exact id
    /// wins outright; a prefix matching several traces is an error.
    pub fn get_trace(&self, id_or_prefix: &str) -> Result<Option<Trace>, QueryError> {
        let needle = id_or_prefix.to_ascii_lowercase();
        let inner = self.inner.read();

        if let Some(exact) = inner.traces.iter().rev().find(|t| t.trace_id.hex() == needle) {
            return Ok(Some(exact.clone()));
        }

        let mut matched = inner
            .traces
            .iter()
            .filter(|t| t.trace_id.hex().starts_with(&needle));
        let first = matched.next();
        if matched.next().is_some() {
            return Err(QueryError::AmbiguousTraceId(id_or_prefix.to_string()));
        }
        Ok(first.cloned())
    }

    pub fn get_span(&self, trace_id: &TraceId, span_id: &SpanId) -> Option<Span> {
        let inner = self.inner.read();
        let span = inner
            .traces
            .iter()
            .rev()
            .find(|t| &t.trace_id == trace_id)
            .and_then(|t| t.span(span_id))
            .cloned();
        span
    }

    /// Filtered, paginated trace listing. Filter chain: application key,
    /// then field filters (OR across spans, AND within a span), then
    /// free text on the composed full name.
    pub fn get_traces(&self, query: &TraceQuery) -> GetTracesResult {
        let inner = self.inner.read();
        let free_text = query.free_text.as_deref().map(str::to_ascii_lowercase);

        let matched: Vec<&Trace> = inner
            .traces
            .iter()
            .filter(|t| {
                query
                    .application_key
                    .as_ref()
                    .map_or(true, |key| t.matches_application(key))
            })
            .filter(|t| {
                query.filters.is_empty()
                    || t.spans().iter().any(|s| s.matches_all(&query.filters))
            })
            .filter(|t| {
                free_text
                    .as_deref()
                    .map_or(true, |needle| t.full_name().to_ascii_lowercase().contains(needle))
            })
            .collect();

        let max_duration_ns = matched.iter().map(|t| t.duration_ns()).max().unwrap_or(0);
        let page = paginate(
            matched.iter().copied(),
            query.start_index,
            query.count,
            inner.traces.is_full(),
        );
        GetTracesResult {
            page,
            max_duration_ns,
        }
    }

    /// Sorted distinct span attribute keys for filter autocompletion
    pub fn property_keys(&self, filter: Option<&ApplicationKey>) -> Vec<InlineString> {
        let inner = self.inner.read();
        let mut keys = BTreeSet::new();
        for (app, app_keys) in &inner.property_keys {
            if filter.map_or(true, |f| f.matches(app)) {
                keys.extend(app_keys.iter().cloned());
            }
        }
        keys.into_iter().collect()
    }

    /// Value → count histogram of one span field across the window
    pub fn field_values(&self, field: &str) -> BTreeMap<String, u64> {
        let inner = self.inner.read();
        let mut counts = BTreeMap::new();
        for trace in inner.traces.iter() {
            for span in trace.spans() {
                if let Some(value) = span.field_value(field) {
                    *counts.entry(value.into_owned()).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Remove matching traces (all, when no filter) along with their
    /// link-index entries. Returns the number of traces removed.
    pub fn clear(&self, filter: Option<&ApplicationKey>) -> usize {
        let mut inner = self.inner.write();
        let removed = match filter {
            None => {
                let count = inner.traces.len();
                inner.traces.clear();
                inner.links.clear();
                inner.property_keys.clear();
                count
            }
            Some(key) => {
                let drained = inner.traces.drain_where(|t| t.matches_application(key));
                for trace in &drained {
                    inner.prune_trace(trace);
                }
                inner.property_keys.retain(|app, _| !key.matches(app));
                drained.len()
            }
        };
        if removed > 0 {
            debug!(removed, "traces cleared");
        }
        if cfg!(debug_assertions) {
            inner.verify_consistency();
        }
        removed
    }

    pub fn trace_count(&self) -> usize {
        self.inner.read().traces.len()
    }

    pub fn is_full(&self) -> bool {
        self.inner.read().traces.is_full()
    }

    /// Full O(n) consistency pass: ordering invariant, link-index
    /// ownership, back-link ownership. Panics on violation; intended
    /// for debug builds and test harnesses, never the production path.
    pub fn verify_consistency(&self) {
        self.inner.read().verify_consistency();
    }

    #[cfg(test)]
    pub(crate) fn link_count(&self) -> usize {
        self.inner.read().links.link_count()
    }
}

impl TraceStoreInner {
    fn insert_record(
        &mut self,
        view: &Arc<ApplicationView>,
        scope: &Arc<crate::applications::Scope>,
        record: SpanRecord,
    ) -> Result<(), IngestError> {
        if record.trace_id.is_empty() {
            return Err(IngestError::EmptyTraceId);
        }
        if record.span_id.is_empty() {
            return Err(IngestError::EmptySpanId);
        }
        let trace_id = TraceId::new(record.trace_id);
        let span_id = SpanId::new(record.span_id);

        let mut events: Vec<SpanEvent> = record
            .events
            .into_iter()
            .map(|e| SpanEvent {
                name: e.name,
                time: e.time_unix_nano,
                attributes: e.attributes,
            })
            .collect();
        events.truncate(self.max_span_events);

        let links: Vec<SpanLink> = record
            .links
            .into_iter()
            .map(|l| SpanLink {
                source_trace_id: trace_id.clone(),
                source_span_id: span_id.clone(),
                trace_id: TraceId::new(l.trace_id),
                span_id: SpanId::new(l.span_id),
                trace_state: l.trace_state,
                attributes: l.attributes,
            })
            .collect();

        // Register outgoing links first, then resolve back-links for the
        // new span: an earlier span's link can precede this span's
        // arrival, and a self-link must see itself.
        for link in &links {
            self.links.register(link.clone());
            let pos = self
                .traces
                .iter()
                .rposition(|t| t.trace_id == link.trace_id);
            if let Some(pos) = pos {
                if let Some(target) = self
                    .traces
                    .get_mut(pos)
                    .and_then(|t| t.span_mut(&link.span_id))
                {
                    target.back_links.push(link.clone());
                }
            }
        }
        let back_links = self.links.links_to(&trace_id, &span_id);

        let keys = self
            .property_keys
            .entry(view.application_key.clone())
            .or_default();
        for (key, _) in record.attributes.iter() {
            keys.insert(key.clone());
        }

        let span = Span {
            application: Arc::clone(view),
            scope: Arc::clone(scope),
            trace_id: trace_id.clone(),
            span_id,
            parent_span_id: record.parent_span_id.map(SpanId::new),
            name: record.name,
            kind: record.kind,
            start_time: record.start_time_unix_nano,
            end_time: record.end_time_unix_nano,
            status: record.status,
            status_message: record.status_message,
            attributes: record.attributes,
            events,
            links,
            back_links,
        };

        // Most arrivals extend a recently active trace, so scan
        // most-recent-first.
        let pos = self.traces.iter().rposition(|t| t.trace_id == trace_id);
        match pos {
            Some(pos) => {
                let trace = self.traces.get_mut(pos).expect("position just found");
                let became_first = trace.insert_span(span);
                if became_first {
                    // The trace's order key changed; splice it back in.
                    let trace = self.traces.remove_at(pos);
                    let index = self.ordered_index(trace.first_span().start_time);
                    let evicted = self.traces.insert(index, trace);
                    debug_assert!(evicted.is_none(), "reposition must not change occupancy");
                }
            }
            None => {
                let trace = Trace::new(trace_id, span);
                let index = self.ordered_index(trace.first_span().start_time);
                if let Some(evicted) = self.traces.insert(index, trace) {
                    self.prune_trace(&evicted);
                }
            }
        }
        Ok(())
    }

    /// Position keeping the buffer non-decreasing by first-span start.
    /// Scans backward from the true end of the buffer while the earlier
    /// slot has a greater-or-equal order key.
    fn ordered_index(&self, start_time: u64) -> usize {
        let mut index = self.traces.len();
        while index > 0 && self.traces[index - 1].first_span().start_time >= start_time {
            index -= 1;
        }
        index
    }

    /// Eviction cleanup. Walks only the evicted trace's own spans and
    /// links: owned links leave the index (and their back-link copies on
    /// surviving targets), and the bucket keyed by each evicted span is
    /// dropped so a future span reusing the ids cannot pick up a stale
    /// back-link.
    fn prune_trace(&mut self, evicted: &Trace) {
        for span in evicted.spans() {
            for link in &span.links {
                self.links.remove_owned(link);
                let pos = self
                    .traces
                    .iter()
                    .rposition(|t| t.trace_id == link.trace_id);
                if let Some(pos) = pos {
                    if let Some(target) = self
                        .traces
                        .get_mut(pos)
                        .and_then(|t| t.span_mut(&link.span_id))
                    {
                        target
                            .back_links
                            .retain(|bl| !bl.owned_by(&span.trace_id, &span.span_id));
                    }
                }
            }
            self.links.remove_target(&span.trace_id, &span.span_id);
        }
    }

    fn verify_consistency(&self) {
        // Invariant: non-decreasing by first-span start time.
        for i in 1..self.traces.len() {
            let prev = self.traces[i - 1].first_span().start_time;
            let cur = self.traces[i].first_span().start_time;
            assert!(
                prev <= cur,
                "trace ordering violated at index {i}: {prev} > {cur}"
            );
        }

        // Invariant: every indexed link has exactly one live owning span
        // that still lists it.
        for link in self.links.iter_links() {
            let owner = self
                .traces
                .iter()
                .find(|t| t.trace_id == link.source_trace_id)
                .and_then(|t| t.span(&link.source_span_id));
            let owner = owner.unwrap_or_else(|| {
                panic!(
                    "orphaned link in index: {} -> {} has no owning span",
                    link.source_span_id, link.span_id
                )
            });
            assert!(
                owner
                    .links
                    .iter()
                    .any(|l| l.trace_id == link.trace_id && l.span_id == link.span_id),
                "owning span does not list indexed link"
            );
        }

        // Invariant: every back-link points back at a live owning span.
        for trace in self.traces.iter() {
            for span in trace.spans() {
                for bl in &span.back_links {
                    let owner = self
                        .traces
                        .iter()
                        .find(|t| t.trace_id == bl.source_trace_id)
                        .and_then(|t| t.span(&bl.source_span_id));
                    assert!(
                        owner.is_some(),
                        "dangling back-link on span {}: owner {} evicted but not pruned",
                        span.span_id,
                        bl.source_span_id
                    );
                }
            }
        }
    }
}
