/*!
 * Telemetry Repository
 * Façade wiring the application registry, per-signal stores, and the
 * subscription hub
 *
 * Ingestion resolves the application view, applies the batch to the
 * owning store under its write lock, then notifies subscribers after
 * every lock is released. Queries return cloned snapshots.
 */

use crate::applications::{Application, ApplicationRegistry, ApplicationView};
use crate::core::errors::QueryError;
use crate::core::limits::{
    DEFAULT_LOG_CAPACITY, DEFAULT_MAX_SPAN_EVENTS, DEFAULT_METRIC_POINT_CAPACITY,
    DEFAULT_TRACE_CAPACITY,
};
use crate::core::types::{ApplicationKey, InlineString, SpanId, TraceId};
use crate::logs::{LogEntry, LogQuery, LogStore};
use crate::metrics::{InstrumentSummary, MetricDataPoint, MetricStore};
use crate::otlp::{ResourceLogs, ResourceMetrics, ResourceSpans};
use crate::query::PagedResult;
use crate::subscriptions::{SignalKind, Subscription, SubscriptionHub, SubscriptionKind};
use crate::traces::{GetTracesResult, Span, Trace, TraceQuery, TraceStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Buffer capacities, fixed at repository construction
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub max_trace_count: usize,
    pub max_log_count: usize,
    pub max_span_events: usize,
    pub max_metric_points: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_trace_count: DEFAULT_TRACE_CAPACITY,
            max_log_count: DEFAULT_LOG_CAPACITY,
            max_span_events: DEFAULT_MAX_SPAN_EVENTS,
            max_metric_points: DEFAULT_METRIC_POINT_CAPACITY,
        }
    }
}

/// In-process telemetry store over a bounded recent window of each
/// signal. Safe to share across ingestion and query threads.
pub struct TelemetryRepository {
    applications: ApplicationRegistry,
    hub: SubscriptionHub,
    traces: TraceStore,
    logs: LogStore,
    metrics: MetricStore,
}

impl TelemetryRepository {
    pub fn new(config: RepositoryConfig) -> Self {
        Self {
            applications: ApplicationRegistry::new(),
            hub: SubscriptionHub::new(),
            traces: TraceStore::new(config.max_trace_count, config.max_span_events),
            logs: LogStore::new(config.max_log_count),
            metrics: MetricStore::new(config.max_metric_points),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RepositoryConfig::default())
    }

    // -----------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------

    /// Apply a trace export batch. Failures are isolated per record and
    /// accumulated into `failures`; processing never aborts the batch.
    pub fn add_traces(&self, failures: &AtomicU64, batch: Vec<ResourceSpans>) {
        let mut changed: Vec<ApplicationKey> = Vec::new();
        for group in batch {
            let view = match self.resolve_view(&group.resource, group.record_count(), failures) {
                Some(view) => view,
                None => continue,
            };
            for scope_group in group.scopes {
                self.traces
                    .add_spans(&view, &scope_group.scope, scope_group.spans, failures);
            }
            push_unique(&mut changed, &view.application_key);
        }
        if !changed.is_empty() {
            self.hub.notify(SignalKind::Traces, &changed);
        }
    }

    /// Apply a log export batch. Unviewed-error counting is suppressed
    /// for applications currently covered by a Read subscription.
    pub fn add_logs(&self, failures: &AtomicU64, batch: Vec<ResourceLogs>) {
        let mut changed: Vec<ApplicationKey> = Vec::new();
        for group in batch {
            let view = match self.resolve_view(&group.resource, group.record_count(), failures) {
                Some(view) => view,
                None => continue,
            };
            let suppress = self
                .hub
                .read_log_subscription_covers(&view.application_key);
            for scope_group in group.scopes {
                self.logs.add_records(
                    &view,
                    &scope_group.scope,
                    scope_group.records,
                    failures,
                    suppress,
                );
            }
            push_unique(&mut changed, &view.application_key);
        }
        if !changed.is_empty() {
            self.hub.notify(SignalKind::Logs, &changed);
        }
    }

    /// Apply a metric export batch
    pub fn add_metrics(&self, failures: &AtomicU64, batch: Vec<ResourceMetrics>) {
        let mut changed: Vec<ApplicationKey> = Vec::new();
        for group in batch {
            let view = match self.resolve_view(&group.resource, group.record_count(), failures) {
                Some(view) => view,
                None => continue,
            };
            for scope_group in group.scopes {
                self.metrics
                    .add_metrics(&view, &scope_group.scope, scope_group.metrics, failures);
            }
            push_unique(&mut changed, &view.application_key);
        }
        if !changed.is_empty() {
            self.hub.notify(SignalKind::Metrics, &changed);
        }
    }

    fn resolve_view(
        &self,
        resource: &crate::otlp::Resource,
        record_count: usize,
        failures: &AtomicU64,
    ) -> Option<Arc<ApplicationView>> {
        match self.applications.get_or_create_view(resource, &self.hub) {
            Ok(view) => Some(view),
            Err(err) => {
                failures.fetch_add(record_count as u64, Ordering::Relaxed);
                warn!(error = %err, records = record_count, "resource group rejected");
                None
            }
        }
    }

    // -----------------------------------------------------------------
    // Applications
    // -----------------------------------------------------------------

    pub fn get_applications(&self) -> Vec<Arc<Application>> {
        self.applications.all()
    }

    pub fn get_applications_by_name(&self, name: &str) -> Vec<Arc<Application>> {
        self.applications.by_name(name)
    }

    pub fn get_application(&self, key: &ApplicationKey) -> Option<Arc<Application>> {
        self.applications.get(key)
    }

    pub fn get_applications_by_key(&self, key: &ApplicationKey) -> Vec<Arc<Application>> {
        self.applications.by_key(key)
    }

    // -----------------------------------------------------------------
    // Traces
    // -----------------------------------------------------------------

    pub fn get_traces(&self, query: &TraceQuery) -> GetTracesResult {
        self.traces.get_traces(query)
    }

    /// Lookup by full hex trace id or unique hex prefix
    pub fn get_trace(&self, id_or_prefix: &str) -> Result<Option<Trace>, QueryError> {
        self.traces.get_trace(id_or_prefix)
    }

    pub fn get_span(&self, trace_id: &TraceId, span_id: &SpanId) -> Option<Span> {
        self.traces.get_span(trace_id, span_id)
    }

    pub fn get_trace_property_keys(&self, filter: Option<&ApplicationKey>) -> Vec<InlineString> {
        self.traces.property_keys(filter)
    }

    pub fn get_trace_field_values(&self, field: &str) -> BTreeMap<String, u64> {
        self.traces.field_values(field)
    }

    // -----------------------------------------------------------------
    // Logs
    // -----------------------------------------------------------------

    pub fn get_logs(&self, query: &LogQuery) -> PagedResult<LogEntry> {
        self.logs.get_logs(query)
    }

    pub fn get_log_property_keys(&self, filter: Option<&ApplicationKey>) -> Vec<InlineString> {
        self.logs.property_keys(filter)
    }

    pub fn get_logs_field_values(&self, field: &str) -> BTreeMap<String, u64> {
        self.logs.field_values(field)
    }

    pub fn get_application_unviewed_error_logs_count(&self) -> HashMap<ApplicationKey, u64> {
        self.logs.unviewed_error_counts()
    }

    /// Zero unviewed-error badges for matching applications (all, when
    /// no filter) and notify log subscribers
    pub fn mark_viewed_error_logs(&self, filter: Option<&ApplicationKey>) {
        self.logs.mark_viewed(filter);
        match filter {
            Some(key) => self.hub.notify(SignalKind::Logs, &[key.clone()]),
            None => self.hub.notify_all(SignalKind::Logs),
        }
    }

    // -----------------------------------------------------------------
    // Metrics
    // -----------------------------------------------------------------

    pub fn get_instruments(&self, filter: Option<&ApplicationKey>) -> Vec<InstrumentSummary> {
        self.metrics.instruments(filter)
    }

    pub fn get_metric_data_points(
        &self,
        application_key: &ApplicationKey,
        meter: &str,
        name: &str,
    ) -> Vec<MetricDataPoint> {
        self.metrics.data_points(application_key, meter, name)
    }

    // -----------------------------------------------------------------
    // Clearing
    // -----------------------------------------------------------------

    pub fn clear_traces(&self, filter: Option<&ApplicationKey>) -> usize {
        let removed = self.traces.clear(filter);
        self.notify_after_clear(SignalKind::Traces, filter);
        removed
    }

    pub fn clear_structured_logs(&self, filter: Option<&ApplicationKey>) -> usize {
        let removed = self.logs.clear(filter);
        self.notify_after_clear(SignalKind::Logs, filter);
        removed
    }

    pub fn clear_metrics(&self, filter: Option<&ApplicationKey>) -> usize {
        let removed = self.metrics.clear(filter);
        self.notify_after_clear(SignalKind::Metrics, filter);
        removed
    }

    pub fn clear_all_signals(&self) {
        self.clear_traces(None);
        self.clear_structured_logs(None);
        self.clear_metrics(None);
    }

    fn notify_after_clear(&self, signal: SignalKind, filter: Option<&ApplicationKey>) {
        match filter {
            Some(key) => self.hub.notify(signal, &[key.clone()]),
            None => self.hub.notify_all(signal),
        }
    }

    // -----------------------------------------------------------------
    // Change notification
    // -----------------------------------------------------------------

    pub fn on_new_applications(
        &self,
        name: impl Into<InlineString>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.hub
            .subscribe(SignalKind::Applications, name, None, SubscriptionKind::Other, callback)
    }

    pub fn on_new_logs(
        &self,
        name: impl Into<InlineString>,
        application_key: Option<ApplicationKey>,
        kind: SubscriptionKind,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.hub
            .subscribe(SignalKind::Logs, name, application_key, kind, callback)
    }

    pub fn on_new_traces(
        &self,
        name: impl Into<InlineString>,
        application_key: Option<ApplicationKey>,
        kind: SubscriptionKind,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.hub
            .subscribe(SignalKind::Traces, name, application_key, kind, callback)
    }

    pub fn on_new_metrics(
        &self,
        name: impl Into<InlineString>,
        application_key: Option<ApplicationKey>,
        kind: SubscriptionKind,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.hub
            .subscribe(SignalKind::Metrics, name, application_key, kind, callback)
    }

    /// Debug/test-only O(n) internal-consistency pass over the trace
    /// index. Panics on violation.
    pub fn verify_consistency(&self) {
        self.traces.verify_consistency();
    }
}

fn push_unique(changed: &mut Vec<ApplicationKey>, key: &ApplicationKey) {
    if !changed.contains(key) {
        changed.push(key.clone());
    }
}
