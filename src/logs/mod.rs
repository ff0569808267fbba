/*!
 * Log Store
 * Timestamp-ordered structured log window with per-application
 * unviewed-error counters
 *
 * Entries arrive out of order; the insertion key is the record
 * timestamp, not arrival order. Counters are reconciled synchronously
 * when an unviewed error entry is evicted.
 */

use crate::applications::{ApplicationView, Scope, ScopeCatalog};
use crate::core::buffer::BoundedOrderedBuffer;
use crate::core::types::{
    ApplicationKey, AttributeValue, Attributes, InlineString, Severity, SpanId, TraceId, UnixNanos,
};
use crate::otlp::{LogRecord, ScopeInfo};
use crate::query::{paginate, FieldFilter, PagedResult};
use parking_lot::RwLock;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::debug;

/// Intrinsic log field names recognized by filters and histograms.
/// Any other field name resolves to an attribute lookup.
pub mod log_fields {
    pub const MESSAGE: &str = "message";
    pub const SEVERITY: &str = "severity";
    pub const TRACE_ID: &str = "trace.id";
    pub const SPAN_ID: &str = "span.id";
    pub const APPLICATION: &str = "application";
}

/// One structured log entry as served to readers
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Monotonic id assigned at ingestion, stable across queries
    pub internal_id: u64,
    pub timestamp: UnixNanos,
    pub severity: Severity,
    pub message: InlineString,
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
    pub application: Arc<ApplicationView>,
    pub scope: Arc<Scope>,
    pub attributes: Attributes,
    /// Set while this error-severity entry counts toward its
    /// application's unviewed badge
    #[serde(skip)]
    unviewed_error: bool,
}

impl LogEntry {
    pub fn field_value(&self, field: &str) -> Option<Cow<'_, str>> {
        match field {
            log_fields::MESSAGE => Some(Cow::Borrowed(self.message.as_str())),
            log_fields::SEVERITY => Some(Cow::Borrowed(self.severity.as_str())),
            log_fields::TRACE_ID => self.trace_id.as_ref().map(|id| Cow::Owned(id.hex())),
            log_fields::SPAN_ID => self.span_id.as_ref().map(|id| Cow::Owned(id.hex())),
            log_fields::APPLICATION => {
                Some(Cow::Borrowed(self.application.application_key.name.as_str()))
            }
            _ => self.attributes.get_text(field),
        }
    }

    pub fn matches_all(&self, filters: &[FieldFilter]) -> bool {
        filters
            .iter()
            .all(|f| f.matches(self.field_value(&f.field).as_deref()))
    }
}

/// Log listing query
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub application_key: Option<ApplicationKey>,
    pub start_index: usize,
    pub count: usize,
    pub filters: Vec<FieldFilter>,
}

struct LogStoreInner {
    entries: BoundedOrderedBuffer<LogEntry>,
    scopes: ScopeCatalog,
    next_id: u64,
    unviewed_errors: HashMap<ApplicationKey, u64>,
    property_keys: HashMap<ApplicationKey, BTreeSet<InlineString>>,
}

pub struct LogStore {
    inner: RwLock<LogStoreInner>,
}

impl LogStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(LogStoreInner {
                entries: BoundedOrderedBuffer::new(capacity),
                scopes: ScopeCatalog::new(),
                next_id: 0,
                unviewed_errors: HashMap::new(),
                property_keys: HashMap::new(),
            }),
        }
    }

    /// Ingest one scope group of log records. `suppress_unviewed` is
    /// true while a registered Read subscription already covers the
    /// application, so the unviewed badge never flashes for a consumer
    /// that is actively watching.
    pub fn add_records(
        &self,
        view: &Arc<ApplicationView>,
        scope_info: &ScopeInfo,
        records: Vec<LogRecord>,
        failures: &AtomicU64,
        suppress_unviewed: bool,
    ) -> usize {
        let _ = failures; // log records have no rejectable shape today
        let mut inner = self.inner.write();
        let scope = inner.scopes.get_or_add(scope_info);
        let added = records.len();
        for record in records {
            inner.insert_record(view, &scope, record, suppress_unviewed);
        }
        added
    }

    /// Filtered, paginated log listing in timestamp order
    pub fn get_logs(&self, query: &LogQuery) -> PagedResult<LogEntry> {
        let inner = self.inner.read();
        let matched = inner
            .entries
            .iter()
            .filter(|e| {
                query
                    .application_key
                    .as_ref()
                    .map_or(true, |key| key.matches(&e.application.application_key))
            })
            .filter(|e| e.matches_all(&query.filters));
        paginate(
            matched,
            query.start_index,
            query.count,
            inner.entries.is_full(),
        )
    }

    /// Sorted distinct attribute keys seen per matching application
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

    /// Value → count histogram of one log field across the window
    pub fn field_values(&self, field: &str) -> BTreeMap<String, u64> {
        let inner = self.inner.read();
        let mut counts = BTreeMap::new();
        for entry in inner.entries.iter() {
            if let Some(value) = entry.field_value(field) {
                *counts.entry(value.into_owned()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Unviewed error-or-above counts per application
    pub fn unviewed_error_counts(&self) -> HashMap<ApplicationKey, u64> {
        let inner = self.inner.read();
        inner
            .unviewed_errors
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(key, count)| (key.clone(), *count))
            .collect()
    }

    /// Zero the unviewed counters for matching applications (all, when
    /// no filter) and mark their buffered error entries as viewed.
    pub fn mark_viewed(&self, filter: Option<&ApplicationKey>) {
        let mut inner = self.inner.write();
        match filter {
            None => inner.unviewed_errors.clear(),
            Some(key) => inner.unviewed_errors.retain(|app, _| !key.matches(app)),
        }
        for entry in inner.entries.iter_mut() {
            if entry.unviewed_error
                && filter.map_or(true, |f| f.matches(&entry.application.application_key))
            {
                entry.unviewed_error = false;
            }
        }
    }

    /// Remove matching entries (all, when no filter). Returns the
    /// number removed.
    pub fn clear(&self, filter: Option<&ApplicationKey>) -> usize {
        let mut inner = self.inner.write();
        let removed = match filter {
            None => {
                let count = inner.entries.len();
                inner.entries.clear();
                inner.unviewed_errors.clear();
                inner.property_keys.clear();
                count
            }
            Some(key) => {
                let drained = inner
                    .entries
                    .drain_where(|e| key.matches(&e.application.application_key));
                inner.unviewed_errors.retain(|app, _| !key.matches(app));
                inner.property_keys.retain(|app, _| !key.matches(app));
                drained.len()
            }
        };
        if removed > 0 {
            debug!(removed, "log entries cleared");
        }
        removed
    }

    pub fn entry_count(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_full(&self) -> bool {
        self.inner.read().entries.is_full()
    }
}

impl LogStoreInner {
    fn insert_record(
        &mut self,
        view: &Arc<ApplicationView>,
        scope: &Arc<Scope>,
        record: LogRecord,
        suppress_unviewed: bool,
    ) {
        self.next_id += 1;
        let severity = Severity::from_otlp(record.severity_number);
        let app_key = view.application_key.clone();

        let mut unviewed_error = false;
        if severity.is_error() && !suppress_unviewed {
            *self.unviewed_errors.entry(app_key.clone()).or_insert(0) += 1;
            unviewed_error = true;
        }

        let keys = self.property_keys.entry(app_key).or_default();
        for (key, _) in record.attributes.iter() {
            keys.insert(key.clone());
        }

        let entry = LogEntry {
            internal_id: self.next_id,
            timestamp: record.time_unix_nano,
            severity,
            message: message_text(&record.body),
            trace_id: record.trace_id.filter(|id| !id.is_empty()).map(TraceId::new),
            span_id: record.span_id.filter(|id| !id.is_empty()).map(SpanId::new),
            application: Arc::clone(view),
            scope: Arc::clone(scope),
            attributes: record.attributes,
            unviewed_error,
        };

        // Insertion key is the timestamp: scan backward from the end,
        // landing at 0 when nothing is older.
        let mut index = self.entries.len();
        while index > 0 && self.entries[index - 1].timestamp > entry.timestamp {
            index -= 1;
        }
        if let Some(evicted) = self.entries.insert(index, entry) {
            // Reconcile the badge before the insert is complete.
            if evicted.unviewed_error {
                if let Some(count) = self
                    .unviewed_errors
                    .get_mut(&evicted.application.application_key)
                {
                    *count = count.saturating_sub(1);
                }
            }
        }
    }
}

/// Render an OTLP log body as display text
fn message_text(body: &AttributeValue) -> InlineString {
    match body {
        AttributeValue::String(s) => s.as_str().into(),
        AttributeValue::Null => InlineString::new(),
        other => other.to_string().into(),
    }
}
