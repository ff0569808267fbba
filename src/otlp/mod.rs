/*!
 * OTLP Ingestion Model
 * Batches as delivered by the transport layer: resource, then
 * instrumentation scope, then records
 *
 * The transport (out of scope here) is responsible for decoding the wire
 * protocol into these structures; the store consumes them by value.
 */

use crate::core::errors::IngestError;
use crate::core::types::{ApplicationKey, AttributeValue, Attributes, InlineString, UnixNanos};
use bytes::Bytes;

/// Resource attribute carrying the producer's logical name
pub const SERVICE_NAME: &str = "service.name";
/// Resource attribute carrying the producer's instance id
pub const SERVICE_INSTANCE_ID: &str = "service.instance.id";

/// Producer identity and attributes for one batch
#[derive(Debug, Clone, Default)]
pub struct Resource {
    pub attributes: Attributes,
}

impl Resource {
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }

    /// Extract the application identity. A resource without a
    /// `service.name` cannot be attributed and fails the whole
    /// resource group (counted per contained record).
    pub fn application_key(&self) -> Result<ApplicationKey, IngestError> {
        let name = self
            .attributes
            .get_text(SERVICE_NAME)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| IngestError::MissingIdentity(SERVICE_NAME.into()))?;
        // A producer that does not report an instance id is treated as a
        // single unnamed instance, not as an all-instances filter.
        let instance_id = self
            .attributes
            .get_text(SERVICE_INSTANCE_ID)
            .map(|id| InlineString::from(id.as_ref()))
            .unwrap_or_default();
        Ok(ApplicationKey::new(
            InlineString::from(name.as_ref()),
            instance_id,
        ))
    }
}

/// Instrumentation scope metadata as it appears on the wire
#[derive(Debug, Clone, Default)]
pub struct ScopeInfo {
    pub name: InlineString,
    pub version: InlineString,
}

impl ScopeInfo {
    pub fn new(name: impl Into<InlineString>, version: impl Into<InlineString>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Traces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ResourceSpans {
    pub resource: Resource,
    pub scopes: Vec<ScopeSpans>,
}

#[derive(Debug, Clone)]
pub struct ScopeSpans {
    pub scope: ScopeInfo,
    pub spans: Vec<SpanRecord>,
}

#[derive(Debug, Clone)]
pub struct SpanRecord {
    pub trace_id: Bytes,
    pub span_id: Bytes,
    pub parent_span_id: Option<Bytes>,
    pub name: InlineString,
    pub kind: crate::core::types::SpanKind,
    pub start_time_unix_nano: UnixNanos,
    pub end_time_unix_nano: UnixNanos,
    pub status: crate::core::types::SpanStatus,
    pub status_message: InlineString,
    pub attributes: Attributes,
    pub events: Vec<SpanEventRecord>,
    pub links: Vec<SpanLinkRecord>,
}

#[derive(Debug, Clone)]
pub struct SpanEventRecord {
    pub name: InlineString,
    pub time_unix_nano: UnixNanos,
    pub attributes: Attributes,
}

#[derive(Debug, Clone)]
pub struct SpanLinkRecord {
    pub trace_id: Bytes,
    pub span_id: Bytes,
    pub trace_state: InlineString,
    pub attributes: Attributes,
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ResourceLogs {
    pub resource: Resource,
    pub scopes: Vec<ScopeLogs>,
}

#[derive(Debug, Clone)]
pub struct ScopeLogs {
    pub scope: ScopeInfo,
    pub records: Vec<LogRecord>,
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub time_unix_nano: UnixNanos,
    pub severity_number: u32,
    pub severity_text: InlineString,
    pub body: AttributeValue,
    pub trace_id: Option<Bytes>,
    pub span_id: Option<Bytes>,
    pub attributes: Attributes,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ResourceMetrics {
    pub resource: Resource,
    pub scopes: Vec<ScopeMetrics>,
}

#[derive(Debug, Clone)]
pub struct ScopeMetrics {
    pub scope: ScopeInfo,
    pub metrics: Vec<MetricRecord>,
}

#[derive(Debug, Clone)]
pub struct MetricRecord {
    pub name: InlineString,
    pub description: InlineString,
    pub unit: InlineString,
    pub points: Vec<MetricPoint>,
}

#[derive(Debug, Clone)]
pub struct MetricPoint {
    pub time_unix_nano: UnixNanos,
    pub value: f64,
    pub attributes: Attributes,
}

impl ResourceSpans {
    /// Number of span records across every scope, used to charge the
    /// failure counter when the whole resource group is rejected.
    pub fn record_count(&self) -> usize {
        self.scopes.iter().map(|s| s.spans.len()).sum()
    }
}

impl ResourceLogs {
    pub fn record_count(&self) -> usize {
        self.scopes.iter().map(|s| s.records.len()).sum()
    }
}

impl ResourceMetrics {
    pub fn record_count(&self) -> usize {
        self.scopes.iter().map(|s| s.metrics.len()).sum()
    }
}
