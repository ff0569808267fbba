/*!
 * Telemetry Store
 * Bounded in-memory repository for OTLP traces, logs, and metrics
 *
 * Ingests resource → scope → record batches from many producers, holds
 * a bounded recent window of each signal, and serves filtered,
 * paginated, snapshot-consistent queries plus change notifications.
 */

pub mod applications;
pub mod core;
pub mod logs;
pub mod metrics;
pub mod otlp;
pub mod query;
pub mod repository;
pub mod subscriptions;
pub mod traces;

// Re-exports
pub use crate::core::buffer::BoundedOrderedBuffer;
pub use crate::core::errors::{IngestError, QueryError};
pub use crate::core::types::{
    ApplicationKey, Attributes, InlineString, Severity, SpanId, SpanKind, SpanStatus, TraceId,
};
pub use applications::{Application, ApplicationRegistry, ApplicationView, Scope};
pub use logs::{LogEntry, LogQuery, LogStore};
pub use metrics::{InstrumentSummary, MetricStore};
pub use query::{FieldFilter, FilterCondition, PagedResult};
pub use repository::{RepositoryConfig, TelemetryRepository};
pub use subscriptions::{SignalKind, Subscription, SubscriptionHub, SubscriptionKind};
pub use traces::{GetTracesResult, Span, SpanEvent, SpanLink, Trace, TraceQuery, TraceStore};
