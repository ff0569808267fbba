/*!
 * Core Primitives
 * Types, limits, errors, and the bounded buffer shared by all domains
 */

pub mod buffer;
pub mod errors;
pub mod limits;
pub mod types;

pub use buffer::BoundedOrderedBuffer;
pub use errors::{IngestError, QueryError};
pub use types::{
    ApplicationKey, AttributeValue, Attributes, InlineString, Severity, SpanId, SpanKind,
    SpanStatus, TraceId, UnixNanos,
};
