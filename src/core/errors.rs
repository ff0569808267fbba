/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::InlineString;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Per-record ingestion failures. Never abort a batch: the offending
/// record is counted and skipped, processing continues.
#[derive(Error, Debug, Clone, Serialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum IngestError {
    #[error("resource is missing required identity attribute `{0}`")]
    #[diagnostic(
        code(ingest::missing_identity),
        help("Producers must set service.name on the OTLP resource.")
    )]
    MissingIdentity(InlineString),

    #[error("span record has an empty trace id")]
    #[diagnostic(
        code(ingest::empty_trace_id),
        help("OTLP span records require a non-zero trace id.")
    )]
    EmptyTraceId,

    #[error("span record has an empty span id")]
    #[diagnostic(
        code(ingest::empty_span_id),
        help("OTLP span records require a non-zero span id.")
    )]
    EmptySpanId,

    #[error("metric record from meter `{0}` has no name")]
    #[diagnostic(
        code(ingest::unnamed_metric),
        help("Metric records require a non-empty name.")
    )]
    UnnamedMetric(InlineString),
}

/// Query input errors, surfaced synchronously to the caller.
/// Not-found is never an error; it is an empty/absent result.
#[derive(Error, Debug, Clone, Serialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum QueryError {
    #[error("trace id prefix `{0}` matches more than one trace")]
    #[diagnostic(
        code(query::ambiguous_trace_id),
        help("Provide more hex digits of the trace id to disambiguate.")
    )]
    AmbiguousTraceId(String),
}
