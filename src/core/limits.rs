/*!
 * Store Limits and Constants
 *
 * Centralized location for capacity defaults and intervals.
 * All values include rationale comments explaining WHY they exist.
 */

use std::time::Duration;

/// Default trace window capacity (traces, not spans)
/// Bounds memory and keeps the O(n) ordered-insert scan cheap
pub const DEFAULT_TRACE_CAPACITY: usize = 10_000;

/// Default structured-log window capacity (entries)
pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

/// Maximum events retained per span
/// Runaway producers can attach unbounded event lists; excess is dropped
pub const DEFAULT_MAX_SPAN_EVENTS: usize = 100;

/// Data points retained per instrument
/// Metrics arrive continuously; the window only serves recent charts
pub const DEFAULT_METRIC_POINT_CAPACITY: usize = 4_096;

/// Debounce hint attached to subscriptions
/// Dependents (UI re-renders) are expected to coalesce callbacks to at
/// most one execution per interval; the hub itself does not throttle
pub const DEFAULT_SUBSCRIPTION_MIN_INTERVAL: Duration = Duration::from_millis(100);
