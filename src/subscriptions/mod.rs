/*!
 * Subscription Hub
 * Decouples ingestion from change-notification delivery
 *
 * Callbacks run synchronously on the mutating thread, after the domain
 * write lock has been released. The list is snapshotted under the hub
 * lock before dispatch, so a callback may re-enter the repository or
 * drop its own subscription handle without deadlocking.
 */

use crate::core::limits::DEFAULT_SUBSCRIPTION_MIN_INTERVAL;
use crate::core::types::{ApplicationKey, InlineString};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Signal domain a subscription listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Applications,
    Logs,
    Traces,
    Metrics,
}

/// Distinguishes subscribers that actively consume the signal.
/// A `Read` log subscription covering an application suppresses its
/// unviewed-error counting while registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Read,
    Other,
}

type Callback = Arc<dyn Fn() + Send + Sync>;

struct SubEntry {
    id: u64,
    name: InlineString,
    application_key: Option<ApplicationKey>,
    kind: SubscriptionKind,
    callback: Callback,
}

impl SubEntry {
    fn covers(&self, changed: &[ApplicationKey]) -> bool {
        match &self.application_key {
            None => true,
            Some(filter) => changed.iter().any(|key| filter.matches(key)),
        }
    }
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    applications: Vec<SubEntry>,
    logs: Vec<SubEntry>,
    traces: Vec<SubEntry>,
    metrics: Vec<SubEntry>,
}

impl HubInner {
    fn list_mut(&mut self, signal: SignalKind) -> &mut Vec<SubEntry> {
        match signal {
            SignalKind::Applications => &mut self.applications,
            SignalKind::Logs => &mut self.logs,
            SignalKind::Traces => &mut self.traces,
            SignalKind::Metrics => &mut self.metrics,
        }
    }

    fn list(&self, signal: SignalKind) -> &[SubEntry] {
        match signal {
            SignalKind::Applications => &self.applications,
            SignalKind::Logs => &self.logs,
            SignalKind::Traces => &self.traces,
            SignalKind::Metrics => &self.metrics,
        }
    }
}

/// Registry of change listeners per signal domain
#[derive(Clone, Default)]
pub struct SubscriptionHub {
    inner: Arc<Mutex<HubInner>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. The returned handle unregisters on drop.
    pub fn subscribe(
        &self,
        signal: SignalKind,
        name: impl Into<InlineString>,
        application_key: Option<ApplicationKey>,
        kind: SubscriptionKind,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let name = name.into();
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        debug!(subscription = %name, ?signal, "subscription registered");
        inner.list_mut(signal).push(SubEntry {
            id,
            name,
            application_key,
            kind,
            callback: Arc::new(callback),
        });
        Subscription {
            hub: Arc::clone(&self.inner),
            signal,
            id,
            min_execute_interval: DEFAULT_SUBSCRIPTION_MIN_INTERVAL,
        }
    }

    /// Notify every live subscription on `signal` whose application
    /// filter covers one of the changed applications. Callbacks are
    /// snapshotted under the lock and invoked after it is released.
    pub fn notify(&self, signal: SignalKind, changed: &[ApplicationKey]) {
        let callbacks: Vec<Callback> = {
            let inner = self.inner.lock();
            inner
                .list(signal)
                .iter()
                .filter(|entry| entry.covers(changed))
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    /// Notify every subscription on `signal` regardless of filter
    /// (used for global clears and new-application announcements).
    pub fn notify_all(&self, signal: SignalKind) {
        let callbacks: Vec<Callback> = {
            let inner = self.inner.lock();
            inner
                .list(signal)
                .iter()
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    /// True when a currently-registered `Read` log subscription covers
    /// `key`. Used to suppress unviewed-error counting so a badge does
    /// not flash for an application someone is already watching.
    pub fn read_log_subscription_covers(&self, key: &ApplicationKey) -> bool {
        let inner = self.inner.lock();
        inner.logs.iter().any(|entry| {
            entry.kind == SubscriptionKind::Read
                && entry
                    .application_key
                    .as_ref()
                    .map_or(true, |filter| filter.matches(key))
        })
    }

    #[cfg(test)]
    pub(crate) fn subscription_count(&self, signal: SignalKind) -> usize {
        self.inner.lock().list(signal).len()
    }
}

impl fmt::Debug for SubscriptionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SubscriptionHub")
            .field("applications", &inner.applications.len())
            .field("logs", &inner.logs.len())
            .field("traces", &inner.traces.len())
            .field("metrics", &inner.metrics.len())
            .finish()
    }
}

/// RAII subscription handle; dropping it removes the listener
pub struct Subscription {
    hub: Arc<Mutex<HubInner>>,
    signal: SignalKind,
    id: u64,
    min_execute_interval: Duration,
}

impl Subscription {
    /// Debounce hint for dependents: coalesce callback executions to at
    /// most one per interval. The hub does not enforce this.
    #[inline]
    pub fn min_execute_interval(&self) -> Duration {
        self.min_execute_interval
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("signal", &self.signal)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut inner = self.hub.lock();
        let list = inner.list_mut(self.signal);
        if let Some(pos) = list.iter().position(|entry| entry.id == self.id) {
            let entry = list.remove(pos);
            debug!(subscription = %entry.name, signal = ?self.signal, "subscription removed");
        }
    }
}
