/*!
 * Application Registry
 * Lazily maps producer identity to shared application records and
 * immutable per-resource attribute views
 *
 * Get-or-create is served by a concurrent map so the ordinary get path
 * never touches a signal store's mutation lock.
 */

use crate::core::types::{ApplicationKey, Attributes, InlineString};
use crate::otlp::{Resource, ScopeInfo};
use crate::subscriptions::{SignalKind, SubscriptionHub};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared record for one application identity. Holds every attribute
/// view observed for the identity; the record itself never changes.
#[derive(Debug)]
pub struct Application {
    key: ApplicationKey,
    views: Mutex<Vec<Arc<ApplicationView>>>,
    view_seq: AtomicU64,
}

impl Application {
    fn new(key: ApplicationKey) -> Self {
        Self {
            key,
            views: Mutex::new(Vec::new()),
            view_seq: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn key(&self) -> &ApplicationKey {
        &self.key
    }

    /// Snapshot of every view observed so far, oldest first
    pub fn views(&self) -> Vec<Arc<ApplicationView>> {
        self.views.lock().clone()
    }

    /// Reuse the view with identical attributes, or record a new one.
    /// Attribute changes always produce a new immutable view (the old
    /// one stays referenced by already-ingested records).
    fn view_for(self: &Arc<Self>, attributes: &Attributes) -> Arc<ApplicationView> {
        let mut views = self.views.lock();
        if let Some(existing) = views.iter().find(|v| attributes_equal(&v.attributes, attributes)) {
            return Arc::clone(existing);
        }
        let view = Arc::new(ApplicationView {
            application_key: self.key.clone(),
            view_id: self.view_seq.fetch_add(1, Ordering::Relaxed),
            attributes: attributes.clone(),
        });
        views.push(Arc::clone(&view));
        view
    }
}

fn attributes_equal(a: &Attributes, b: &Attributes) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Immutable snapshot of an application's resource attributes at a
/// point in ingestion time. The key is the back-reference to the shared
/// record; resolve it through the registry.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_key: ApplicationKey,
    pub view_id: u64,
    pub attributes: Attributes,
}

/// Thread-safe identity → application map, created lazily on the first
/// resource seen for an identity
pub struct ApplicationRegistry {
    applications: DashMap<ApplicationKey, Arc<Application>, RandomState>,
}

impl ApplicationRegistry {
    pub fn new() -> Self {
        Self {
            applications: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Resolve the view for a batch's resource, creating the application
    /// record on first sight. New applications are announced through the
    /// hub after the map shard lock is released.
    pub fn get_or_create_view(
        &self,
        resource: &Resource,
        hub: &SubscriptionHub,
    ) -> Result<Arc<ApplicationView>, crate::core::errors::IngestError> {
        let key = resource.application_key()?;
        let mut created = false;
        let application = self
            .applications
            .entry(key.clone())
            .or_insert_with(|| {
                created = true;
                Arc::new(Application::new(key.clone()))
            })
            .clone();
        if created {
            debug!(application = %key, "application registered");
            hub.notify_all(SignalKind::Applications);
        }
        Ok(application.view_for(&resource.attributes))
    }

    pub fn get(&self, key: &ApplicationKey) -> Option<Arc<Application>> {
        self.applications.get(key).map(|entry| Arc::clone(&entry))
    }

    /// Every known application, ordered by key
    pub fn all(&self) -> Vec<Arc<Application>> {
        let mut apps: Vec<_> = self
            .applications
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        apps.sort_by(|a, b| a.key().cmp(b.key()));
        apps
    }

    pub fn by_name(&self, name: &str) -> Vec<Arc<Application>> {
        self.by_key(&ApplicationKey::all_instances(name))
    }

    /// Applications matched by a filter key (`instance_id = None`
    /// matches every instance of the name)
    pub fn by_key(&self, filter: &ApplicationKey) -> Vec<Arc<Application>> {
        let mut apps: Vec<_> = self
            .applications
            .iter()
            .filter(|entry| filter.matches(entry.key()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        apps.sort_by(|a, b| a.key().cmp(b.key()));
        apps
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

impl Default for ApplicationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared instrumentation-scope instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub name: InlineString,
    pub version: InlineString,
}

/// Deduplicates scope metadata per signal store, so repeated scope
/// objects in a batch share one instance. Lives under the owning
/// store's write lock.
#[derive(Debug, Default)]
pub struct ScopeCatalog {
    scopes: HashMap<(InlineString, InlineString), Arc<Scope>>,
}

impl ScopeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_add(&mut self, info: &ScopeInfo) -> Arc<Scope> {
        let key = (info.name.clone(), info.version.clone());
        Arc::clone(self.scopes.entry(key).or_insert_with(|| {
            Arc::new(Scope {
                name: info.name.clone(),
                version: info.version.clone(),
            })
        }))
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.scopes.len()
    }
}
