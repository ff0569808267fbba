/*!
 * Metric Store
 * Bounded per-instrument windows of recent data points
 *
 * Instruments are keyed by (application, meter scope, name). Points are
 * kept in timestamp order in a bounded window per instrument; the store
 * serves instrument summaries for chart/filter building.
 */

use crate::applications::{ApplicationView, Scope, ScopeCatalog};
use crate::core::buffer::BoundedOrderedBuffer;
use crate::core::errors::IngestError;
use crate::core::types::{ApplicationKey, Attributes, InlineString, UnixNanos};
use crate::otlp::{MetricRecord, ScopeInfo};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InstrumentKey {
    application: ApplicationKey,
    meter: InlineString,
    name: InlineString,
}

/// One recorded measurement
#[derive(Debug, Clone, Serialize)]
pub struct MetricDataPoint {
    pub timestamp: UnixNanos,
    pub value: f64,
    pub attributes: Attributes,
}

struct Instrument {
    description: InlineString,
    unit: InlineString,
    scope: Arc<Scope>,
    points: BoundedOrderedBuffer<MetricDataPoint>,
}

/// Read-side snapshot of one instrument
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentSummary {
    pub application_key: ApplicationKey,
    pub meter: InlineString,
    pub meter_version: InlineString,
    pub name: InlineString,
    pub description: InlineString,
    pub unit: InlineString,
    pub point_count: usize,
    pub latest_value: Option<f64>,
}

struct MetricStoreInner {
    scopes: ScopeCatalog,
    instruments: HashMap<InstrumentKey, Instrument>,
    max_points: usize,
}

pub struct MetricStore {
    inner: RwLock<MetricStoreInner>,
}

impl MetricStore {
    pub fn new(max_points: usize) -> Self {
        Self {
            inner: RwLock::new(MetricStoreInner {
                scopes: ScopeCatalog::new(),
                instruments: HashMap::new(),
                max_points,
            }),
        }
    }

    /// Ingest one scope group of metric records. Unnamed records are
    /// counted as failures and skipped.
    pub fn add_metrics(
        &self,
        view: &Arc<ApplicationView>,
        scope_info: &ScopeInfo,
        records: Vec<MetricRecord>,
        failures: &AtomicU64,
    ) -> usize {
        let mut inner = self.inner.write();
        let scope = inner.scopes.get_or_add(scope_info);
        let mut added = 0;
        for record in records {
            if record.name.is_empty() {
                failures.fetch_add(1, Ordering::Relaxed);
                let err = IngestError::UnnamedMetric(scope_info.name.clone());
                debug!(error = %err, "metric record rejected");
                continue;
            }
            inner.insert_record(view, &scope, scope_info, record);
            added += 1;
        }
        added
    }

    /// Instrument summaries for matching applications, ordered by
    /// (application, meter, name)
    pub fn instruments(&self, filter: Option<&ApplicationKey>) -> Vec<InstrumentSummary> {
        let inner = self.inner.read();
        let mut summaries: Vec<InstrumentSummary> = inner
            .instruments
            .iter()
            .filter(|(key, _)| filter.map_or(true, |f| f.matches(&key.application)))
            .map(|(key, instrument)| InstrumentSummary {
                application_key: key.application.clone(),
                meter: key.meter.clone(),
                meter_version: instrument.scope.version.clone(),
                name: key.name.clone(),
                description: instrument.description.clone(),
                unit: instrument.unit.clone(),
                point_count: instrument.points.len(),
                latest_value: instrument
                    .points
                    .iter()
                    .last()
                    .map(|p| p.value),
            })
            .collect();
        summaries.sort_by(|a, b| {
            (&a.application_key, &a.meter, &a.name).cmp(&(&b.application_key, &b.meter, &b.name))
        });
        summaries
    }

    /// Recent data points for one instrument, timestamp order
    pub fn data_points(
        &self,
        application_key: &ApplicationKey,
        meter: &str,
        name: &str,
    ) -> Vec<MetricDataPoint> {
        let inner = self.inner.read();
        inner
            .instruments
            .iter()
            .find(|(key, _)| {
                application_key.matches(&key.application)
                    && key.meter.as_str() == meter
                    && key.name.as_str() == name
            })
            .map(|(_, instrument)| instrument.points.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove matching instruments (all, when no filter). Returns the
    /// number removed.
    pub fn clear(&self, filter: Option<&ApplicationKey>) -> usize {
        let mut inner = self.inner.write();
        let before = inner.instruments.len();
        match filter {
            None => inner.instruments.clear(),
            Some(key) => inner
                .instruments
                .retain(|k, _| !key.matches(&k.application)),
        }
        let removed = before - inner.instruments.len();
        if removed > 0 {
            debug!(removed, "instruments cleared");
        }
        removed
    }

    pub fn instrument_count(&self) -> usize {
        self.inner.read().instruments.len()
    }
}

impl MetricStoreInner {
    fn insert_record(
        &mut self,
        view: &Arc<ApplicationView>,
        scope: &Arc<Scope>,
        scope_info: &ScopeInfo,
        record: MetricRecord,
    ) {
        let key = InstrumentKey {
            application: view.application_key.clone(),
            meter: scope_info.name.clone(),
            name: record.name,
        };
        let max_points = self.max_points;
        let instrument = self.instruments.entry(key).or_insert_with(|| Instrument {
            description: record.description,
            unit: record.unit,
            scope: Arc::clone(scope),
            points: BoundedOrderedBuffer::new(max_points),
        });

        for point in record.points {
            let entry = MetricDataPoint {
                timestamp: point.time_unix_nano,
                value: point.value,
                attributes: point.attributes,
            };
            let mut index = instrument.points.len();
            while index > 0 && instrument.points[index - 1].timestamp > entry.timestamp {
                index -= 1;
            }
            // Overflow silently drops the oldest point; nothing indexes
            // metric points, so there is no reconciliation to do.
            let _ = instrument.points.insert(index, entry);
        }
    }
}
