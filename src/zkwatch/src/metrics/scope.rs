use crate::metrics::error::MetricsError;
use crate::metrics::registry::{
    Counter, FloatingGauge, Metric, MetricKind, MetricsRegistry, NumericGauge,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Set of metrics registered on behalf of one worker.
///
/// Every metric obtained through the scope is released from the shared registry
/// when the scope is closed; a name another scope still holds stays registered. Closing is idempotent and also happens on drop, so a
/// worker task that is aborted mid-poll still leaves nothing behind.
pub struct MetricScope {
    registry: Arc<MetricsRegistry>,
    registered: HashMap<String, Metric>,
    closed: bool,
}

impl MetricScope {
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self {
            registry,
            registered: HashMap::new(),
            closed: false,
        }
    }

    /// Returns the metric registered under `name`, registering it on first use.
    pub fn get_or_create(&mut self, name: &str, kind: MetricKind) -> Result<Metric, MetricsError> {
        if let Some(metric) = self.registered.get(name) {
            if metric.kind() == kind {
                return Ok(metric.clone());
            }
            return Err(mismatch(name, metric, kind));
        }

        let metric = self.registry.acquire(name, kind)?;
        self.registered.insert(name.to_string(), metric.clone());
        // a scope reused after close() owns live registrations again
        self.closed = false;
        Ok(metric)
    }

    pub fn numeric_gauge(&mut self, name: &str) -> Result<NumericGauge, MetricsError> {
        match self.get_or_create(name, MetricKind::NumericGauge)? {
            Metric::NumericGauge(gauge) => Ok(gauge),
            other => Err(mismatch(name, &other, MetricKind::NumericGauge)),
        }
    }

    pub fn floating_gauge(&mut self, name: &str) -> Result<FloatingGauge, MetricsError> {
        match self.get_or_create(name, MetricKind::FloatingGauge)? {
            Metric::FloatingGauge(gauge) => Ok(gauge),
            other => Err(mismatch(name, &other, MetricKind::FloatingGauge)),
        }
    }

    pub fn counter(&mut self, name: &str) -> Result<Counter, MetricsError> {
        match self.get_or_create(name, MetricKind::Counter)? {
            Metric::Counter(counter) => Ok(counter),
            other => Err(mismatch(name, &other, MetricKind::Counter)),
        }
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases every metric obtained through this scope.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        let count = self.registered.len();
        for (name, metric) in self.registered.drain() {
            self.registry.release(&name, &metric);
        }
        self.closed = true;
        debug!("Metric scope closed, released {} metrics", count);
    }
}

fn mismatch(name: &str, existing: &Metric, requested: MetricKind) -> MetricsError {
    MetricsError::KindConflict {
        name: name.to_string(),
        existing: existing.kind(),
        requested,
    }
}

impl Drop for MetricScope {
    fn drop(&mut self) {
        self.close();
    }
}
