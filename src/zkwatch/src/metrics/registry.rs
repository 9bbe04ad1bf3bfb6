use crate::metrics::error::MetricsError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    NumericGauge,
    FloatingGauge,
    Counter,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MetricKind::NumericGauge => "numeric gauge",
            MetricKind::FloatingGauge => "floating gauge",
            MetricKind::Counter => "counter",
        };
        f.write_str(label)
    }
}

/// Gauge holding the last integral value written to it.
#[derive(Debug, Clone, Default)]
pub struct NumericGauge(Arc<AtomicI64>);

impl NumericGauge {
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Gauge holding the last floating point value written to it, stored as raw bits.
#[derive(Debug, Clone, Default)]
pub struct FloatingGauge(Arc<AtomicU64>);

impl FloatingGauge {
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A handle to a registered metric. Clones share the same underlying value.
#[derive(Debug, Clone)]
pub enum Metric {
    NumericGauge(NumericGauge),
    FloatingGauge(FloatingGauge),
    Counter(Counter),
}

impl Metric {
    fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::NumericGauge => Metric::NumericGauge(NumericGauge::default()),
            MetricKind::FloatingGauge => Metric::FloatingGauge(FloatingGauge::default()),
            MetricKind::Counter => Metric::Counter(Counter::default()),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::NumericGauge(_) => MetricKind::NumericGauge,
            Metric::FloatingGauge(_) => MetricKind::FloatingGauge,
            Metric::Counter(_) => MetricKind::Counter,
        }
    }

    pub fn current(&self) -> MetricValue {
        match self {
            Metric::NumericGauge(g) => MetricValue::Integer(g.get()),
            Metric::FloatingGauge(g) => MetricValue::Float(g.get()),
            Metric::Counter(c) => MetricValue::Unsigned(c.get()),
        }
    }

    /// True when both handles point at the same registered value.
    pub fn same_as(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::NumericGauge(a), Metric::NumericGauge(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Metric::FloatingGauge(a), Metric::FloatingGauge(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Metric::Counter(a), Metric::Counter(b)) => Arc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Unsigned(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub value: MetricValue,
}

/// Process-wide metric registry keyed by name.
///
/// Registration is compare-and-register: when several callers race to create the
/// same name, exactly one value is inserted and every caller gets a handle to it.
/// A name keeps its kind until it is removed.
///
/// Scopes share a registration through [`acquire`](Self::acquire) and
/// [`release`](Self::release); the name is unregistered when its last holder
/// releases it.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    metrics: DashMap<String, Registration>,
}

#[derive(Debug)]
struct Registration {
    metric: Metric,
    holders: usize,
}

impl Registration {
    fn new(kind: MetricKind, holders: usize) -> Self {
        Self {
            metric: Metric::new(kind),
            holders,
        }
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, name: &str, kind: MetricKind) -> Result<Metric, MetricsError> {
        if let Some(existing) = self.metrics.get(name) {
            return Self::check_kind(name, &existing.metric, kind);
        }

        match self.metrics.entry(name.to_string()) {
            Entry::Occupied(entry) => Self::check_kind(name, &entry.get().metric, kind),
            Entry::Vacant(entry) => Ok(entry.insert(Registration::new(kind, 0)).metric.clone()),
        }
    }

    /// Like [`get_or_create`](Self::get_or_create), and counts the caller as a
    /// holder of the registration.
    pub fn acquire(&self, name: &str, kind: MetricKind) -> Result<Metric, MetricsError> {
        match self.metrics.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                let metric = Self::check_kind(name, &entry.get().metric, kind)?;
                entry.get_mut().holders += 1;
                Ok(metric)
            }
            Entry::Vacant(entry) => Ok(entry.insert(Registration::new(kind, 1)).metric.clone()),
        }
    }

    /// Drops one hold on `name` when it is still registered as `metric`. The name
    /// is unregistered once no holder is left; returns whether that happened.
    pub fn release(&self, name: &str, metric: &Metric) -> bool {
        self.metrics
            .remove_if_mut(name, |_, registration| {
                if !registration.metric.same_as(metric) {
                    return false;
                }
                registration.holders = registration.holders.saturating_sub(1);
                registration.holders == 0
            })
            .is_some()
    }

    fn check_kind(name: &str, existing: &Metric, requested: MetricKind) -> Result<Metric, MetricsError> {
        if existing.kind() == requested {
            Ok(existing.clone())
        } else {
            Err(MetricsError::KindConflict {
                name: name.to_string(),
                existing: existing.kind(),
                requested,
            })
        }
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.metrics.get(name).map(|r| r.metric.clone())
    }

    /// Removes a metric; returns whether it was registered.
    pub fn remove(&self, name: &str) -> bool {
        self.metrics.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.iter().map(|m| m.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// Current values of every registered metric, sorted by name.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        let mut samples: Vec<MetricSample> = self
            .metrics
            .iter()
            .map(|m| MetricSample {
                name: m.key().clone(),
                value: m.value().metric.current(),
            })
            .collect();
        samples.sort_by(|a, b| a.name.cmp(&b.name));
        samples
    }
}
