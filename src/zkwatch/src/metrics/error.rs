use crate::metrics::registry::MetricKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// The name is already registered with another kind of metric.
    #[error("{name} is already used for a {existing}, cannot register it as a {requested}")]
    KindConflict {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },
}
