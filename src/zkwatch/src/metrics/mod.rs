mod error;
mod registry;
mod scope;

pub use error::MetricsError;
pub use registry::{
    Counter, FloatingGauge, Metric, MetricKind, MetricSample, MetricValue, MetricsRegistry,
    NumericGauge,
};
pub use scope::MetricScope;
