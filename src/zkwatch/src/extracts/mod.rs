mod jvm_metrics;
mod zk_metrics;

pub use jvm_metrics::JvmMetricsCollector;
pub use zk_metrics::ZkMetricsCollector;

use crate::introspection::{AttributeValue, IntrospectionSession, ObjectName};
use crate::metrics::{MetricScope, MetricsError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Reads one family of attribute groups from a session and publishes them as
/// metrics under a prefix.
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn collect(
        &self,
        session: &mut dyn IntrospectionSession,
        writer: &mut MetricWriter<'_>,
    ) -> Result<()>;
}

/// The collectors a worker runs on every poll, in order.
pub struct MetricsCollection {
    collectors: Vec<Box<dyn MetricsCollector>>,
}

impl Default for MetricsCollection {
    fn default() -> Self {
        Self::new(vec![
            Box::new(JvmMetricsCollector),
            Box::new(ZkMetricsCollector),
        ])
    }
}

impl MetricsCollection {
    pub fn new(collectors: Vec<Box<dyn MetricsCollector>>) -> Self {
        Self { collectors }
    }

    /// Runs every collector once. The first failure ends the poll.
    pub async fn collect(
        &self,
        session: &mut dyn IntrospectionSession,
        prefix: &str,
        scope: &mut MetricScope,
    ) -> Result<()> {
        let mut writer = MetricWriter::new(prefix, scope);
        for collector in &self.collectors {
            collector
                .collect(session, &mut writer)
                .await
                .with_context(|| format!("{} collection failed", collector.name()))?;
        }
        Ok(())
    }
}

/// Writes values into a scope under `<prefix>.<suffix>` names.
///
/// Absent values and values of the wrong shape are skipped; only registry
/// conflicts are errors.
pub struct MetricWriter<'a> {
    prefix: &'a str,
    scope: &'a mut MetricScope,
}

impl<'a> MetricWriter<'a> {
    pub fn new(prefix: &'a str, scope: &'a mut MetricScope) -> Self {
        Self { prefix, scope }
    }

    pub fn name(&self, suffix: &str) -> String {
        format!("{}.{}", self.prefix, suffix)
    }

    pub fn numeric(&mut self, suffix: &str, value: Option<&AttributeValue>) -> Result<(), MetricsError> {
        if let Some(v) = value.and_then(AttributeValue::as_i64) {
            let name = self.name(suffix);
            self.scope.numeric_gauge(&name)?.set(v);
        }
        Ok(())
    }

    pub fn floating(&mut self, suffix: &str, value: Option<&AttributeValue>) -> Result<(), MetricsError> {
        if let Some(v) = value.and_then(AttributeValue::as_f64) {
            let name = self.name(suffix);
            self.scope.floating_gauge(&name)?.set(v);
        }
        Ok(())
    }

    /// Publishes a `{committed, init, max, used}` composite as four gauges.
    pub fn usage(&mut self, suffix: &str, value: Option<&AttributeValue>) -> Result<(), MetricsError> {
        let Some(fields) = value.and_then(AttributeValue::as_composite) else {
            return Ok(());
        };
        for field in ["committed", "init", "max", "used"] {
            self.numeric(&format!("{}.{}", suffix, field), fields.get(field))?;
        }
        Ok(())
    }
}

/// Names matching `pattern`, in a stable order.
pub(crate) async fn query_names(
    session: &mut dyn IntrospectionSession,
    pattern: &str,
) -> Result<Vec<ObjectName>> {
    let pattern = ObjectName::parse(pattern)?;
    let mut names = session
        .query_names(&pattern)
        .await
        .with_context(|| format!("query {} failed", pattern))?;
    names.sort();
    Ok(names)
}

pub(crate) async fn bean_attributes(
    session: &mut dyn IntrospectionSession,
    name: &ObjectName,
    attributes: &[&str],
) -> Result<HashMap<String, AttributeValue>> {
    session
        .read_attributes(name, attributes)
        .await
        .with_context(|| format!("reading {} failed", name))
}

/// `Name` attribute with all whitespace removed, for use inside a metric name.
pub(crate) fn compact_name(attributes: &HashMap<String, AttributeValue>) -> Option<String> {
    attributes
        .get("Name")
        .and_then(AttributeValue::as_str)
        .map(|name| name.chars().filter(|c| !c.is_whitespace()).collect())
}
