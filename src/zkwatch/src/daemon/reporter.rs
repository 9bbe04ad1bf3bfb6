use crate::daemon::shutdown::ShutdownSignal;
use crate::metrics::{MetricSample, MetricsRegistry};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Periodically publishes the registry, to Graphite when an endpoint is set.
pub struct Reporter {
    registry: Arc<MetricsRegistry>,
    interval: Duration,
    graphite_endpoint: Option<String>,
    shutdown: ShutdownSignal,
}

impl Reporter {
    pub fn new(
        registry: Arc<MetricsRegistry>,
        interval: Duration,
        graphite_endpoint: Option<String>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            registry,
            interval,
            graphite_endpoint,
            shutdown,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // the first tick completes immediately and the registry is still empty
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Reporter cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.flush().await {
                        warn!("Failed to report metrics: {:#}", e);
                    }
                }
            }
        }
    }

    pub async fn flush(&self) -> Result<usize> {
        let samples = self.registry.snapshot();
        let Some(endpoint) = self.graphite_endpoint.as_deref() else {
            debug!("{} metrics registered", samples.len());
            return Ok(samples.len());
        };
        if samples.is_empty() {
            return Ok(0);
        }

        let payload = render_plaintext(&samples, Utc::now().timestamp());
        let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(endpoint))
            .await
            .with_context(|| format!("connecting to {} timed out", endpoint))?
            .with_context(|| format!("failed to connect to {}", endpoint))?;
        stream
            .write_all(payload.as_bytes())
            .await
            .with_context(|| format!("failed to write to {}", endpoint))?;
        stream.shutdown().await?;

        debug!("Reported {} metrics to {}", samples.len(), endpoint);
        Ok(samples.len())
    }
}

/// Graphite plaintext protocol: one `<name> <value> <timestamp>` line per sample.
pub fn render_plaintext(samples: &[MetricSample], timestamp: i64) -> String {
    let mut out = String::new();
    for sample in samples {
        let _ = writeln!(out, "{} {} {}", sample.name, sample.value, timestamp);
    }
    out
}
