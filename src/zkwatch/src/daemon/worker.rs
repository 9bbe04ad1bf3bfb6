use crate::daemon::prefix::resolve_prefix;
use crate::extracts::MetricsCollection;
use crate::introspection::{IntrospectionSession, SessionFactory};
use crate::inventory::TargetDescriptor;
use crate::metrics::{MetricScope, MetricsRegistry};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a worker's task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The stop token was cancelled.
    Stopped,
    SessionFailed(String),
    PollFailed(String),
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Stopped => f.write_str("stopped"),
            WorkerExit::SessionFailed(reason) => write!(f, "session failed: {}", reason),
            WorkerExit::PollFailed(reason) => write!(f, "poll failed: {}", reason),
        }
    }
}

/// Settings shared by every worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub prefix_root: String,
    pub hostname: String,
}

/// Collaborators shared by every worker.
#[derive(Clone)]
pub struct WorkerContext {
    pub factory: Arc<dyn SessionFactory>,
    pub registry: Arc<MetricsRegistry>,
    pub collection: Arc<MetricsCollection>,
    pub settings: Arc<WorkerSettings>,
}

/// Monitors exactly one target until stopped or until its session fails.
pub struct Worker {
    target: TargetDescriptor,
    context: WorkerContext,
}

impl Worker {
    pub fn new(target: TargetDescriptor, context: WorkerContext) -> Self {
        Self { target, context }
    }

    /// Opens a session and polls until `stop` is cancelled or a poll fails.
    ///
    /// Whatever the exit, the session is closed before the metric scope.
    pub async fn run(self, stop: CancellationToken) -> WorkerExit {
        info!("Worker running for {}", self.target);

        let mut session = match self.context.factory.open(&self.target).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to open session for {}: {}", self.target, e);
                return WorkerExit::SessionFailed(e.to_string());
            }
        };
        let mut scope = MetricScope::new(Arc::clone(&self.context.registry));

        let exit = self.poll_loop(session.as_mut(), &mut scope, &stop).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close session for {}: {}", self.target, e);
        }
        scope.close();

        match &exit {
            WorkerExit::Stopped => info!("Worker for {} stopped", self.target),
            other => warn!("Worker for {} exited: {}", self.target, other),
        }
        exit
    }

    async fn poll_loop(
        &self,
        session: &mut dyn IntrospectionSession,
        scope: &mut MetricScope,
        stop: &CancellationToken,
    ) -> WorkerExit {
        let settings = &self.context.settings;
        let mut prefix: Option<String> = None;

        loop {
            if stop.is_cancelled() {
                return WorkerExit::Stopped;
            }

            let current = match prefix.take() {
                Some(prefix) => prefix,
                None => match resolve_prefix(
                    session,
                    &settings.prefix_root,
                    &settings.hostname,
                    self.target.pid(),
                )
                .await
                {
                    Ok(resolved) => {
                        debug!("Metric prefix for {} is {}", self.target, resolved);
                        resolved
                    }
                    Err(e) => return WorkerExit::PollFailed(format!("{:#}", e)),
                },
            };

            if let Err(e) = self.context.collection.collect(session, &current, scope).await {
                return WorkerExit::PollFailed(format!("{:#}", e));
            }
            prefix = Some(current);

            tokio::select! {
                _ = stop.cancelled() => return WorkerExit::Stopped,
                _ = tokio::time::sleep(settings.poll_interval) => {}
            }
        }
    }
}
