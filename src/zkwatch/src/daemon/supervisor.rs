use crate::daemon::shutdown::ShutdownSignal;
use crate::daemon::termination::{terminate_supervisor, ShutdownOutcome};
use crate::daemon::worker::{Worker, WorkerContext, WorkerExit};
use crate::inventory::{InventoryProvider, TargetDescriptor};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Time between reconciliation passes.
    pub list_interval: Duration,
    /// How long the stop protocol waits for a worker to join, and again after aborting it.
    pub worker_stop_timeout: Duration,
}

struct WorkerHandle {
    cancel: CancellationToken,
    join: JoinHandle<WorkerExit>,
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub adopted: Vec<TargetDescriptor>,
    pub removed: Vec<TargetDescriptor>,
    /// Targets whose worker had already finished on its own.
    pub reaped: Vec<TargetDescriptor>,
    pub inventory_failed: bool,
}

/// Keeps exactly one worker running for every target the inventory reports.
pub struct Supervisor {
    inventory: Arc<dyn InventoryProvider>,
    context: WorkerContext,
    settings: SupervisorSettings,
    shutdown: ShutdownSignal,
    supervised: HashMap<TargetDescriptor, WorkerHandle>,
    published: watch::Sender<Vec<TargetDescriptor>>,
}

impl Supervisor {
    pub fn new(
        inventory: Arc<dyn InventoryProvider>,
        context: WorkerContext,
        settings: SupervisorSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        let (published, _) = watch::channel(Vec::new());
        Self {
            inventory,
            context,
            settings,
            shutdown,
            supervised: HashMap::new(),
            published,
        }
    }

    /// Currently supervised targets, sorted by pid.
    pub fn supervised(&self) -> Vec<TargetDescriptor> {
        let mut targets: Vec<TargetDescriptor> = self.supervised.keys().cloned().collect();
        targets.sort_by_key(|t| t.pid());
        targets
    }

    /// Runs the reconciliation loop on its own task.
    pub fn start(self) -> SupervisorHandle {
        let shutdown = self.shutdown.clone();
        let supervised = self.published.subscribe();
        let join = tokio::spawn(self.run());
        SupervisorHandle {
            shutdown,
            join,
            supervised,
        }
    }

    pub async fn run(mut self) {
        info!(
            "Supervisor running, listing targets every {:?}",
            self.settings.list_interval
        );

        while !self.shutdown.is_signaled() {
            self.reconcile_once().await;

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.list_interval) => {}
            }
        }

        self.drain().await;
        info!("Supervisor stopped");
    }

    /// One pass: adopt new targets, stop vanished ones, reap finished workers.
    pub async fn reconcile_once(&mut self) -> PassSummary {
        let mut summary = PassSummary::default();

        let listed = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            listed = self.inventory.list() => Some(listed),
        };

        match listed {
            None => debug!("Shutdown requested while listing targets"),
            Some(Ok(candidates)) => {
                let current: HashSet<TargetDescriptor> = candidates.into_iter().collect();

                for target in &current {
                    if self.supervised.contains_key(target) {
                        continue;
                    }
                    if self.shutdown.is_signaled() {
                        debug!("Shutdown requested, not adopting {}", target);
                        break;
                    }
                    self.adopt(target.clone());
                    summary.adopted.push(target.clone());
                }

                let vanished: Vec<TargetDescriptor> = self
                    .supervised
                    .keys()
                    .filter(|target| !current.contains(*target))
                    .cloned()
                    .collect();
                for target in vanished {
                    if let Some(handle) = self.supervised.remove(&target) {
                        info!("{} is gone, stopping its worker", target);
                        self.stop_worker(&target, handle).await;
                        summary.removed.push(target);
                    }
                }
            }
            Some(Err(e)) => {
                warn!("Failed to list targets: {:#}", e);
                summary.inventory_failed = true;
            }
        }

        let finished: Vec<TargetDescriptor> = self
            .supervised
            .iter()
            .filter(|(_, handle)| handle.join.is_finished())
            .map(|(target, _)| target.clone())
            .collect();
        for target in finished {
            if let Some(handle) = self.supervised.remove(&target) {
                self.stop_worker(&target, handle).await;
                summary.reaped.push(target);
            }
        }

        self.publish();
        summary
    }

    fn adopt(&mut self, target: TargetDescriptor) {
        info!("Adopting {}", target);
        let cancel = self.shutdown.child();
        let worker = Worker::new(target.clone(), self.context.clone());
        let join = tokio::spawn(worker.run(cancel.clone()));
        self.supervised.insert(target, WorkerHandle { cancel, join });
    }

    /// Cancel, join within the stop timeout, abort on timeout.
    async fn stop_worker(&self, target: &TargetDescriptor, handle: WorkerHandle) {
        let timeout = self.settings.worker_stop_timeout;
        let WorkerHandle { cancel, mut join } = handle;
        cancel.cancel();

        match tokio::time::timeout(timeout, &mut join).await {
            Ok(Ok(exit)) => debug!("Worker for {} joined: {}", target, exit),
            Ok(Err(e)) => warn!("Worker for {} failed: {}", target, e),
            Err(_) => {
                warn!(
                    "Worker for {} did not stop within {:?}, aborting it",
                    target, timeout
                );
                join.abort();
                if tokio::time::timeout(timeout, join).await.is_err() {
                    warn!("Aborted worker for {} has not finished yet", target);
                }
            }
        }
    }

    /// Stops every remaining worker. All are cancelled before any is joined.
    async fn drain(&mut self) {
        let handles: Vec<(TargetDescriptor, WorkerHandle)> = self.supervised.drain().collect();
        if handles.is_empty() {
            self.publish();
            return;
        }

        info!("Stopping {} workers", handles.len());
        for (_, handle) in &handles {
            handle.cancel.cancel();
        }
        for (target, handle) in handles {
            self.stop_worker(&target, handle).await;
        }
        self.publish();
    }

    fn publish(&self) {
        self.published.send_replace(self.supervised());
    }
}

/// Owner-side view of a started supervisor.
pub struct SupervisorHandle {
    shutdown: ShutdownSignal,
    join: JoinHandle<()>,
    supervised: watch::Receiver<Vec<TargetDescriptor>>,
}

impl SupervisorHandle {
    /// Targets supervised after the latest completed pass.
    pub fn supervised(&self) -> Vec<TargetDescriptor> {
        self.supervised.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signals shutdown and waits up to `grace` for the loop and every worker
    /// to be torn down.
    pub async fn request_shutdown(self, grace: Duration) -> ShutdownOutcome {
        terminate_supervisor(&self.shutdown, self.join, grace).await
    }
}
