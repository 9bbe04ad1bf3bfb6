use crate::config::Config;
use crate::daemon::prefix::local_hostname;
use crate::daemon::reporter::Reporter;
use crate::daemon::shutdown::{wait_for_shutdown_signal, ShutdownSignal};
use crate::daemon::supervisor::{Supervisor, SupervisorSettings};
use crate::daemon::termination::ShutdownOutcome;
use crate::daemon::worker::{WorkerContext, WorkerSettings};
use crate::extracts::MetricsCollection;
use crate::introspection::{LocalAttachFactory, SessionFactory};
use crate::inventory::{DisplayNameFilter, InventoryProvider, LocalJvmInventory};
use crate::metrics::MetricsRegistry;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

fn inventory(config: &Config) -> LocalJvmInventory {
    LocalJvmInventory::new(DisplayNameFilter::Prefix(config.display_name_prefix.clone()))
}

/// Wires the supervisor for this host from `config`.
pub fn build_supervisor(
    config: &Config,
    inventory: Arc<dyn InventoryProvider>,
    factory: Arc<dyn SessionFactory>,
    registry: Arc<MetricsRegistry>,
    shutdown: ShutdownSignal,
) -> Supervisor {
    let context = WorkerContext {
        factory,
        registry,
        collection: Arc::new(MetricsCollection::default()),
        settings: Arc::new(WorkerSettings {
            poll_interval: config.metric_poll_interval(),
            prefix_root: config.metric_prefix_root.clone(),
            hostname: local_hostname(),
        }),
    };
    let settings = SupervisorSettings {
        list_interval: config.target_poll_interval(),
        worker_stop_timeout: config.worker_stop_timeout(),
    };
    Supervisor::new(inventory, context, settings, shutdown)
}

/// Runs the daemon in the foreground until a termination signal arrives.
#[tokio::main]
pub async fn run(config: Config) -> Result<()> {
    info!("Starting zkwatch with {:?}", config);

    let registry = Arc::new(MetricsRegistry::new());
    let shutdown = ShutdownSignal::new();

    let factory = LocalAttachFactory::new(config.perf_data_root.clone(), config.zk_command_timeout());
    let supervisor = build_supervisor(
        &config,
        Arc::new(inventory(&config)),
        Arc::new(factory),
        Arc::clone(&registry),
        shutdown.clone(),
    )
    .start();

    let reporter = Reporter::new(
        Arc::clone(&registry),
        config.report_interval(),
        config.graphite_endpoint.clone(),
        shutdown.clone(),
    );
    let reporter = tokio::spawn(reporter.run());

    let waited = wait_for_shutdown_signal()
        .await
        .context("Failed to listen for termination signals");
    info!("Termination requested, stopping");

    let outcome = supervisor.request_shutdown(config.shutdown_grace()).await;
    if tokio::time::timeout(config.shutdown_grace(), reporter)
        .await
        .is_err()
    {
        warn!("Reporter did not stop within {:?}", config.shutdown_grace());
    }

    if outcome == ShutdownOutcome::Completed && !registry.is_empty() {
        warn!("{} metrics still registered after shutdown", registry.len());
    }

    waited
}

/// Prints the targets the inventory currently reports, one per line.
#[tokio::main]
pub async fn list(config: Config) -> Result<()> {
    let targets = inventory(&config)
        .list()
        .await
        .context("Failed to list local JVMs")?;

    if targets.is_empty() {
        println!("No matching processes found");
    }
    for target in targets {
        println!("{}", target);
    }
    Ok(())
}
