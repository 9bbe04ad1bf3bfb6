//! Bounded supervisor termination

use crate::daemon::shutdown::ShutdownSignal;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How a shutdown request ended
#[derive(Debug, PartialEq, Clone)]
pub enum ShutdownOutcome {
    /// The loop exited and every worker was torn down
    Completed,
    /// The grace period elapsed first; teardown may still be in progress
    TimedOut,
    Failed(String),
}

/// Signals shutdown, then waits up to `grace` for the supervisor task
pub async fn terminate_supervisor(
    shutdown: &ShutdownSignal,
    supervisor: JoinHandle<()>,
    grace: Duration,
) -> ShutdownOutcome {
    tracing::info!("Stopping supervisor (grace {:?})...", grace);
    shutdown.signal();

    let outcome = match tokio::time::timeout(grace, supervisor).await {
        Ok(Ok(())) => ShutdownOutcome::Completed,
        Ok(Err(e)) => ShutdownOutcome::Failed(e.to_string()),
        Err(_) => ShutdownOutcome::TimedOut,
    };

    log_outcome(&outcome);
    outcome
}

fn log_outcome(outcome: &ShutdownOutcome) {
    match outcome {
        ShutdownOutcome::Completed => tracing::info!("Supervisor stopped cleanly"),
        ShutdownOutcome::TimedOut => {
            tracing::warn!("Supervisor did not stop within the grace period, exiting anyway")
        }
        ShutdownOutcome::Failed(e) => tracing::warn!("Supervisor task failed: {}", e),
    }
}
