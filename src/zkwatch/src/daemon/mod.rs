pub mod daemon_run;
mod prefix;
mod reporter;
mod shutdown;
mod supervisor;
mod termination;
mod worker;

pub use prefix::{local_hostname, metric_prefix, resolve_prefix, sanitize_port};
pub use reporter::{render_plaintext, Reporter};
pub use shutdown::{wait_for_shutdown_signal, ShutdownSignal};
pub use supervisor::{PassSummary, Supervisor, SupervisorHandle, SupervisorSettings};
pub use termination::ShutdownOutcome;
pub use worker::{Worker, WorkerContext, WorkerExit, WorkerSettings};
