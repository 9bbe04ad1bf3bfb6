use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[clap(
    name = "zkwatch",
    about = "Discovers local ZooKeeper servers and publishes their JVM and ZooKeeper metrics",
    version
)]
pub struct Cli {
    /// TOML configuration file; defaults to $ZKWATCH_CONFIG when set
    #[clap(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the monitoring daemon in the foreground (default)
    Run(RunArgs),

    /// Print the processes that would be monitored and exit
    List,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[clap(long, value_name = "MS")]
    pub target_poll_interval_ms: Option<u64>,

    #[clap(long, value_name = "MS")]
    pub metric_poll_interval_ms: Option<u64>,

    #[clap(long, value_name = "MS")]
    pub shutdown_grace_ms: Option<u64>,

    #[clap(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Graphite plaintext endpoint, e.g. `localhost:2003`
    #[clap(long, value_name = "ADDR")]
    pub graphite: Option<String>,
}
