use super::commands::{Cli, Command, RunArgs};
use crate::config::{ConfigLoader, ConfigOverrides};
use crate::daemon::daemon_run;
use crate::logging::setup_logging;
use anyhow::Result;
use clap::Parser;

impl From<RunArgs> for ConfigOverrides {
    fn from(args: RunArgs) -> Self {
        Self {
            target_poll_interval_ms: args.target_poll_interval_ms,
            metric_poll_interval_ms: args.metric_poll_interval_ms,
            shutdown_grace_ms: args.shutdown_grace_ms,
            log_dir: args.log_dir,
            graphite_endpoint: args.graphite,
        }
    }
}

/// Process the command line.
pub fn process_command() -> Result<()> {
    // NOTE: this exits the process if there is a parsing error
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run(RunArgs::default()));

    match command {
        Command::Run(args) => {
            let config = ConfigLoader::load(cli.config.as_deref(), &args.into())?;
            let _guard = setup_logging(&config.log_dir, &config.log_level)?;
            daemon_run::run(config)
        }
        Command::List => {
            let config = ConfigLoader::load(cli.config.as_deref(), &ConfigOverrides::default())?;
            daemon_run::list(config)
        }
    }
}
