use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{CONFIG_ENV_VAR, ENV_PREFIX};
use config::{Config as RConfig, Environment, File, FileFormat};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub target_poll_interval_ms: u64,
    pub metric_poll_interval_ms: u64,
    pub worker_stop_timeout_ms: u64,
    pub shutdown_grace_ms: u64,

    /// Display name prefix that selects ZooKeeper server processes.
    pub display_name_prefix: String,
    pub metric_prefix_root: String,
    /// Directory holding the `hsperfdata_<user>` folders.
    pub perf_data_root: PathBuf,
    pub zk_command_timeout_ms: u64,

    pub report_interval_ms: u64,
    /// `host:port` of a Graphite plaintext listener.
    pub graphite_endpoint: Option<String>,

    pub log_dir: PathBuf,
    pub log_level: String,
}

impl Config {
    pub fn target_poll_interval(&self) -> Duration {
        Duration::from_millis(self.target_poll_interval_ms)
    }

    pub fn metric_poll_interval(&self) -> Duration {
        Duration::from_millis(self.metric_poll_interval_ms)
    }

    pub fn worker_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_stop_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn zk_command_timeout(&self) -> Duration {
        Duration::from_millis(self.zk_command_timeout_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("target_poll_interval_ms", self.target_poll_interval_ms),
            ("metric_poll_interval_ms", self.metric_poll_interval_ms),
            ("report_interval_ms", self.report_interval_ms),
        ] {
            if value == 0 {
                bail!("{} must be greater than zero", key);
            }
        }
        if self.display_name_prefix.trim().is_empty() {
            bail!("display_name_prefix must not be blank");
        }
        Ok(())
    }
}

/// Values given on the command line; they win over every other source.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub target_poll_interval_ms: Option<u64>,
    pub metric_poll_interval_ms: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub graphite_endpoint: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load_default_config() -> Result<Config> {
        Self::load(None, &ConfigOverrides::default())
    }

    /// Defaults, then the TOML file (`config_file` or `$ZKWATCH_CONFIG`), then
    /// `ZKWATCH_*` environment variables, then `overrides`.
    pub fn load(config_file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Config> {
        let defaults = Config::default();
        let mut builder = RConfig::builder();

        // set defaults
        builder = builder
            .set_default("target_poll_interval_ms", defaults.target_poll_interval_ms)?
            .set_default("metric_poll_interval_ms", defaults.metric_poll_interval_ms)?
            .set_default("worker_stop_timeout_ms", defaults.worker_stop_timeout_ms)?
            .set_default("shutdown_grace_ms", defaults.shutdown_grace_ms)?
            .set_default("display_name_prefix", defaults.display_name_prefix)?
            .set_default("metric_prefix_root", defaults.metric_prefix_root)?
            .set_default(
                "perf_data_root",
                defaults.perf_data_root.to_string_lossy().to_string(),
            )?
            .set_default("zk_command_timeout_ms", defaults.zk_command_timeout_ms)?
            .set_default("report_interval_ms", defaults.report_interval_ms)?
            .set_default("graphite_endpoint", None::<String>)?
            .set_default("log_dir", defaults.log_dir.to_string_lossy().to_string())?
            .set_default("log_level", defaults.log_level)?;

        let config_file = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
        if let Some(path) = &config_file {
            if !path.exists() {
                bail!("config file {:?} does not exist", path);
            }
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        // set overrides
        builder = builder
            .set_override_option("target_poll_interval_ms", overrides.target_poll_interval_ms)?
            .set_override_option("metric_poll_interval_ms", overrides.metric_poll_interval_ms)?
            .set_override_option("shutdown_grace_ms", overrides.shutdown_grace_ms)?
            .set_override_option(
                "log_dir",
                overrides
                    .log_dir
                    .as_ref()
                    .map(|dir| dir.to_string_lossy().to_string()),
            )?
            .set_override_option("graphite_endpoint", overrides.graphite_endpoint.clone())?;

        let config: Config = builder
            .build()?
            .try_deserialize()
            .with_context(|| match &config_file {
                Some(path) => format!("failed to parse config file {:?}", path),
                None => "failed to parse config".to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }
}
