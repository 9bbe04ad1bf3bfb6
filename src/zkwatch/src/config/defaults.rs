use crate::config::Config;
use crate::constants::{
    DISPLAY_NAME_PREFIX, LOG_DIR, LOG_LEVEL, METRIC_POLL_INTERVAL_MS, METRIC_PREFIX_ROOT,
    REPORT_INTERVAL_MS, SHUTDOWN_GRACE_MS, TARGET_POLL_INTERVAL_MS, WORKER_STOP_TIMEOUT_MS,
    ZK_COMMAND_TIMEOUT_MS,
};
use std::path::PathBuf;

impl Default for Config {
    fn default() -> Self {
        Self {
            target_poll_interval_ms: TARGET_POLL_INTERVAL_MS,
            metric_poll_interval_ms: METRIC_POLL_INTERVAL_MS,
            worker_stop_timeout_ms: WORKER_STOP_TIMEOUT_MS,
            shutdown_grace_ms: SHUTDOWN_GRACE_MS,

            display_name_prefix: DISPLAY_NAME_PREFIX.to_string(),
            metric_prefix_root: METRIC_PREFIX_ROOT.to_string(),
            perf_data_root: std::env::temp_dir(),
            zk_command_timeout_ms: ZK_COMMAND_TIMEOUT_MS,

            report_interval_ms: REPORT_INTERVAL_MS,
            graphite_endpoint: None,

            log_dir: PathBuf::from(LOG_DIR),
            log_level: LOG_LEVEL.to_string(),
        }
    }
}
