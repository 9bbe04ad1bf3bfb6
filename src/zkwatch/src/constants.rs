pub const TARGET_POLL_INTERVAL_MS: u64 = 1000;
pub const METRIC_POLL_INTERVAL_MS: u64 = 10_000;
pub const WORKER_STOP_TIMEOUT_MS: u64 = 100;
pub const SHUTDOWN_GRACE_MS: u64 = 100;
pub const ZK_COMMAND_TIMEOUT_MS: u64 = 2000;
pub const REPORT_INTERVAL_MS: u64 = 60_000;

pub const DISPLAY_NAME_PREFIX: &str = "org.apache.zookeeper.server.quorum.QuorumPeerMain";
pub const METRIC_PREFIX_ROOT: &str = "one_min";

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "zkwatch";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const MAX_LOG_FILES: usize = 7;
pub const LOG_LEVEL: &str = "info";

pub const CONFIG_ENV_VAR: &str = "ZKWATCH_CONFIG";
pub const ENV_PREFIX: &str = "ZKWATCH";

pub const FALLBACK_HOSTNAME: &str = "localhost";
