// Camwatch Constants
// Defaults only; every tunable here can be overridden through config.rs.

// Paths
pub const APP_DIR: &str = ".camwatch";
pub const DB_FILENAME: &str = "camwatch.db";
pub const CONFIG_FILENAME: &str = "config.json";

// Reconciliation loop
pub const DEFAULT_INTERVAL_SECS: u64 = 5;
pub const RECONCILE_THREAD_NAME: &str = "camera-reconcile";

// Device probing
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_INDEX_PROBE_LIMIT: u32 = 10;
pub const VIDEO_DEVICE_DIR: &str = "/dev";
pub const VIDEO_DEVICE_PREFIX: &str = "video";
pub const INDEX_IDENTITY_PREFIX: &str = "Index_";
pub const COMMAND_POLL_INTERVAL_MS: u64 = 20;

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";

// SQLite
pub const DB_BUSY_TIMEOUT_MS: u32 = 5000;

// Environment overrides
pub const ENV_DB_PATH: &str = "CAMWATCH_DB_PATH";
pub const ENV_INTERVAL_SECS: &str = "CAMWATCH_INTERVAL_SECS";
pub const ENV_PROBE_TIMEOUT_SECS: &str = "CAMWATCH_PROBE_TIMEOUT_SECS";
pub const ENV_INDEX_PROBE_LIMIT: &str = "CAMWATCH_INDEX_PROBE_LIMIT";
pub const ENV_LOG_LEVEL: &str = "CAMWATCH_LOG_LEVEL";
pub const ENV_V4L2CTL_PATH: &str = "CAMWATCH_V4L2CTL_PATH";
