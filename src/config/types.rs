//! Configuration constants and default value functions.

use crate::backends::compressed;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "mapq.yaml";

// Default value functions for serde
pub(crate) fn default_name() -> String {
    "jobs".to_string()
}
pub(crate) fn default_path() -> String {
    ".mapq/jobs".to_string()
}
pub(crate) fn default_redis_url() -> String {
    "redis://127.0.0.1/".to_string()
}
pub(crate) fn default_lock_timeout_ms() -> u64 {
    10_000
}
pub(crate) fn default_poll_interval_ms() -> u64 {
    50
}
pub(crate) fn default_lock_stale_minutes() -> u32 {
    120
}
pub(crate) fn default_compression_level() -> i32 {
    compressed::DEFAULT_LEVEL
}
