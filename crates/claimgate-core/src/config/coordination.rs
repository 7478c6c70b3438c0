//! Distributed lock and quantity counter configuration.

use serde::{Deserialize, Serialize};

/// Coordination backend configuration, shared by the lock provider and the
/// quantity counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Coordination provider type: `"memory"` or `"redis"`.
    ///
    /// The memory provider is only safe for single-node deployments; the
    /// lock and counter must span processes otherwise.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis connection URL for the lock and counter keys.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Interval between lock acquisition attempts while waiting, in
    /// milliseconds.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis_url: default_redis_url(),
            retry_interval_ms: default_retry_interval(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_retry_interval() -> u64 {
    50
}
