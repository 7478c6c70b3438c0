//! Claim-intent broker configuration.

use serde::{Deserialize, Serialize};

/// Message broker configuration for queue-decoupled admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker provider type: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis connection URL for the intent queues.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Number of key-ordered partitions. Intents for one resource always
    /// land on the same partition, so per-resource ordering is preserved.
    #[serde(default = "default_partitions")]
    pub partitions: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis_url: default_redis_url(),
            partitions: default_partitions(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_partitions() -> u32 {
    4
}
