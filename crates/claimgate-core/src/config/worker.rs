//! Fulfillment worker and reconciler configuration.

use serde::{Deserialize, Serialize};

/// Fulfillment worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the fulfillment worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum delivery attempts for one intent before it is routed to the
    /// dead-letter list.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// How long one consume call waits for an intent before polling again,
    /// in seconds.
    #[serde(default = "default_consume_wait")]
    pub consume_wait_seconds: u64,
    /// Grace period for in-flight intents during shutdown, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_attempts: default_max_attempts(),
            consume_wait_seconds: default_consume_wait(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

/// Counter reconciler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Whether the reconciler job is scheduled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron schedule (second-resolution, tokio-cron-scheduler syntax).
    #[serde(default = "default_schedule")]
    pub schedule: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            schedule: default_schedule(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_consume_wait() -> u64 {
    1
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_schedule() -> String {
    "0 */5 * * * *".to_string()
}
