//! Claim coordinator policy configuration.

use serde::{Deserialize, Serialize};

/// Claim issuance policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceConfig {
    /// Issuance strategy: `"direct"` (synchronous row-locked decrement),
    /// `"locked"` (distributed lock + cached counter), or `"queued"`
    /// (lock + counter admission, asynchronous fulfillment).
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Maximum time to wait for the per-resource lock, in seconds.
    #[serde(default = "default_lock_wait")]
    pub lock_wait_seconds: u64,
    /// Lock lease duration in seconds. A crashed holder blocks others for
    /// at most this long.
    #[serde(default = "default_lock_lease")]
    pub lock_lease_seconds: u64,
    /// TTL for the PENDING marker of a not-yet-fulfilled claim, in seconds.
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_seconds: u64,
    /// How many times transient cache/counter failures are retried inside
    /// the coordinator before surfacing.
    #[serde(default = "default_provider_retries")]
    pub provider_retries: u32,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            lock_wait_seconds: default_lock_wait(),
            lock_lease_seconds: default_lock_lease(),
            pending_ttl_seconds: default_pending_ttl(),
            provider_retries: default_provider_retries(),
        }
    }
}

/// Balance (point-style) policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceConfig {
    /// Maximum time to wait for the per-requester lock, in seconds.
    #[serde(default = "default_balance_lock_wait")]
    pub lock_wait_seconds: u64,
    /// Per-requester lock lease duration in seconds.
    #[serde(default = "default_balance_lock_lease")]
    pub lock_lease_seconds: u64,
    /// How many times an optimistic-version conflict is reloaded and
    /// retried before surfacing as a ConflictError.
    #[serde(default = "default_save_retries")]
    pub save_retries: u32,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            lock_wait_seconds: default_balance_lock_wait(),
            lock_lease_seconds: default_balance_lock_lease(),
            save_retries: default_save_retries(),
        }
    }
}

fn default_strategy() -> String {
    "locked".to_string()
}

fn default_lock_wait() -> u64 {
    3
}

fn default_lock_lease() -> u64 {
    5
}

fn default_pending_ttl() -> u64 {
    900
}

fn default_provider_retries() -> u32 {
    2
}

fn default_balance_lock_wait() -> u64 {
    3
}

fn default_balance_lock_lease() -> u64 {
    3
}

fn default_save_retries() -> u32 {
    3
}
