//! Quantity counter reconciliation between the fast path and the database.
//!
//! Detects and corrects drift caused by crashes, dead-lettered intents, or
//! missed give-backs after cancellation.

use std::sync::Arc;

use tracing::{error, info, warn};

use claimgate_coordination::CounterManager;
use claimgate_core::error::AppError;
use claimgate_core::traits::counter::QuantityCounter;
use claimgate_database::stores::ResourceStore;

/// Reconciles the fast-path quantity counters with database reality.
#[derive(Clone)]
pub struct CounterReconciler {
    /// Durable resource rows, the source of truth.
    resources: Arc<dyn ResourceStore>,
    /// Fast-path counters to true up.
    counter: CounterManager,
}

impl std::fmt::Debug for CounterReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterReconciler").finish()
    }
}

impl CounterReconciler {
    /// Creates a new counter reconciler.
    pub fn new(resources: Arc<dyn ResourceStore>, counter: CounterManager) -> Self {
        Self { resources, counter }
    }

    /// Performs a full reconciliation cycle:
    ///
    /// 1. List every resource row.
    /// 2. Compare each row's remaining quantity with its fast-path counter.
    /// 3. Force drifting counters to the durable value.
    ///
    /// Counters that were never seeded are left alone; admission seeds them
    /// on first use. Returns the number of counters corrected.
    pub async fn reconcile(&self) -> Result<u64, AppError> {
        let resources = self.resources.list().await?;
        let mut corrected = 0u64;

        for resource in &resources {
            let counted = match self.counter.get(&resource.id).await {
                Ok(Some(counted)) => counted,
                Ok(None) => continue,
                Err(e) => {
                    error!(resource_id = %resource.id, error = %e, "Failed to read quantity counter");
                    continue;
                }
            };

            if counted != resource.remaining_quantity {
                warn!(
                    resource_id = %resource.id,
                    counter_remaining = counted,
                    db_remaining = resource.remaining_quantity,
                    delta = counted - resource.remaining_quantity,
                    "Quantity drift detected, reconciling"
                );

                // Last writer wins against concurrent admissions. Anything
                // the refreshed counter over-admits is still rejected by the
                // guarded durable write.
                self.counter
                    .force_set(&resource.id, resource.remaining_quantity)
                    .await?;
                corrected += 1;
            }
        }

        if corrected > 0 {
            info!(
                corrected,
                checked = resources.len(),
                "Counter reconciliation completed"
            );
        }

        Ok(corrected)
    }
}
