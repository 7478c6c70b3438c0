//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use claimgate_core::error::AppError;

use crate::reconcile::CounterReconciler;

/// Cron-based scheduler for periodic background tasks
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new() -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self { scheduler })
    }

    /// Register the periodic counter reconciliation pass
    pub async fn register_counter_reconcile(
        &self,
        reconciler: CounterReconciler,
        schedule: &str,
    ) -> Result<(), AppError> {
        let reconciler = Arc::new(reconciler);
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let reconciler = Arc::clone(&reconciler);
            Box::pin(async move {
                tracing::debug!("Running scheduled counter reconciliation");
                match reconciler.reconcile().await {
                    Ok(0) => {}
                    Ok(corrected) => {
                        tracing::info!(
                            "Scheduled reconciliation corrected {} counter(s)",
                            corrected
                        );
                    }
                    Err(e) => {
                        tracing::error!("Scheduled reconciliation failed: {}", e);
                    }
                }
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create counter_reconcile schedule: {}", e))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add counter_reconcile schedule: {}", e))
        })?;

        tracing::info!("Registered: counter_reconcile ({})", schedule);
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
