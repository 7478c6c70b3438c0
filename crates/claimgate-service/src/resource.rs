//! Resource administration.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use claimgate_cache::ResourceSnapshotCache;
use claimgate_coordination::CounterManager;
use claimgate_core::error::AppError;
use claimgate_core::traits::counter::QuantityCounter;
use claimgate_core::types::ResourceId;
use claimgate_database::stores::ResourceStore;
use claimgate_entity::resource::{CreateResource, Resource};

/// Handles resource creation and administrative reads.
#[derive(Debug, Clone)]
pub struct ResourceService {
    /// Resource store.
    resources: Arc<dyn ResourceStore>,
    /// Fast remaining-quantity counter.
    counter: CounterManager,
    /// Resource snapshot cache.
    snapshots: ResourceSnapshotCache,
}

impl ResourceService {
    /// Creates a new resource service.
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        counter: CounterManager,
        snapshots: ResourceSnapshotCache,
    ) -> Self {
        Self {
            resources,
            counter,
            snapshots,
        }
    }

    /// Create a resource and prime the fast path for it.
    pub async fn create(&self, input: CreateResource) -> Result<Resource, AppError> {
        let resource = Resource::new(input, Utc::now())?;
        let created = self.resources.create(&resource).await?;

        if let Err(e) = self
            .counter
            .seed(&created.id, created.remaining_quantity)
            .await
        {
            warn!(resource_id = %created.id, error = %e, "Counter seed failed at creation");
        }
        if let Err(e) = self.snapshots.put(&created).await {
            debug!(resource_id = %created.id, error = %e, "Snapshot prime failed at creation");
        }

        info!(
            resource_id = %created.id,
            name = %created.name,
            total_quantity = created.total_quantity,
            "Resource created"
        );
        Ok(created)
    }

    /// The durable row for a resource (administrative view).
    pub async fn get(&self, resource_id: &ResourceId) -> Result<Resource, AppError> {
        self.resources
            .find(resource_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Resource not found: {resource_id}")))
    }

    /// All resources, newest first.
    pub async fn list(&self) -> Result<Vec<Resource>, AppError> {
        self.resources.list().await
    }
}
