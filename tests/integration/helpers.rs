//! Shared test helpers for integration tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use claimgate_broker::{BrokerManager, MemoryBroker};
use claimgate_cache::memory::MemoryCacheProvider;
use claimgate_cache::{CacheManager, PendingClaimCache, ResourceSnapshotCache};
use claimgate_coordination::counter::MemoryQuantityCounter;
use claimgate_coordination::lock::MemoryLockProvider;
use claimgate_coordination::{CounterManager, LockManager};
use claimgate_core::config::cache::MemoryCacheConfig;
use claimgate_core::config::issuance::{BalanceConfig, IssuanceConfig};
use claimgate_core::traits::broker::IntentBroker;
use claimgate_database::{BalanceStore, ClaimStore, MemoryStore, ResourceStore};
use claimgate_entity::resource::{CreateResource, Resource};
use claimgate_service::{BalanceService, ClaimService, IssueMetrics, ResourceService, build_issuer};
use claimgate_worker::FulfillmentHandler;

/// Number of broker partitions used by the test engine.
pub const PARTITIONS: u32 = 4;

/// Fully wired engine over the in-memory backends.
pub struct TestEngine {
    pub claims: ClaimService,
    pub resources: ResourceService,
    pub balances: BalanceService,
    pub lock: LockManager,
    pub counter: CounterManager,
    pub broker: BrokerManager,
    pub pending: PendingClaimCache,
    pub snapshots: ResourceSnapshotCache,
    pub handler: Arc<FulfillmentHandler>,
    pub store: Arc<MemoryStore>,
}

impl TestEngine {
    /// Engine using the row-locked issuance strategy.
    pub async fn new() -> Self {
        Self::with_strategy("locked").await
    }

    /// Engine using the given issuance strategy.
    pub async fn with_strategy(strategy: &str) -> Self {
        let store = Arc::new(MemoryStore::new());
        let resources_store: Arc<dyn ResourceStore> = store.clone();
        let claims_store: Arc<dyn ClaimStore> = store.clone();
        let balances_store: Arc<dyn BalanceStore> = store.clone();

        let cache = CacheManager::from_provider(Arc::new(MemoryCacheProvider::new(
            &MemoryCacheConfig::default(),
            300,
        )));
        let snapshots = ResourceSnapshotCache::new(cache.clone(), 300);
        let pending = PendingClaimCache::new(cache.clone(), 900);

        let lock =
            LockManager::from_provider(Arc::new(MemoryLockProvider::new(Duration::from_millis(5))));
        let counter = CounterManager::from_provider(Arc::new(MemoryQuantityCounter::new()));
        let broker = BrokerManager::from_provider(Arc::new(MemoryBroker::new(PARTITIONS)));

        let issuance = IssuanceConfig {
            strategy: strategy.to_string(),
            ..Default::default()
        };
        let issuer = build_issuer(
            &issuance,
            Arc::clone(&resources_store),
            lock.clone(),
            counter.clone(),
            broker.clone(),
            snapshots.clone(),
            pending.clone(),
        )
        .expect("Failed to build issuer");

        let claims = ClaimService::new(
            issuer,
            Arc::clone(&claims_store),
            Arc::clone(&resources_store),
            pending.clone(),
            snapshots.clone(),
            counter.clone(),
            Arc::new(IssueMetrics::new()),
        );
        let resources = ResourceService::new(
            Arc::clone(&resources_store),
            counter.clone(),
            snapshots.clone(),
        );
        let balances = BalanceService::new(
            Arc::clone(&balances_store),
            lock.clone(),
            &BalanceConfig::default(),
        );
        let handler = Arc::new(FulfillmentHandler::new(
            Arc::clone(&resources_store),
            pending.clone(),
            snapshots.clone(),
        ));

        Self {
            claims,
            resources,
            balances,
            lock,
            counter,
            broker,
            pending,
            snapshots,
            handler,
            store,
        }
    }

    /// Create a resource whose claim window is open right now.
    pub async fn open_resource(&self, total_quantity: i64) -> Resource {
        self.resources
            .create(CreateResource {
                name: format!("resource-{}", uuid::Uuid::new_v4()),
                total_quantity,
                valid_from: Utc::now() - chrono::Duration::hours(1),
                valid_until: Utc::now() + chrono::Duration::hours(1),
            })
            .await
            .expect("Failed to create resource")
    }

    /// Drain every partition through the fulfillment handler, acking
    /// successes and dead-lettering failures, until the broker is empty.
    /// Returns how many intents were fulfilled.
    pub async fn fulfill_queued(&self) -> u64 {
        let mut fulfilled = 0;
        for partition in 0..PARTITIONS {
            while let Some(delivery) = self
                .broker
                .consume(partition, Duration::from_millis(20))
                .await
                .expect("Failed to consume")
            {
                match self.handler.fulfill(&delivery.payload).await {
                    Ok(()) => {
                        self.broker.ack(&delivery).await.expect("Failed to ack");
                        fulfilled += 1;
                    }
                    Err(e) => {
                        self.broker
                            .dead_letter(&delivery, &e.to_string())
                            .await
                            .expect("Failed to dead-letter");
                    }
                }
            }
        }
        fulfilled
    }
}
