//! Redis-backed quantity counter using INCRBY/DECRBY.

use async_trait::async_trait;
use redis::AsyncCommands;

use claimgate_core::error::{AppError, ErrorKind};
use claimgate_core::result::AppResult;
use claimgate_core::traits::counter::QuantityCounter;
use claimgate_core::types::id::ResourceId;

/// Key of the per-resource remaining-quantity counter.
fn quantity_key(resource_id: &ResourceId) -> String {
    format!("claimgate:quantity:{resource_id}")
}

/// Redis-backed counter for multi-node deployments.
///
/// DECRBY is atomic on the server, so concurrent issuers each observe a
/// distinct post-decrement value and at most `quantity` of them see a
/// non-negative one.
#[derive(Debug, Clone)]
pub struct RedisQuantityCounter {
    /// Redis connection manager.
    conn: redis::aio::ConnectionManager,
}

impl RedisQuantityCounter {
    /// Connect to Redis and build the counter backend.
    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Failed to create Redis client", e)
        })?;

        let conn = client.get_connection_manager().await.map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Failed to connect to Redis", e)
        })?;

        Ok(Self { conn })
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Cache, format!("Redis counter error: {e}"), e)
    }
}

#[async_trait]
impl QuantityCounter for RedisQuantityCounter {
    async fn seed(&self, resource_id: &ResourceId, quantity: i64) -> AppResult<bool> {
        let mut conn = self.conn.clone();

        // SET key quantity NX
        let set: Option<String> = redis::cmd("SET")
            .arg(quantity_key(resource_id))
            .arg(quantity)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(set.is_some())
    }

    async fn decrement(&self, resource_id: &ResourceId, by: i64) -> AppResult<i64> {
        let mut conn = self.conn.clone();
        conn.decr(quantity_key(resource_id), by)
            .await
            .map_err(Self::map_err)
    }

    async fn increment(&self, resource_id: &ResourceId, by: i64) -> AppResult<i64> {
        let mut conn = self.conn.clone();
        conn.incr(quantity_key(resource_id), by)
            .await
            .map_err(Self::map_err)
    }

    async fn get(&self, resource_id: &ResourceId) -> AppResult<Option<i64>> {
        let mut conn = self.conn.clone();
        conn.get(quantity_key(resource_id))
            .await
            .map_err(Self::map_err)
    }

    async fn force_set(&self, resource_id: &ResourceId, quantity: i64) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(quantity_key(resource_id), quantity)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn remove(&self, resource_id: &ResourceId) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(quantity_key(resource_id))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }
}
