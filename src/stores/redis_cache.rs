//! Redis-backed snapshot cache.
//!
//! Holds one `ConnectionManager`, which multiplexes commands from concurrent
//! requests over a single connection and reconnects on its own.

use super::{SnapshotCache, StoreError, StoreResult};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionLike, aio::ConnectionManager};

#[derive(Clone)]
pub struct RedisSnapshotCache {
    conn: ConnectionManager,
}

impl RedisSnapshotCache {
    /// Connect to `addr` (`host:port`) and verify the connection with a PING.
    ///
    /// With `tls` the `rediss://` scheme is used.
    pub async fn connect(addr: &str, tls: bool) -> StoreResult<Self> {
        let client = redis::Client::open(connection_url(addr, tls))?;
        let conn = ConnectionManager::new(client).await?;
        let cache = Self { conn };
        cache.ping().await?;
        Ok(cache)
    }
}

/// Build the connection URL for database 0 on `addr`.
pub fn connection_url(addr: &str, tls: bool) -> String {
    let scheme = if tls { "rediss" } else { "redis" };
    format!("{}://{}/0", scheme, addr)
}

#[async_trait]
impl SnapshotCache for RedisSnapshotCache {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        value.ok_or(StoreError::NotFound)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.req_packed_command(&redis::cmd("PING")).await?;
        Ok(())
    }
}
