//! Redis state store for `leaky` (companion crate).
//! Bring your own `redis::aio::ConnectionManager`; values are written with
//! `SET key value PX <ttl>` and read with `GET`.

use async_trait::async_trait;
use leaky::StateStore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("conn", &"<redis::aio::ConnectionManager>").finish()
    }
}

impl RedisStore {
    /// Wrap an existing connection manager. Clones share the underlying connection.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Open a client for `url` (e.g. `redis://127.0.0.1/`) and connect.
    ///
    /// # Errors
    /// Returns `Err` if the URL is invalid or the first connection fails.
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::debug!(target: "leaky::redis", "connected to redis");
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl StateStore for RedisStore {
    type Error = redis::RedisError;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut conn = self.conn.clone();
        conn.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), Self::Error> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
    }
}

/// Redis rejects a zero or negative expiry, so anything under a millisecond rounds up to one.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
