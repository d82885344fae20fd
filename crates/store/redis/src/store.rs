use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::{AsyncCommands, Script};
use tracing::debug;

use redlease_store::error::StoreError;
use redlease_store::store::KeyValueStore;

use crate::config::RedisConfig;
use crate::key_render::render_key;
use crate::scripts;

/// Redis-backed implementation of [`KeyValueStore`].
///
/// `set_if_not_exists` and `compare_and_delete` run as Lua scripts, so each is
/// a single atomic round trip. The pool is cheap to clone and may be shared
/// with a [`RedisHelper`](crate::RedisHelper).
#[derive(Clone)]
pub struct RedisKeyValueStore {
    pool: Pool,
    prefix: String,
    set_if_not_exists: Script,
    compare_and_delete: Script,
}

impl RedisKeyValueStore {
    /// Create a new `RedisKeyValueStore` with its own pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, StoreError> {
        Ok(Self::from_pool(config.build_pool()?, config.prefix.clone()))
    }

    /// Wrap an existing pool. Keys are rendered with `prefix`.
    pub fn from_pool(pool: Pool, prefix: String) -> Self {
        Self {
            pool,
            prefix,
            set_if_not_exists: Script::new(scripts::SET_IF_NOT_EXISTS),
            compare_and_delete: Script::new(scripts::COMPARE_AND_DELETE),
        }
    }

    fn redis_key(&self, key: &str) -> String {
        render_key(&self.prefix, key)
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

/// Convert a TTL into the millisecond argument Redis expects (`PX`/`PEXPIRE`).
fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn().await?;

        let result: i64 = self
            .set_if_not_exists
            .key(&redis_key)
            .arg(value)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(key = %redis_key, ttl_ms = ttl_millis(ttl), set = result == 1, "set_if_not_exists");
        Ok(result == 1)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn().await?;

        let val: Option<String> = conn
            .get(&redis_key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(key = %redis_key, found = val.is_some(), "get");
        Ok(val)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn().await?;

        let extended: bool = conn
            .pexpire(&redis_key, ttl_millis(ttl))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(key = %redis_key, ttl_ms = ttl_millis(ttl), extended, "expire");
        Ok(extended)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn().await?;

        let result: i64 = self
            .compare_and_delete
            .key(&redis_key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(key = %redis_key, deleted = result == 1, "compare_and_delete");
        Ok(result == 1)
    }
}
