use std::time::Duration;

use redis::AsyncCommands;
use tracing::debug;

use redlease_store::StoreError;

use crate::helper::{RedisHelper, backend};

/// String commands.
#[derive(Clone, Copy)]
pub struct Strings<'a> {
    pub(crate) helper: &'a RedisHelper,
}

impl<'a> Strings<'a> {
    pub(crate) fn new(helper: &'a RedisHelper) -> Self {
        Self { helper }
    }

    /// Increment the integer at `key` by one. Returns the new value.
    pub async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.incr_by(key, 1).await
    }

    /// Increment the integer at `key` by `delta`. Returns the new value.
    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let value: i64 = conn.incr(&redis_key, delta).await.map_err(backend)?;
        debug!(key = %redis_key, delta, value, "incr_by");
        Ok(value)
    }

    /// Increment the number at `key` by a float `delta` (`INCRBYFLOAT`).
    pub async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let value: f64 = redis::cmd("INCRBYFLOAT")
            .arg(&redis_key)
            .arg(delta)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        debug!(key = %redis_key, delta, value, "incr_by_float");
        Ok(value)
    }

    /// Set `key` to `value`, overwriting any previous value and TTL.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let () = conn.set(&redis_key, value).await.map_err(backend)?;
        debug!(key = %redis_key, value, "set");
        Ok(())
    }

    /// Set `key` only if it does not exist, optionally with a TTL.
    /// Returns `true` if the key was set.
    pub async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(&redis_key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("PX")
                .arg(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));
        }
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(backend)?;
        debug!(key = %redis_key, ttl = ?ttl, set = reply.is_some(), "set_nx");
        Ok(reply.is_some())
    }

    /// Get the value at `key`.
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let value: Option<String> = conn.get(&redis_key).await.map_err(backend)?;
        debug!(key = %redis_key, result = ?value, "get");
        Ok(value)
    }
}
