use std::collections::HashMap;

use redis::AsyncCommands;
use tracing::debug;

use redlease_store::StoreError;

use crate::helper::{RedisHelper, backend};

/// Hash commands.
#[derive(Clone, Copy)]
pub struct Hashes<'a> {
    pub(crate) helper: &'a RedisHelper,
}

impl<'a> Hashes<'a> {
    pub(crate) fn new(helper: &'a RedisHelper) -> Self {
        Self { helper }
    }

    /// Set several field/value pairs at once.
    pub async fn hset_multiple(
        &self,
        key: &str,
        items: &[(&str, &str)],
    ) -> Result<(), StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let () = conn
            .hset_multiple(&redis_key, items)
            .await
            .map_err(backend)?;
        debug!(key = %redis_key, ?items, "hset_multiple");
        Ok(())
    }

    /// Set `field` only if it does not exist. Returns `true` if it was set.
    pub async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let set: bool = conn
            .hset_nx(&redis_key, field, value)
            .await
            .map_err(backend)?;
        debug!(key = %redis_key, field, value, set, "hset_nx");
        Ok(set)
    }

    /// Set `field`. Returns `true` if the field is new.
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let created: i64 = conn.hset(&redis_key, field, value).await.map_err(backend)?;
        debug!(key = %redis_key, field, value, "hset");
        Ok(created > 0)
    }

    /// Increment the integer in `field` by `delta`. Returns the new value.
    pub async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let value: i64 = conn
            .hincr(&redis_key, field, delta)
            .await
            .map_err(backend)?;
        debug!(key = %redis_key, field, delta, value, "hincr_by");
        Ok(value)
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let value: Option<String> = conn.hget(&redis_key, field).await.map_err(backend)?;
        debug!(key = %redis_key, field, result = ?value, "hget");
        Ok(value)
    }

    /// All field/value pairs of the hash; empty when the key is missing.
    pub async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let fields: HashMap<String, String> = conn.hgetall(&redis_key).await.map_err(backend)?;
        debug!(key = %redis_key, count = fields.len(), "hget_all");
        Ok(fields)
    }

    /// Delete `field`. Returns `true` if it existed.
    pub async fn hdel(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let removed: i64 = conn.hdel(&redis_key, field).await.map_err(backend)?;
        debug!(key = %redis_key, field, removed, "hdel");
        Ok(removed > 0)
    }
}
