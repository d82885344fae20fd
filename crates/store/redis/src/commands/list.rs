use redis::AsyncCommands;
use tracing::debug;

use redlease_store::StoreError;

use crate::helper::{RedisHelper, backend};

/// List commands.
#[derive(Clone, Copy)]
pub struct Lists<'a> {
    pub(crate) helper: &'a RedisHelper,
}

impl<'a> Lists<'a> {
    pub(crate) fn new(helper: &'a RedisHelper) -> Self {
        Self { helper }
    }

    /// Push `values` onto the head of the list. Returns the new length.
    ///
    /// Values are pushed in order, so the last one ends up at the head.
    pub async fn lpush(&self, key: &str, values: &[&str]) -> Result<usize, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let len: usize = conn.lpush(&redis_key, values).await.map_err(backend)?;
        debug!(key = %redis_key, ?values, len, "lpush");
        Ok(len)
    }

    /// Append `values` to the tail of the list. Returns the new length.
    pub async fn rpush(&self, key: &str, values: &[&str]) -> Result<usize, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let len: usize = conn.rpush(&redis_key, values).await.map_err(backend)?;
        debug!(key = %redis_key, ?values, len, "rpush");
        Ok(len)
    }

    /// Remove and return the last element of the list.
    pub async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let value: Option<String> = conn.rpop(&redis_key, None).await.map_err(backend)?;
        debug!(key = %redis_key, result = ?value, "rpop");
        Ok(value)
    }

    /// Elements between `start` and `stop` inclusive; negative indexes count
    /// from the tail.
    pub async fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let values: Vec<String> = conn
            .lrange(&redis_key, start, stop)
            .await
            .map_err(backend)?;
        debug!(key = %redis_key, start, stop, count = values.len(), "lrange");
        Ok(values)
    }
}
