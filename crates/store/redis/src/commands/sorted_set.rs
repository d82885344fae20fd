use redis::AsyncCommands;
use tracing::debug;

use redlease_store::StoreError;

use crate::helper::{RedisHelper, backend};

/// Sorted set commands. Ranges are returned as `(member, score)` pairs.
#[derive(Clone, Copy)]
pub struct SortedSets<'a> {
    pub(crate) helper: &'a RedisHelper,
}

impl<'a> SortedSets<'a> {
    pub(crate) fn new(helper: &'a RedisHelper) -> Self {
        Self { helper }
    }

    /// Add `(score, member)` pairs. Returns how many members were new.
    pub async fn zadd_multiple(
        &self,
        key: &str,
        items: &[(f64, &str)],
    ) -> Result<usize, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let added: usize = conn
            .zadd_multiple(&redis_key, items)
            .await
            .map_err(backend)?;
        debug!(key = %redis_key, ?items, added, "zadd_multiple");
        Ok(added)
    }

    /// Members by index, lowest score first.
    pub async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let members: Vec<(String, f64)> = conn
            .zrange_withscores(&redis_key, start, stop)
            .await
            .map_err(backend)?;
        debug!(key = %redis_key, start, stop, count = members.len(), "zrange");
        Ok(members)
    }

    /// Members by index, highest score first.
    pub async fn zrevrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let members: Vec<(String, f64)> = conn
            .zrevrange_withscores(&redis_key, start, stop)
            .await
            .map_err(backend)?;
        debug!(key = %redis_key, start, stop, count = members.len(), "zrevrange");
        Ok(members)
    }

    /// Members with `min <= score <= max`, highest score first.
    pub async fn zrevrange_by_score(
        &self,
        key: &str,
        max: f64,
        min: f64,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let members: Vec<(String, f64)> = conn
            .zrevrangebyscore_withscores(&redis_key, max, min)
            .await
            .map_err(backend)?;
        debug!(key = %redis_key, max, min, count = members.len(), "zrevrange_by_score");
        Ok(members)
    }

    pub async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let score: Option<f64> = conn.zscore(&redis_key, member).await.map_err(backend)?;
        debug!(key = %redis_key, member, score = ?score, "zscore");
        Ok(score)
    }
}
