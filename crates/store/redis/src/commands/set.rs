use std::collections::HashSet;

use redis::AsyncCommands;
use tracing::debug;

use redlease_store::StoreError;

use crate::helper::{RedisHelper, backend};

/// Set commands.
#[derive(Clone, Copy)]
pub struct Sets<'a> {
    pub(crate) helper: &'a RedisHelper,
}

impl<'a> Sets<'a> {
    pub(crate) fn new(helper: &'a RedisHelper) -> Self {
        Self { helper }
    }

    /// Add members. Returns how many were not already present.
    pub async fn sadd(&self, key: &str, members: &[&str]) -> Result<usize, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let added: usize = conn.sadd(&redis_key, members).await.map_err(backend)?;
        debug!(key = %redis_key, ?members, added, "sadd");
        Ok(added)
    }

    pub async fn smembers(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let members: HashSet<String> = conn.smembers(&redis_key).await.map_err(backend)?;
        debug!(key = %redis_key, count = members.len(), "smembers");
        Ok(members)
    }

    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let present: bool = conn.sismember(&redis_key, member).await.map_err(backend)?;
        debug!(key = %redis_key, member, present, "sismember");
        Ok(present)
    }

    /// Remove and return a random member.
    pub async fn spop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let member: Option<String> = conn.spop(&redis_key).await.map_err(backend)?;
        debug!(key = %redis_key, result = ?member, "spop");
        Ok(member)
    }

    /// Remove members. Returns how many were present.
    pub async fn srem(&self, key: &str, members: &[&str]) -> Result<usize, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let removed: usize = conn.srem(&redis_key, members).await.map_err(backend)?;
        debug!(key = %redis_key, ?members, removed, "srem");
        Ok(removed)
    }

    /// Number of members.
    pub async fn scard(&self, key: &str) -> Result<usize, StoreError> {
        let redis_key = self.helper.key(key);
        let mut conn = self.helper.conn().await?;
        let count: usize = conn.scard(&redis_key).await.map_err(backend)?;
        debug!(key = %redis_key, count, "scard");
        Ok(count)
    }
}
