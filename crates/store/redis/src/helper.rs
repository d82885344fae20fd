use std::time::Duration;

use deadpool_redis::Pool;
use futures::StreamExt;
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use redlease_store::StoreError;

use crate::commands::{Hashes, Lists, Sets, SortedSets, Strings};
use crate::config::RedisConfig;
use crate::key_render::render_key;
use crate::store::RedisKeyValueStore;

/// Data-type oriented facade over a pooled Redis connection.
///
/// Every call renders its key with the configured prefix and logs the command
/// at `debug` level. Replies are converted to concrete Rust types at the
/// boundary.
///
/// ```ignore
/// let helper = RedisHelper::new(&RedisConfig::new("redis://localhost:6379"))?;
/// helper.ping().await?;
/// helper.strings().set("greeting", "hello").await?;
/// let lock = DistributedLock::new(Arc::new(helper.key_value_store()));
/// ```
#[derive(Clone)]
pub struct RedisHelper {
    pool: Pool,
    url: String,
    prefix: String,
}

impl RedisHelper {
    /// Create a helper with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, StoreError> {
        Ok(Self {
            pool: config.build_pool()?,
            url: config.url.clone(),
            prefix: config.prefix.clone(),
        })
    }

    /// Check connectivity by sending `PING`.
    pub async fn ping(&self) -> Result<(), StoreError> {
        info!(url = %self.url, "connecting to redis");
        let mut conn = self.conn().await.inspect_err(|e| {
            warn!(url = %self.url, error = %e, "redis connection failed");
        })?;
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        info!(url = %self.url, reply = %reply, "redis connection established");
        Ok(())
    }

    /// A [`RedisKeyValueStore`] sharing this helper's pool and prefix.
    pub fn key_value_store(&self) -> RedisKeyValueStore {
        RedisKeyValueStore::from_pool(self.pool.clone(), self.prefix.clone())
    }

    /// String commands.
    pub fn strings(&self) -> Strings<'_> {
        Strings::new(self)
    }

    /// List commands.
    pub fn lists(&self) -> Lists<'_> {
        Lists::new(self)
    }

    /// Set commands.
    pub fn sets(&self) -> Sets<'_> {
        Sets::new(self)
    }

    /// Sorted set commands.
    pub fn sorted_sets(&self) -> SortedSets<'_> {
        SortedSets::new(self)
    }

    /// Hash commands.
    pub fn hashes(&self) -> Hashes<'_> {
        Hashes::new(self)
    }

    /// Delete a key. Returns `true` if the key existed.
    pub async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let redis_key = self.key(key);
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(&redis_key).await.map_err(backend)?;
        debug!(key = %redis_key, removed, "del");
        Ok(removed > 0)
    }

    /// Set a key's TTL. Returns `false` if the key does not exist.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let redis_key = self.key(key);
        let ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let mut conn = self.conn().await?;
        let extended: bool = conn.pexpire(&redis_key, ms).await.map_err(backend)?;
        debug!(key = %redis_key, ttl_ms = ms, extended, "expire");
        Ok(extended)
    }

    /// Publish a message. Returns the number of subscribers that received it.
    ///
    /// Channel names are not prefixed.
    pub async fn publish(&self, channel: &str, message: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn().await?;
        let receivers: usize = conn.publish(channel, message).await.map_err(backend)?;
        debug!(channel, receivers, "publish");
        Ok(receivers)
    }

    /// Subscribe to `channels` on a dedicated connection and feed every
    /// message to `handler` until `cancel` fires or the server closes the
    /// connection.
    ///
    /// Messages whose payload is not valid UTF-8 are logged and skipped.
    pub async fn subscribe<F>(
        &self,
        channels: &[String],
        cancel: &CancellationToken,
        mut handler: F,
    ) -> Result<(), StoreError>
    where
        F: FnMut(&str, &str) + Send,
    {
        let client = redis::Client::open(self.url.as_str())
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        pubsub.subscribe(channels).await.map_err(backend)?;
        info!(?channels, "subscribed");

        let mut messages = std::pin::pin!(pubsub.on_message());
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(?channels, "subscription cancelled");
                    break;
                }
                msg = messages.next() => {
                    let Some(msg) = msg else {
                        warn!(?channels, "subscription stream closed by server");
                        break;
                    };
                    let channel = msg.get_channel_name();
                    match msg.get_payload::<String>() {
                        Ok(payload) => {
                            debug!(channel, "message received");
                            handler(channel, &payload);
                        }
                        Err(e) => warn!(channel, error = %e, "skipping undecodable message"),
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn key(&self, key: &str) -> String {
        render_key(&self.prefix, key)
    }

    /// Obtain a connection from the pool.
    pub(crate) async fn conn(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

/// Map a command failure into a [`StoreError::Backend`].
pub(crate) fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}
