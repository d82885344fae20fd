use std::time::Duration;

use deadpool_redis::{Config, Pool, Runtime};

use redlease_store::StoreError;

/// Configuration for the Redis store backend and command helpers.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g. `redis://:password@127.0.0.1:6379/0`).
    pub url: String,

    /// Key prefix applied to every Redis key. Empty means keys are used as-is.
    pub prefix: String,

    /// Number of connections in the `deadpool-redis` pool.
    pub pool_size: usize,

    /// Timeout for acquiring a pooled connection.
    pub connection_timeout: Duration,
}

impl RedisConfig {
    /// Create a configuration for the given URL with default pool settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Build a connection pool from this configuration.
    ///
    /// No connection is opened until the pool is first used.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the URL or pool settings are invalid.
    pub fn build_pool(&self) -> Result<Pool, StoreError> {
        Config::from_url(&self.url)
            .builder()
            .map(|b| {
                b.max_size(self.pool_size)
                    .wait_timeout(Some(self.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            prefix: String::new(),
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
        }
    }
}
