use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use redlease_lock::LockConfig;
use redlease_store_redis::RedisConfig;

/// Top-level configuration, loaded from a TOML file.
///
/// ```toml
/// [redis]
/// url = "redis://127.0.0.1:6379"
/// prefix = "jobs"
/// pool_size = 4
/// connection_timeout_ms = 2000
///
/// [lock]
/// auto_renew = true
/// max_renewal_failures = 3
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct RedleaseConfig {
    /// Redis connection settings.
    #[serde(default)]
    pub redis: RedisSection,
    /// Lease renewal behavior.
    #[serde(default)]
    pub lock: LockConfig,
}

/// The `[redis]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RedisSection {
    pub url: String,
    pub prefix: String,
    pub pool_size: usize,
    pub connection_timeout_ms: u64,
}

impl Default for RedisSection {
    fn default() -> Self {
        let defaults = RedisConfig::default();
        Self {
            url: defaults.url,
            prefix: defaults.prefix,
            pool_size: defaults.pool_size,
            connection_timeout_ms: u64::try_from(defaults.connection_timeout.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

impl RedisSection {
    pub fn to_redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.url.clone(),
            prefix: self.prefix.clone(),
            pool_size: self.pool_size,
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
        }
    }
}

impl RedleaseConfig {
    /// Load from `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}
