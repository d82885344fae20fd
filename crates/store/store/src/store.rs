use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// The capability surface a distributed lock needs from its backing store.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// `set_if_not_exists` and `compare_and_delete` must each be a single atomic
/// operation at the store: no caller may observe an intermediate state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set `key` to `value` with the given TTL, only if the key is absent.
    /// Returns `true` if the key was newly set, `false` if it already existed.
    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Get the value for a key. Returns `None` if not found or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Reset the TTL of an existing key.
    ///
    /// Returns `false` without error when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Delete `key` only if its current value equals `expected`.
    /// Returns `true` if the key was deleted.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;
}
