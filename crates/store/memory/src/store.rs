use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::Instant;

use redlease_store::error::StoreError;
use redlease_store::store::KeyValueStore;

/// A single entry in the in-memory store.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    /// Returns `true` if this entry has passed its TTL deadline.
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory [`KeyValueStore`] backed by a [`DashMap`].
///
/// Expiry is lazy: entries past their deadline are evicted on the next access
/// to the same key. Deadlines use [`tokio::time::Instant`], so paused-clock
/// tests can drive expiry with `tokio::time::advance`.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    data: DashMap<String, Entry>,
}

impl MemoryKeyValueStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        self.data.iter().filter(|e| !e.is_expired()).count()
    }

    /// Returns `true` if the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_expired(&self, key: &str) {
        self.data.remove_if(key, |_, entry| entry.is_expired());
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let fresh = Entry {
            value: value.to_owned(),
            expires_at: Instant::now() + ttl,
        };

        // The entry API holds the shard lock, so the expiry check and the
        // write are atomic.
        let inserted = match self.data.entry(key.to_owned()) {
            MapEntry::Occupied(mut occupied) if occupied.get().is_expired() => {
                occupied.insert(fresh);
                true
            }
            MapEntry::Occupied(_) => false,
            MapEntry::Vacant(vacant) => {
                vacant.insert(fresh);
                true
            }
        };
        Ok(inserted)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.evict_expired(key);
        Ok(self.data.get(key).map(|entry| entry.value.clone()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.evict_expired(key);
        match self.data.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Instant::now() + ttl;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let removed = self
            .data
            .remove_if(key, |_, entry| !entry.is_expired() && entry.value == expected);
        self.evict_expired(key);
        Ok(removed.is_some())
    }
}
