use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, debug_span, info_span};

use redlease_store::KeyValueStore;

use crate::config::LockConfig;
use crate::error::LockError;
use crate::renewal::{Renewal, RenewalHandle, RenewalRegistry};

/// Distributed lock with a self-renewing lease.
///
/// The store is the single source of truth for ownership; this type only
/// tracks the renewal tasks it started, indexed by `(key, holder_token)`.
/// Dropping the lock cancels every renewal task it owns, after which held
/// leases lapse at their TTL.
///
/// # Guarantees
///
/// - Two concurrent `acquire` calls for one key are serialized by the store's
///   atomic set-if-not-exists: at most one succeeds.
/// - `release` deletes the key only if it still holds the caller's token.
/// - If the store stays unreachable for longer than the TTL, the lease lapses
///   and another holder may acquire it while this process still has a
///   renewal task running. Long critical sections should re-check
///   ownership (`get(key) == token`) before committing irreversible effects.
///
/// # Example
///
/// ```ignore
/// let lock = DistributedLock::new(store);
/// let token = DistributedLock::new_token();
/// if lock.acquire("lock:job1", &token, Duration::from_secs(4)).await? {
///     run_job().await;
///     lock.release("lock:job1", &token).await?;
/// }
/// ```
pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
    config: LockConfig,
    span: Span,
    renewals: RenewalRegistry,
    next_generation: AtomicU64,
}

impl DistributedLock {
    /// Create a lock over `store` with the default [`LockConfig`].
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, LockConfig::default())
    }

    pub fn with_config(store: Arc<dyn KeyValueStore>, config: LockConfig) -> Self {
        Self {
            store,
            config,
            span: info_span!("distributed_lock"),
            renewals: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Emit every event of this lock, including those of its renewal tasks,
    /// under `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Enable or disable lease renewal for subsequent acquisitions.
    #[must_use]
    pub fn with_auto_renew(mut self, enabled: bool) -> Self {
        self.config.auto_renew = enabled;
        self
    }

    /// A random holder token for callers without their own unique id.
    pub fn new_token() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Try to take the lock `key` for `holder_token` with a lease of `ttl`.
    ///
    /// Returns `Ok(false)` when the key is already held, by anyone. On
    /// success a renewal task extends the lease every `ttl / 2` while the
    /// stored value still equals `holder_token`.
    ///
    /// # Errors
    ///
    /// [`LockError::InvalidTtl`] if `ttl` is under one millisecond, and
    /// [`LockError::Store`] if the store call fails. Nothing is retried.
    pub async fn acquire(
        &self,
        key: &str,
        holder_token: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let span = debug_span!(parent: &self.span, "acquire", key, holder = holder_token);
        self.acquire_inner(key, holder_token, ttl)
            .instrument(span)
            .await
    }

    async fn acquire_inner(
        &self,
        key: &str,
        holder_token: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        if ttl.as_millis() == 0 {
            return Err(LockError::InvalidTtl(ttl));
        }

        debug!(ttl = ?ttl, "acquiring lock");
        let acquired = self
            .store
            .set_if_not_exists(key, holder_token, ttl)
            .await?;

        if !acquired {
            debug!("lock is held elsewhere");
            return Ok(false);
        }

        debug!("lock acquired");
        if self.config.auto_renew {
            self.start_renewal(key, holder_token, ttl);
        }
        Ok(true)
    }

    /// Release `key` if it is still held by `holder_token`.
    ///
    /// Stops the local renewal task for the pair whether or not the store
    /// still held the caller's token. Releasing a lock that expired, was
    /// taken over, or was already released is a no-op.
    ///
    /// # Errors
    ///
    /// [`LockError::Store`] if the compare-and-delete call fails. The renewal
    /// task is stopped even then.
    pub async fn release(&self, key: &str, holder_token: &str) -> Result<(), LockError> {
        let span = debug_span!(parent: &self.span, "release", key, holder = holder_token);
        async {
            debug!("releasing lock");
            // Stop renewing before deleting so an in-flight tick cannot
            // extend a key that another holder takes right after the delete.
            if let Some((_, handle)) = self
                .renewals
                .remove(&(key.to_owned(), holder_token.to_owned()))
            {
                handle.cancel.cancel();
            }

            let deleted = self.store.compare_and_delete(key, holder_token).await?;
            if deleted {
                debug!("lock released");
            } else {
                debug!("lock was not held by this holder, nothing to delete");
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Whether a renewal task is running for `(key, holder_token)`.
    ///
    /// Turns `false` once the task observes the lease was lost, spends its
    /// failure budget, or is stopped by [`release`](Self::release).
    pub fn is_renewing(&self, key: &str, holder_token: &str) -> bool {
        self.renewals
            .contains_key(&(key.to_owned(), holder_token.to_owned()))
    }

    /// Number of renewal tasks currently running.
    pub fn active_renewals(&self) -> usize {
        self.renewals.len()
    }

    /// Stop every renewal task without touching the store.
    pub fn shutdown(&self) {
        let stopped = self.renewals.len();
        self.renewals.retain(|_, handle| {
            handle.cancel.cancel();
            false
        });
        if stopped > 0 {
            self.span
                .in_scope(|| debug!(stopped, "renewal tasks stopped"));
        }
    }

    fn start_renewal(&self, key: &str, holder_token: &str, ttl: Duration) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        let previous = self.renewals.insert(
            (key.to_owned(), holder_token.to_owned()),
            RenewalHandle {
                cancel: cancel.clone(),
                generation,
            },
        );
        if let Some(stale) = previous {
            // The old lease was lost without its task noticing yet.
            stale.cancel.cancel();
            debug!("replaced stale renewal task");
        }

        let renewal = Renewal {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.renewals),
            key: key.to_owned(),
            token: holder_token.to_owned(),
            ttl,
            max_failures: self.config.max_renewal_failures,
            cancel,
            generation,
        };
        let span = info_span!(parent: &self.span, "lease_renewal", key, holder = holder_token);
        tokio::spawn(renewal.run().instrument(span));
    }
}

impl Drop for DistributedLock {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLock")
            .field("config", &self.config)
            .field("active_renewals", &self.renewals.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use async_trait::async_trait;
    use redlease_store::StoreError;
    use redlease_store_memory::MemoryKeyValueStore;
    use tokio::sync::Notify;

    use super::*;

    const TTL: Duration = Duration::from_secs(2);

    fn setup() -> (Arc<MemoryKeyValueStore>, DistributedLock) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let lock = DistributedLock::new(store.clone());
        (store, lock)
    }

    /// Memory store that fails every call while `failing` is set.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryKeyValueStore,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(StoreError::Connection("store unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn set_if_not_exists(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<bool, StoreError> {
            self.check()?;
            self.inner.set_if_not_exists(key, value, ttl).await
        }

        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.check()?;
            self.inner.get(key).await
        }

        async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
            self.check()?;
            self.inner.expire(key, ttl).await
        }

        async fn compare_and_delete(
            &self,
            key: &str,
            expected: &str,
        ) -> Result<bool, StoreError> {
            self.check()?;
            self.inner.compare_and_delete(key, expected).await
        }
    }

    /// Memory store whose `get` parks after reading while the gate is closed.
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryKeyValueStore,
        gated: AtomicBool,
        reading: Notify,
        gate: Notify,
        expires: AtomicUsize,
    }

    impl GatedStore {
        fn close(&self) {
            self.gated.store(true, Ordering::SeqCst);
        }

        fn open(&self) {
            self.gated.store(false, Ordering::SeqCst);
            self.gate.notify_one();
        }
    }

    #[async_trait]
    impl KeyValueStore for GatedStore {
        async fn set_if_not_exists(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<bool, StoreError> {
            self.inner.set_if_not_exists(key, value, ttl).await
        }

        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            let value = self.inner.get(key).await?;
            if self.gated.load(Ordering::SeqCst) {
                self.reading.notify_one();
                self.gate.notified().await;
            }
            Ok(value)
        }

        async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
            self.expires.fetch_add(1, Ordering::SeqCst);
            self.inner.expire(key, ttl).await
        }

        async fn compare_and_delete(
            &self,
            key: &str,
            expected: &str,
        ) -> Result<bool, StoreError> {
            self.inner.compare_and_delete(key, expected).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_holder_is_refused_while_held() {
        let (_store, lock) = setup();

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        assert!(!lock.acquire("k", "t2", TTL).await.unwrap());
        assert!(lock.is_renewing("k", "t1"));
        assert!(!lock.is_renewing("k", "t2"));
        assert_eq!(lock.active_renewals(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn release_lets_next_holder_in() {
        let (store, lock) = setup();

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        lock.release("k", "t1").await.unwrap();

        assert!(store.get("k").await.unwrap().is_none());
        assert!(!lock.is_renewing("k", "t1"));
        assert!(lock.acquire("k", "t2", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_release_leaves_lock_in_place() {
        let (store, lock) = setup();

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        lock.release("k", "t2").await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("t1"));
        assert!(!lock.acquire("k", "t2", TTL).await.unwrap());
        assert!(lock.is_renewing("k", "t1"));
    }

    #[tokio::test(start_paused = true)]
    async fn lease_lapses_without_renewal() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let lock = DistributedLock::new(store.clone()).with_auto_renew(false);

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        assert_eq!(lock.active_renewals(), 0);

        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert!(store.get("k").await.unwrap().is_none());
        assert!(lock.acquire("k", "t2", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_keeps_lease_alive() {
        let (store, lock) = setup();

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("t1"));
        assert!(!lock.acquire("k", "t2", TTL).await.unwrap());
        assert!(lock.is_renewing("k", "t1"));
    }

    #[tokio::test(start_paused = true)]
    async fn double_release_is_a_no_op() {
        let (store, lock) = setup();

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        lock.release("k", "t1").await.unwrap();
        assert!(lock.acquire("k", "t2", TTL).await.unwrap());

        lock.release("k", "t1").await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("t2"));
        assert!(lock.is_renewing("k", "t2"));
    }

    #[tokio::test(start_paused = true)]
    async fn release_without_acquire_is_a_no_op() {
        let (store, lock) = setup();
        lock.release("never-held", "t1").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn worker_handoff_scenario() {
        let (_store, lock) = setup();
        let ttl = Duration::from_secs(4);

        assert!(lock.acquire("lock:job1", "worker-A", ttl).await.unwrap());
        assert!(!lock.acquire("lock:job1", "worker-B", ttl).await.unwrap());
        lock.release("lock:job1", "worker-A").await.unwrap();
        assert!(lock.acquire("lock:job1", "worker-B", ttl).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_is_rejected_before_touching_store() {
        let (store, lock) = setup();

        let err = lock.acquire("k", "t1", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, LockError::InvalidTtl(d) if d.is_zero()));
        let err = lock
            .acquire("k", "t1", Duration::from_micros(999))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::InvalidTtl(_)));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_stops_when_lock_is_taken_over() {
        let (store, lock) = setup();

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());

        // Someone else deletes the key and takes it, outside this process.
        assert!(store.compare_and_delete("k", "t1").await.unwrap());
        assert!(
            store
                .set_if_not_exists("k", "t2", Duration::from_millis(1500))
                .await
                .unwrap()
        );

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!lock.is_renewing("k", "t1"));
        assert_eq!(lock.active_renewals(), 0);

        // The stopped task must not have extended the new holder's lease.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_stops_when_lease_expires_on_its_own() {
        let (store, lock) = setup();

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        // Shorten the lease behind the lock's back.
        store.expire("k", Duration::from_millis(500)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!lock.is_renewing("k", "t1"));
    }

    #[tokio::test(start_paused = true)]
    async fn released_lock_is_not_extended_afterwards() {
        let (store, lock) = setup();

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        lock.release("k", "t1").await.unwrap();

        // Re-create the key with the old token directly in the store; a
        // lingering task would keep extending it.
        store
            .set_if_not_exists("k", "t1", Duration::from_millis(1500))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn release_during_in_flight_tick_skips_extension() {
        let store = Arc::new(GatedStore::default());
        let lock = DistributedLock::new(store.clone());

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());

        // The tick at 1s reads "t1" and parks before extending.
        store.close();
        store.reading.notified().await;

        lock.release("k", "t1").await.unwrap();
        store.open();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(store.expires.load(Ordering::SeqCst), 0);
        assert!(!lock.is_renewing("k", "t1"));
        assert_eq!(lock.active_renewals(), 0);
        assert!(store.inner.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_read_extends_new_holder_at_most_once() {
        let store = Arc::new(GatedStore::default());
        let lock = DistributedLock::new(store.clone());

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());

        store.close();
        store.reading.notified().await;

        // Taken over between the tick's read and its extend.
        assert!(store.inner.compare_and_delete("k", "t1").await.unwrap());
        assert!(
            store
                .inner
                .set_if_not_exists("k", "t2", Duration::from_millis(1500))
                .await
                .unwrap()
        );
        store.open();

        // The next tick at 2s reads "t2" and stops.
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.expires.load(Ordering::SeqCst), 1);
        assert!(!lock.is_renewing("k", "t1"));
        assert_eq!(store.inner.get("k").await.unwrap().as_deref(), Some("t2"));
    }

    #[tokio::test(start_paused = true)]
    async fn reacquire_replaces_stale_renewal_task() {
        let (store, lock) = setup();

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        // Lease lost before the task noticed, then re-taken by the same token.
        store.compare_and_delete("k", "t1").await.unwrap();
        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        assert_eq!(lock.active_renewals(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("t1"));
        assert!(lock.is_renewing("k", "t1"));
        assert_eq!(lock.active_renewals(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_survives_transient_store_errors() {
        let store = Arc::new(FlakyStore::default());
        let lock = DistributedLock::new(store.clone());

        assert!(lock.acquire("k", "t1", Duration::from_secs(10)).await.unwrap());

        store.set_failing(true);
        // Ticks at 5s and 10s fail.
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert!(lock.is_renewing("k", "t1"), "errors must not stop renewal");
        store.set_failing(false);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_budget_stops_renewal() {
        let store = Arc::new(FlakyStore::default());
        let config = LockConfig {
            max_renewal_failures: Some(2),
            ..LockConfig::default()
        };
        let lock = DistributedLock::with_config(store.clone(), config);

        assert!(lock.acquire("k", "t1", Duration::from_secs(10)).await.unwrap());

        store.set_failing(true);
        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert!(lock.is_renewing("k", "t1"), "one failure is within budget");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!lock.is_renewing("k", "t1"));
        store.set_failing(false);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_budget_resets_after_success() {
        let store = Arc::new(FlakyStore::default());
        let config = LockConfig {
            max_renewal_failures: Some(2),
            ..LockConfig::default()
        };
        let lock = DistributedLock::with_config(store.clone(), config);

        assert!(lock.acquire("k", "t1", Duration::from_secs(10)).await.unwrap());

        // Fail the tick at 5s, succeed at 10s, fail at 15s.
        store.set_failing(true);
        tokio::time::sleep(Duration::from_millis(5500)).await;
        store.set_failing(false);
        // Keep the missed lease from running out exactly at the next tick.
        store.inner.expire("k", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        store.set_failing(true);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(lock.is_renewing("k", "t1"));
        store.set_failing(false);
    }

    #[tokio::test(start_paused = true)]
    async fn store_errors_propagate_from_acquire_and_release() {
        let store = Arc::new(FlakyStore::default());
        let lock = DistributedLock::new(store.clone());

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        store.set_failing(true);

        let err = lock.acquire("other", "t1", TTL).await.unwrap_err();
        assert!(matches!(err, LockError::Store(StoreError::Connection(_))));

        let err = lock.release("k", "t1").await.unwrap_err();
        assert!(matches!(err, LockError::Store(_)));
        assert!(
            !lock.is_renewing("k", "t1"),
            "failed release still stops renewal"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_all_renewals() {
        let (store, lock) = setup();

        assert!(lock.acquire("a", "t1", TTL).await.unwrap());
        assert!(lock.acquire("b", "t1", TTL).await.unwrap());
        assert_eq!(lock.active_renewals(), 2);

        lock.shutdown();
        assert_eq!(lock.active_renewals(), 0);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(store.is_empty(), "leases lapse once renewal stops");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_lock_stops_renewals() {
        let (store, lock) = setup();

        assert!(lock.acquire("k", "t1", TTL).await.unwrap());
        drop(lock);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_acquire_has_single_winner() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let lock = Arc::new(DistributedLock::new(store));
        let mut handles = Vec::new();

        for i in 0..10 {
            let lock = Arc::clone(&lock);
            handles.push(tokio::spawn(async move {
                lock.acquire("contended", &format!("worker-{i}"), Duration::from_secs(30))
                    .await
                    .expect("acquire should not error")
            }));
        }

        let mut winners = 0;
        for h in handles {
            if h.await.expect("task should not panic") {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(lock.active_renewals(), 1);
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(DistributedLock::new_token(), DistributedLock::new_token());
    }
}
