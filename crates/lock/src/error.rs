use std::time::Duration;

use thiserror::Error;

use redlease_store::StoreError;

/// Errors from distributed lock operations.
///
/// Contention is not an error: a lock held by someone else makes
/// [`acquire`](crate::DistributedLock::acquire) return `Ok(false)`.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lease TTL must be at least one millisecond, got {0:?}")]
    InvalidTtl(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}
