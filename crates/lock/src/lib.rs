//! Distributed mutual exclusion with a self-renewing lease.
//!
//! A lock is a single key in a [`KeyValueStore`] whose value is the holder's
//! token and whose TTL is the lease. [`DistributedLock::acquire`] sets the key
//! with `SET NX`-style semantics and starts a renewal task that re-reads the
//! key every half lease and extends it while the token still matches.
//! [`DistributedLock::release`] deletes the key only if it still holds the
//! caller's token and stops the renewal task.
//!
//! [`KeyValueStore`]: redlease_store::KeyValueStore

mod config;
mod error;
mod lock;
mod renewal;

pub use config::LockConfig;
pub use error::LockError;
pub use lock::DistributedLock;
