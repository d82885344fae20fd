//! Redis backend for redlease.
//!
//! This crate provides:
//!
//! - **[`RedisKeyValueStore`]**: the [`KeyValueStore`] implementation used by
//!   `redlease-lock`. `SET NX PX` and compare-and-delete run as Lua scripts,
//!   so each is one atomic round trip.
//! - **[`RedisHelper`]**: data-type oriented command groups (strings, lists,
//!   sets, sorted sets, hashes) plus key and pub/sub operations, each logged
//!   at `debug` level.
//! - **Connection pooling** through `deadpool-redis`.
//!
//! # Lock Consistency
//!
//! | Deployment | Mutual Exclusion | Notes |
//! |------------|------------------|-------|
//! | Single instance | Strong | Full mutual exclusion guaranteed |
//! | Sentinel | Weak | Lock may be lost during failover |
//! | Cluster | Weak | Lock may be lost during failover |
//!
//! Replication is asynchronous: a master that fails right after a lock is
//! written may be replaced by a replica that never saw the key.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use redlease_lock::DistributedLock;
//! use redlease_store_redis::{RedisConfig, RedisHelper};
//!
//! let helper = RedisHelper::new(&RedisConfig::new("redis://localhost:6379"))?;
//! let lock = DistributedLock::new(Arc::new(helper.key_value_store()));
//! if lock.acquire("lock:job1", "worker-A", Duration::from_secs(4)).await? {
//!     // critical section
//!     lock.release("lock:job1", "worker-A").await?;
//! }
//! ```
//!
//! [`KeyValueStore`]: redlease_store::KeyValueStore

pub mod commands;
mod config;
mod helper;
mod key_render;
pub mod reply;
mod scripts;
mod store;

pub use config::RedisConfig;
pub use helper::RedisHelper;
pub use reply::{ScoredValue, decode_members, decode_scored};
pub use store::RedisKeyValueStore;
