use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tracing::info;

use redlease_lock::{DistributedLock, LockConfig};
use redlease_store_redis::RedisHelper;

#[derive(Args, Debug)]
pub struct LockArgs {
    /// Lock key.
    #[arg(long)]
    pub key: String,

    /// Holder token. A random UUID is used when omitted.
    #[arg(long)]
    pub token: Option<String>,

    /// Lease length in seconds.
    #[arg(long, default_value_t = 30)]
    pub ttl_secs: u64,

    /// How long to hold the lock before releasing it.
    #[arg(long, default_value_t = 10)]
    pub hold_secs: u64,
}

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Lock key.
    #[arg(long)]
    pub key: String,

    /// Holder token the lock was acquired with.
    #[arg(long)]
    pub token: String,
}

fn build_lock(helper: &RedisHelper, config: &LockConfig) -> DistributedLock {
    DistributedLock::with_config(Arc::new(helper.key_value_store()), config.clone())
}

pub async fn run_lock(
    helper: &RedisHelper,
    config: &LockConfig,
    args: &LockArgs,
) -> anyhow::Result<()> {
    let lock = build_lock(helper, config);
    let token = args.token.clone().unwrap_or_else(DistributedLock::new_token);
    let ttl = Duration::from_secs(args.ttl_secs);

    if !lock.acquire(&args.key, &token, ttl).await? {
        eprintln!("Lock {} is held by another holder.", args.key);
        std::process::exit(1);
    }
    println!("Acquired {} as {token}.", args.key);

    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(args.hold_secs)) => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("interrupted, releasing early");
        }
    }

    if !lock.is_renewing(&args.key, &token) {
        eprintln!("Warning: lease on {} was lost while holding it.", args.key);
    }
    lock.release(&args.key, &token).await?;
    println!("Released {}.", args.key);
    Ok(())
}

pub async fn run_release(
    helper: &RedisHelper,
    config: &LockConfig,
    args: &ReleaseArgs,
) -> anyhow::Result<()> {
    let lock = build_lock(helper, config);
    lock.release(&args.key, &args.token).await?;
    println!("Released {} (if held by {}).", args.key, args.token);
    Ok(())
}
