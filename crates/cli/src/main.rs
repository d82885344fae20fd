//! redlease CLI
//!
//! Take and release distributed locks and exercise Redis pub/sub from the
//! command line.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use redlease_store_redis::RedisHelper;

use crate::config::RedleaseConfig;

/// redlease CLI: distributed locks with self-renewing leases on Redis.
#[derive(Parser, Debug)]
#[command(name = "redlease", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "REDLEASE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Redis URL; overrides `[redis] url` from the config file.
    #[arg(long, env = "REDIS_URL", global = true)]
    redis_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire a lock, hold it while renewing the lease, then release it.
    Lock(commands::lock::LockArgs),
    /// Release a lock held by the given token.
    Release(commands::lock::ReleaseArgs),
    /// Publish a message to a channel.
    Publish(commands::pubsub::PublishArgs),
    /// Print messages from one or more channels until interrupted.
    Subscribe(commands::pubsub::SubscribeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = RedleaseConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.redis_url {
        config.redis.url = url;
    }
    info!(url = %config.redis.url, prefix = %config.redis.prefix, "using redis");

    let helper = RedisHelper::new(&config.redis.to_redis_config())?;

    match cli.command {
        Command::Lock(args) => commands::lock::run_lock(&helper, &config.lock, &args).await,
        Command::Release(args) => {
            commands::lock::run_release(&helper, &config.lock, &args).await
        }
        Command::Publish(args) => commands::pubsub::run_publish(&helper, &args).await,
        Command::Subscribe(args) => commands::pubsub::run_subscribe(&helper, &args).await,
    }
}
