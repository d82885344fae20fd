use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use redlease_store_redis::RedisHelper;

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Channel name.
    #[arg(long)]
    pub channel: String,

    /// Message body.
    pub message: String,
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    /// Channels to listen on.
    #[arg(required = true)]
    pub channels: Vec<String>,
}

pub async fn run_publish(helper: &RedisHelper, args: &PublishArgs) -> anyhow::Result<()> {
    let receivers = helper.publish(&args.channel, &args.message).await?;
    println!("Delivered to {receivers} subscriber(s).");
    Ok(())
}

pub async fn run_subscribe(helper: &RedisHelper, args: &SubscribeArgs) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("interrupted, unsubscribing");
        on_interrupt.cancel();
    });

    helper
        .subscribe(&args.channels, &cancel, |channel, message| {
            println!("{channel}: {message}");
        })
        .await?;
    Ok(())
}
