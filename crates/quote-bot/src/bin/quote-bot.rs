//! Slack quote bot
//!
//! # Usage
//!
//! ```bash
//! export SLACK_TOKEN="xoxb-..."
//! export QUANDL_TOKEN="..."
//!
//! cargo run --bin quote-bot -p quote-bot
//! ```

use anyhow::Context;
use quote_bot::{BotConfig, bot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    bot_utils::init_tracing();

    let config = BotConfig::from_env().context("Invalid configuration")?;

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C");
                on_signal.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let stats = bot::run(&config, shutdown)
        .await
        .context("Quote bot stopped")?;

    info!(
        spawned = stats.spawned,
        completed = stats.completed,
        recovered = stats.recovered,
        failed = stats.failed,
        cancelled = stats.cancelled,
        panicked = stats.panicked,
        "Quote bot finished"
    );

    Ok(())
}
