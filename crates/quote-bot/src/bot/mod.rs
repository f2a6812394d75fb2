//! Bot runtime: command parsing, dispatch and quote replies

pub mod commands;
pub mod dispatcher;
pub mod quote;
pub mod supervisor;

pub use commands::{Command, STOCK_PREFIX};
pub use dispatcher::{Dispatch, Dispatcher, FALLBACK_REPLY};
pub use quote::QuoteResponder;
pub use supervisor::{SupervisorStats, TaskOutcome, TaskSupervisor};

use crate::api::QuandlClient;
use crate::config::BotConfig;
use crate::error::Result;
use crate::slack::{self, ReplySink};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Connect and serve until `shutdown` fires
///
/// Losing the socket ends the run with an error so the process can exit
/// with a failure status.
pub async fn run(config: &BotConfig, shutdown: CancellationToken) -> Result<SupervisorStats> {
    let (connection, identity) = slack::connect(config).await?;
    let slack::SlackConnection {
        mut inbox,
        outbox,
        writer,
    } = connection;

    let quotes = QuandlClient::new(
        config.http_client()?,
        &config.quandl_api_base,
        &config.quandl_token,
    );
    let sink: Arc<dyn ReplySink> = Arc::new(outbox);
    let responder = Arc::new(QuoteResponder::new(Arc::new(quotes), Arc::clone(&sink)));
    let supervisor = TaskSupervisor::new(config.max_inflight_fetches, shutdown.child_token());
    let dispatcher = Dispatcher::new(&identity, sink, responder, supervisor);

    info!(bot_id = %identity.id, "Listening for messages");
    let result = dispatcher.run(&mut inbox, shutdown).await;

    // Every outbox handle is gone once the dispatcher is, which stops the writer
    drop(inbox);
    if let Err(e) = writer.await {
        warn!("Writer task ended abnormally: {}", e);
    }

    result
}
