//! Quote lookup and reply formatting

use super::supervisor::TaskOutcome;
use crate::api::{DateRange, QuoteLookup, QuoteSeries, QuoteSource};
use crate::error::{BotError, Result};
use crate::slack::{Message, ReplySink};
use std::sync::Arc;
use tracing::{debug, error};

/// Price summary for a series: latest value and the month before
pub fn format_price(series: &QuoteSeries) -> Result<String> {
    match (series.latest(), series.previous()) {
        (Some(latest), Some(previous)) => Ok(format!(
            "Current Price {:.3} Price for last month :{}  was : {:.3}",
            latest.value, previous.date, previous.value
        )),
        _ => Err(BotError::InsufficientData {
            symbol: series.symbol.clone(),
            points: series.points.len(),
        }),
    }
}

pub fn format_missing(symbol: &str) -> String {
    format!("Quote {symbol} does not exist")
}

pub fn format_failure(symbol: &str) -> String {
    format!("Sorry, I could not fetch a quote for {symbol}")
}

/// Answers stock commands with a one-month price summary
pub struct QuoteResponder {
    source: Arc<dyn QuoteSource>,
    sink: Arc<dyn ReplySink>,
}

impl QuoteResponder {
    pub fn new(source: Arc<dyn QuoteSource>, sink: Arc<dyn ReplySink>) -> Self {
        Self { source, sink }
    }

    /// Reply text for `symbol` over `range`
    ///
    /// A non-success status from the provider is an answer, not an error.
    pub async fn quote_text(&self, symbol: &str, range: DateRange) -> Result<String> {
        match self.source.lookup(symbol, range).await? {
            QuoteLookup::Found(series) => format_price(&series),
            QuoteLookup::NotFound { status } => {
                debug!(symbol, status, "Quote not found");
                Ok(format_missing(symbol))
            }
        }
    }

    /// Look up `symbol` for the last month and reply to `message`
    ///
    /// Sends exactly one reply. Lookup failures are logged and answered with
    /// an apology instead of the quote.
    pub async fn respond(&self, message: Message, symbol: String) -> TaskOutcome {
        self.respond_for_range(message, symbol, DateRange::last_month()).await
    }

    pub async fn respond_for_range(
        &self,
        message: Message,
        symbol: String,
        range: DateRange,
    ) -> TaskOutcome {
        let (text, lookup_error) = match self.quote_text(&symbol, range).await {
            Ok(text) => (text, None),
            Err(e) => {
                error!(%symbol, "Quote lookup failed: {}", e);
                (format_failure(&symbol), Some(e.to_string()))
            }
        };

        match self.sink.send(message.reply(text)).await {
            Ok(reply_id) => match lookup_error {
                None => TaskOutcome::Completed { reply_id },
                Some(error) => TaskOutcome::Recovered { reply_id, error },
            },
            Err(e) => TaskOutcome::Failed {
                error: format!("reply for {symbol} not sent: {e}"),
            },
        }
    }
}
