//! Command recognition for messages addressed to the bot

use crate::slack::Message;

/// Marker introducing a stock symbol
pub const STOCK_PREFIX: &str = "stock:";

/// Parsed command from a message that mentions the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Look up the price of a stock
    Stock { symbol: String },
    /// Anything else; answered with the fallback text
    Unsupported,
}

impl Command {
    /// Parse a command from an inbound message
    ///
    /// Returns `None` unless the message is a chat message starting with
    /// `mention`. The stock marker may appear anywhere in the text; the symbol
    /// is whatever follows its first occurrence, trimmed.
    pub fn parse(message: &Message, mention: &str) -> Option<Self> {
        if !message.is_chat_message() || !message.text.starts_with(mention) {
            return None;
        }

        let command = match message.text.split_once(STOCK_PREFIX) {
            Some((_, rest)) => Command::Stock {
                symbol: rest.trim().to_string(),
            },
            None => Command::Unsupported,
        };

        Some(command)
    }
}
