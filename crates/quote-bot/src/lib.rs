//! Slack quote bot
//!
//! Listens on a Slack real-time messaging socket and answers messages of the
//! form `<@bot> stock: SYMBOL` with the latest monthly close and the one
//! before it, as reported by the Quandl dataset API.
//!
//! # Architecture
//!
//! - `slack`: `rtm.start` handshake, wire codec, single-reader inbox and
//!   single-writer outbox with monotonically increasing message ids
//! - `api`: Quandl dataset client behind the `QuoteSource` trait
//! - `bot`: command parsing, the receive loop, and a supervisor that bounds
//!   and cancels background quote lookups
//!
//! # Example
//!
//! ```rust,ignore
//! use quote_bot::{BotConfig, bot};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BotConfig::from_env()?;
//!     let stats = bot::run(&config, CancellationToken::new()).await?;
//!     println!("{stats:?}");
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bot;
pub mod config;
pub mod error;
pub mod slack;

// Re-export main types for convenience
pub use api::{QuandlClient, QuoteSource};
pub use bot::{Dispatcher, QuoteResponder, TaskSupervisor};
pub use config::BotConfig;
pub use error::{BotError, Result};
pub use slack::{BotIdentity, Message, MessageIdAllocator};
