//! Slack real-time messaging client
//!
//! - `handshake`: `rtm.start` token exchange and socket dial
//! - `codec`: wire messages and outbound id allocation
//! - `connection`: single-reader inbox and single-writer outbox

pub mod codec;
pub mod connection;
pub mod handshake;

pub use codec::{MESSAGE_TYPE, Message, MessageIdAllocator};
pub use connection::{Inbox, Outbox, ReplySink, SlackConnection};
pub use handshake::{BotIdentity, RtmStartResponse, connect, start_rtm};
