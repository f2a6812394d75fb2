//! RTM wire messages and outbound id allocation

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Event type carried by chat messages
pub const MESSAGE_TYPE: &str = "message";

/// A chat message as exchanged over the RTM socket
///
/// Inbound events may omit any field; missing or null fields decode to their
/// defaults. `channel` and `text` are strings on chat messages but may carry
/// other shapes on other events, which decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub channel: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub text: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Ok(value),
        _ => Ok(String::new()),
    }
}

impl Message {
    /// Create a chat message for `channel`
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind: MESSAGE_TYPE.to_string(),
            channel: channel.into(),
            text: text.into(),
        }
    }

    /// Reply in the same channel, keeping the event type
    pub fn reply(&self, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind: self.kind.clone(),
            channel: self.channel.clone(),
            text: text.into(),
        }
    }

    pub fn is_chat_message(&self) -> bool {
        self.kind == MESSAGE_TYPE
    }
}

/// Decode one JSON-encoded message
pub fn decode(text: &str) -> Result<Message> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a message as a JSON object
pub fn encode(message: &Message) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Hands out outbound message ids
///
/// Ids start at 1 and increase by one per call for the lifetime of the
/// allocator. Shared between senders through an `Arc`.
#[derive(Debug, Default)]
pub struct MessageIdAllocator {
    last: AtomicU64,
}

impl MessageIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next id
    pub fn next_id(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last id handed out, 0 if none
    pub fn last_id(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}
