//! Error types for the quote bot

use thiserror::Error;

/// Quote bot specific errors
#[derive(Debug, Error)]
pub enum BotError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The RTM handshake was answered with `ok: false`
    #[error("Handshake rejected: {error}")]
    HandshakeRejected {
        error: String,
    },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid URL built from configuration
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    /// The provider returned fewer samples than a reply needs
    #[error("Not enough data for {symbol}: got {points} point(s)")]
    InsufficientData {
        symbol: String,
        points: usize,
    },

    /// The connection writer has gone away
    #[error("Connection closed")]
    ConnectionClosed,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, BotError>;

impl From<bot_utils::EnvError> for BotError {
    fn from(err: bot_utils::EnvError) -> Self {
        BotError::ConfigError(err.to_string())
    }
}
