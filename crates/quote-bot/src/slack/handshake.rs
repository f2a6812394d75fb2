//! RTM handshake: token exchange and socket dial

use super::codec::MessageIdAllocator;
use super::connection::SlackConnection;
use crate::config::BotConfig;
use crate::error::{BotError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, info};
use url::Url;

/// Origin presented when dialing the RTM socket
const RTM_ORIGIN: &str = "https://api.slack.com/";

/// Identity of the bot user
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl BotIdentity {
    /// Token that prefixes messages addressed to the bot
    pub fn mention_token(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Body of `rtm.start`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RtmStartResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub url: String,
    #[serde(rename = "self")]
    pub identity: BotIdentity,
}

/// Call `rtm.start` and check the answer
///
/// A response with `ok: false` is rejected with the provider's error code.
pub async fn start_rtm(client: &Client, api_base: &str, token: &str) -> Result<RtmStartResponse> {
    let mut url = Url::parse(api_base)?;
    url.path_segments_mut()
        .map_err(|()| BotError::ConfigError(format!("{api_base} cannot be a base URL")))?
        .pop_if_empty()
        .push("rtm.start");

    let response = client.get(url).query(&[("token", token)]).send().await?;
    let body = response.bytes().await?;
    let start: RtmStartResponse = serde_json::from_slice(&body)?;

    if !start.ok {
        return Err(BotError::HandshakeRejected {
            error: start.error.unwrap_or_else(|| "unknown_error".to_string()),
        });
    }

    if start.url.is_empty() || start.identity.id.is_empty() {
        return Err(BotError::HandshakeRejected {
            error: "missing url or bot identity".to_string(),
        });
    }

    debug!(bot_id = %start.identity.id, "RTM session granted");
    Ok(start)
}

/// Perform the handshake and open the RTM socket
pub async fn connect(
    config: &BotConfig,
) -> Result<(SlackConnection<MaybeTlsStream<TcpStream>>, BotIdentity)> {
    let client = config.http_client()?;
    let start = start_rtm(&client, &config.slack_api_base, &config.slack_token).await?;

    let mut request = start.url.as_str().into_client_request()?;
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static(RTM_ORIGIN));

    let (socket, _) = tokio_tungstenite::connect_async(request).await?;
    info!(bot_id = %start.identity.id, "Connected to RTM");

    let connection = SlackConnection::new(socket, Arc::new(MessageIdAllocator::new()));
    Ok((connection, start.identity))
}
