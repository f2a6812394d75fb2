//! Configuration for the quote bot

use crate::error::{BotError, Result};
use bot_utils::{optional_env, require_env};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the bot token
pub const SLACK_TOKEN_VAR: &str = "SLACK_TOKEN";
/// Environment variable holding the data provider API key
pub const QUANDL_TOKEN_VAR: &str = "QUANDL_TOKEN";

const SLACK_API_BASE_VAR: &str = "SLACK_API_BASE";
const QUANDL_API_BASE_VAR: &str = "QUANDL_API_BASE";
const MAX_INFLIGHT_VAR: &str = "QUOTE_BOT_MAX_INFLIGHT";
const REQUEST_TIMEOUT_VAR: &str = "QUOTE_BOT_REQUEST_TIMEOUT_SECS";

/// Default Slack Web API base
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
/// Default Quandl API base
pub const DEFAULT_QUANDL_API_BASE: &str = "https://www.quandl.com/api/v3";

/// Configuration for the quote bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot token used for the RTM handshake
    #[serde(skip_serializing, default)]
    pub slack_token: String,

    /// API key sent to the data provider
    #[serde(skip_serializing, default)]
    pub quandl_token: String,

    /// Slack Web API base URL
    pub slack_api_base: String,

    /// Data provider base URL
    pub quandl_api_base: String,

    /// Maximum number of quote fetches running at once
    pub max_inflight_fetches: usize,

    /// Timeout for outbound HTTP calls, none by default
    pub request_timeout: Option<Duration>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            slack_token: String::new(),
            quandl_token: String::new(),
            slack_api_base: DEFAULT_SLACK_API_BASE.to_string(),
            quandl_api_base: DEFAULT_QUANDL_API_BASE.to_string(),
            max_inflight_fetches: 16,
            request_timeout: None,
        }
    }
}

impl BotConfig {
    /// Create a new configuration builder
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder::default()
    }

    /// Load the configuration from the process environment
    ///
    /// Both tokens are required and must be non-empty.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder()
            .slack_token(require_env(SLACK_TOKEN_VAR)?)
            .quandl_token(require_env(QUANDL_TOKEN_VAR)?);

        if let Some(base) = optional_env(SLACK_API_BASE_VAR)? {
            builder = builder.slack_api_base(base);
        }
        if let Some(base) = optional_env(QUANDL_API_BASE_VAR)? {
            builder = builder.quandl_api_base(base);
        }
        if let Some(raw) = optional_env(MAX_INFLIGHT_VAR)? {
            let max = raw.trim().parse::<usize>().map_err(|e| {
                BotError::ConfigError(format!("{MAX_INFLIGHT_VAR} must be a number: {e}"))
            })?;
            builder = builder.max_inflight_fetches(max);
        }
        if let Some(raw) = optional_env(REQUEST_TIMEOUT_VAR)? {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                BotError::ConfigError(format!("{REQUEST_TIMEOUT_VAR} must be a number: {e}"))
            })?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.slack_token.trim().is_empty() {
            return Err(BotError::ConfigError(format!("{SLACK_TOKEN_VAR} is empty")));
        }

        if self.quandl_token.trim().is_empty() {
            return Err(BotError::ConfigError(format!("{QUANDL_TOKEN_VAR} is empty")));
        }

        if self.max_inflight_fetches == 0 {
            return Err(BotError::ConfigError(
                "max_inflight_fetches must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build an HTTP client honoring the configured timeout
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

/// Builder for BotConfig
#[derive(Debug, Default)]
pub struct BotConfigBuilder {
    slack_token: Option<String>,
    quandl_token: Option<String>,
    slack_api_base: Option<String>,
    quandl_api_base: Option<String>,
    max_inflight_fetches: Option<usize>,
    request_timeout: Option<Duration>,
}

impl BotConfigBuilder {
    /// Set the bot token
    pub fn slack_token(mut self, token: impl Into<String>) -> Self {
        self.slack_token = Some(token.into());
        self
    }

    /// Set the data provider API key
    pub fn quandl_token(mut self, token: impl Into<String>) -> Self {
        self.quandl_token = Some(token.into());
        self
    }

    /// Override the Slack Web API base URL
    pub fn slack_api_base(mut self, base: impl Into<String>) -> Self {
        self.slack_api_base = Some(base.into());
        self
    }

    /// Override the data provider base URL
    pub fn quandl_api_base(mut self, base: impl Into<String>) -> Self {
        self.quandl_api_base = Some(base.into());
        self
    }

    /// Set the fetch concurrency bound
    pub fn max_inflight_fetches(mut self, max: usize) -> Self {
        self.max_inflight_fetches = Some(max);
        self
    }

    /// Set the HTTP request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<BotConfig> {
        let defaults = BotConfig::default();

        let config = BotConfig {
            slack_token: self.slack_token.unwrap_or(defaults.slack_token),
            quandl_token: self.quandl_token.unwrap_or(defaults.quandl_token),
            slack_api_base: self.slack_api_base.unwrap_or(defaults.slack_api_base),
            quandl_api_base: self.quandl_api_base.unwrap_or(defaults.quandl_api_base),
            max_inflight_fetches: self
                .max_inflight_fetches
                .unwrap_or(defaults.max_inflight_fetches),
            request_timeout: self.request_timeout.or(defaults.request_timeout),
        };

        config.validate()?;
        Ok(config)
    }
}
