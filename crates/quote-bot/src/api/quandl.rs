//! Quandl dataset API client

use crate::error::{BotError, Result};
use async_trait::async_trait;
use chrono::{Local, Months, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;
use url::Url;

/// Database code queried for every symbol
const DATABASE_CODE: &str = "WIKI";
/// Close price column of the WIKI datasets
const CLOSE_COLUMN_INDEX: &str = "4";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One `[date, value]` sample of a dataset
///
/// The provider encodes samples as two-element arrays rather than objects.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotePoint {
    pub date: String,
    pub value: f64,
}

impl QuotePoint {
    pub fn new(date: impl Into<String>, value: f64) -> Self {
        Self {
            date: date.into(),
            value,
        }
    }
}

impl Serialize for QuotePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.date, self.value).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QuotePoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (date, value) = <(String, f64)>::deserialize(deserializer)?;
        Ok(Self { date, value })
    }
}

/// Dataset metadata and samples as returned by the provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub id: Option<i64>,
    pub dataset_code: Option<String>,
    pub database_code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub refreshed_at: Option<String>,
    pub newest_available_date: Option<String>,
    pub oldest_available_date: Option<String>,
    pub column_names: Vec<String>,
    pub frequency: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub premium: Option<bool>,
    pub limit: Option<i64>,
    pub transform: Option<String>,
    pub column_index: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub data: Vec<QuotePoint>,
    pub collapse: Option<String>,
    pub order: Option<String>,
    pub database_id: Option<i64>,
}

/// Response envelope of the dataset endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetResponse {
    pub dataset: Dataset,
}

/// Price samples for one symbol, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSeries {
    pub symbol: String,
    pub points: Vec<QuotePoint>,
}

impl QuoteSeries {
    /// Most recent sample
    pub fn latest(&self) -> Option<&QuotePoint> {
        self.points.first()
    }

    /// Sample preceding the most recent one
    pub fn previous(&self) -> Option<&QuotePoint> {
        self.points.get(1)
    }
}

/// Outcome of a dataset lookup
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteLookup {
    /// Provider answered 200 or 304
    Found(QuoteSeries),
    /// Provider answered any other status
    NotFound { status: u16 },
}

/// Inclusive calendar date range sent to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// One calendar month ending on `end`
    ///
    /// Days past the end of the previous month clamp to its last day.
    pub fn month_ending(end: NaiveDate) -> Self {
        let start = end.checked_sub_months(Months::new(1)).unwrap_or(end);
        Self { start, end }
    }

    /// One calendar month ending today in local time
    pub fn last_month() -> Self {
        Self::month_ending(Local::now().date_naive())
    }

    pub fn start_param(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

/// Source of price series
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Look up the monthly close series of `symbol` over `range`
    async fn lookup(&self, symbol: &str, range: DateRange) -> Result<QuoteLookup>;
}

/// Quandl API client
#[derive(Debug, Clone)]
pub struct QuandlClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl QuandlClient {
    /// Create a new client against `base_url`
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Dataset URL for `symbol`, without query parameters
    pub fn dataset_url(&self, symbol: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        let file = format!("{symbol}.json");
        url.path_segments_mut()
            .map_err(|()| {
                BotError::ConfigError(format!("{} cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(["datasets", DATABASE_CODE, file.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl QuoteSource for QuandlClient {
    async fn lookup(&self, symbol: &str, range: DateRange) -> Result<QuoteLookup> {
        let url = self.dataset_url(symbol)?;
        let start_date = range.start_param();
        let end_date = range.end_param();

        debug!(symbol, %start_date, %end_date, "Requesting dataset");

        let response = self
            .client
            .get(url)
            .query(&[
                ("column_index", CLOSE_COLUMN_INDEX),
                ("start_date", start_date.as_str()),
                ("end_date", end_date.as_str()),
                ("collapse", "monthly"),
                ("transform", "none"),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::NOT_MODIFIED {
            debug!(symbol, status = status.as_u16(), "Dataset not available");
            return Ok(QuoteLookup::NotFound {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let envelope: DatasetResponse = serde_json::from_slice(&body)?;

        Ok(QuoteLookup::Found(QuoteSeries {
            symbol: symbol.to_string(),
            points: envelope.dataset.data,
        }))
    }
}
