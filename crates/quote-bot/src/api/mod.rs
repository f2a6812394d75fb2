//! API clients for market data providers

pub mod quandl;

pub use quandl::{
    DateRange, Dataset, DatasetResponse, QuandlClient, QuoteLookup, QuotePoint, QuoteSeries,
    QuoteSource,
};

#[cfg(test)]
pub use quandl::MockQuoteSource;
