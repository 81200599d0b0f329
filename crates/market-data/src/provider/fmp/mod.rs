//! Financial Modeling Prep market data provider.
//!
//! - `/api/v3/quote/{symbols}` accepts a comma separated symbol list, so
//!   batches cost one request
//! - `/api/v3/search` for symbol lookup
//!
//! The free tier allows 250 requests per day.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::errors::{ConfigError, QuoteError};
use crate::models::{normalize_symbol, MarketCap, Quote, SearchResult};
use crate::provider::http;
use crate::provider::{MarketDataProvider, QuotaWindow, RateLimitPolicy};

pub const PROVIDER_ID: &str = "FMP";
pub const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Symbols fetched one by one when the batch endpoint fails.
pub const FMP_BATCH_FALLBACK_LIMIT: usize = 5;

// ============================================================================
// API Response Structures
// ============================================================================

/// Element of the /quote response array
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpQuote {
    symbol: String,
    name: Option<String>,
    price: Option<f64>,
    change: Option<f64>,
    /// Percent change, despite the name
    changes_percentage: Option<f64>,
    volume: Option<f64>,
    market_cap: Option<f64>,
    previous_close: Option<f64>,
    day_high: Option<f64>,
    day_low: Option<f64>,
    year_high: Option<f64>,
    year_low: Option<f64>,
    /// Unix seconds
    timestamp: Option<i64>,
}

/// FMP answers errors with an object where data would be an array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FmpResponse<T> {
    Data(Vec<T>),
    Error {
        #[serde(rename = "Error Message")]
        error_message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpSearchItem {
    symbol: String,
    name: Option<String>,
    exchange_short_name: Option<String>,
    stock_exchange: Option<String>,
}

// ============================================================================
// FmpProvider
// ============================================================================

/// Financial Modeling Prep provider.
pub struct FmpProvider {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl FmpProvider {
    pub fn new(api_key: String) -> Result<Self, ConfigError> {
        Self::with_options(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_options(
        api_key: String,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http::build_client(PROVIDER_ID, timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<FmpQuote>, QuoteError> {
        let joined = symbols
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/quote/{}", self.base_url, joined);
        let request = self
            .client
            .get(&url)
            .query(&[("apikey", self.api_key.as_str())]);

        let body = http::send(PROVIDER_ID, &joined, request).await?;
        into_data(http::parse(PROVIDER_ID, &body)?)
    }
}

#[async_trait]
impl MarketDataProvider for FmpProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn default_priority(&self) -> i32 {
        2
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn rate_limit(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(Duration::from_millis(200)).with_window(QuotaWindow::per_day(250))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn supports_search(&self) -> bool {
        true
    }

    fn batch_fallback_limit(&self) -> Option<usize> {
        Some(FMP_BATCH_FALLBACK_LIMIT)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let quotes = self.fetch_quotes(&[symbol.to_string()]).await?;
        let item = quotes
            .into_iter()
            .next()
            .ok_or_else(|| QuoteError::NotFound(symbol.to_string()))?;
        map_quote(item)
    }

    async fn fetch_batch(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, QuoteError> {
        let quotes = self.fetch_quotes(symbols).await?;
        Ok(map_batch(quotes))
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, QuoteError> {
        let url = format!("{}/search", self.base_url);
        let request = self.client.get(&url).query(&[
            ("query", query),
            ("limit", "10"),
            ("apikey", self.api_key.as_str()),
        ]);

        let body = http::send(PROVIDER_ID, query, request).await?;
        let items: Vec<FmpSearchItem> = into_data(http::parse(PROVIDER_ID, &body)?)?;
        Ok(items
            .into_iter()
            .map(|item| {
                let name = item.name.unwrap_or_else(|| item.symbol.clone());
                SearchResult::new(item.symbol, name)
                    .with_exchange(item.exchange_short_name.or(item.stock_exchange))
            })
            .collect())
    }
}

fn into_data<T>(response: FmpResponse<T>) -> Result<Vec<T>, QuoteError> {
    match response {
        FmpResponse::Data(items) => Ok(items),
        FmpResponse::Error { error_message } => {
            if error_message.contains("Limit Reach") {
                Err(QuoteError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                })
            } else {
                Err(QuoteError::upstream(PROVIDER_ID, error_message))
            }
        }
    }
}

fn map_quote(item: FmpQuote) -> Result<Quote, QuoteError> {
    let last_update: Option<DateTime<Utc>> =
        item.timestamp.and_then(|ts| Utc.timestamp_opt(ts, 0).single());

    Ok(Quote::new(&item.symbol, item.price, PROVIDER_ID)?
        .with_name(item.name.as_deref())
        .with_previous_close(item.previous_close)
        .with_change(item.change, item.changes_percentage)
        .with_volume(item.volume)
        .with_market_cap(MarketCap::from_value(item.market_cap))
        .with_day_range(item.day_high, item.day_low)
        .with_year_range(item.year_high, item.year_low)
        .with_last_update(last_update))
}

/// Map every usable element; invalid ones are dropped, not fatal.
fn map_batch(items: Vec<FmpQuote>) -> HashMap<String, Quote> {
    items
        .into_iter()
        .filter_map(|item| {
            let symbol = normalize_symbol(&item.symbol);
            match map_quote(item) {
                Ok(quote) => Some((symbol, quote)),
                Err(e) => {
                    warn!("Dropping FMP quote for '{}': {}", symbol, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTES: &str = r#"[
        {"symbol":"AAPL","name":"Apple Inc.","price":150.0,"changesPercentage":1.2,"change":1.78,
         "dayLow":147.5,"dayHigh":151.0,"yearHigh":199.62,"yearLow":124.17,"marketCap":2950000000000,
         "volume":51234567,"previousClose":148.22,"timestamp":1700000000},
        {"symbol":"BROKEN","name":"No price","price":null}
    ]"#;

    #[test]
    fn test_provider_defaults() {
        let provider = FmpProvider::new("key".to_string()).unwrap();
        assert_eq!(provider.id(), "FMP");
        assert_eq!(provider.default_priority(), 2);
        assert!(provider.requires_api_key());
        assert!(provider.has_api_key());
        assert!(provider.supports_batch());
        assert_eq!(provider.batch_fallback_limit(), Some(5));
        assert_eq!(provider.rate_limit().windows, vec![QuotaWindow::per_day(250)]);
    }

    #[test]
    fn test_map_batch_drops_invalid_entries() {
        let response: FmpResponse<FmpQuote> = serde_json::from_str(QUOTES).unwrap();
        let quotes = map_batch(into_data(response).unwrap());

        assert_eq!(quotes.len(), 1);
        let aapl = &quotes["AAPL"];
        assert_eq!(aapl.price, 150.0);
        assert_eq!(aapl.change, 1.78);
        assert_eq!(aapl.change_percent, 1.2);
        assert_eq!(aapl.market_cap, Some(MarketCap::Value(2.95e12)));
        assert_eq!(aapl.year_high, Some(199.62));
        assert_eq!(aapl.source, "FMP");
    }

    #[test]
    fn test_error_object() {
        let body = r#"{"Error Message":"Invalid API KEY. Please retry or visit our documentation."}"#;
        let response: FmpResponse<FmpQuote> = serde_json::from_str(body).unwrap();
        assert!(matches!(
            into_data(response),
            Err(QuoteError::UpstreamError { .. })
        ));

        let body = r#"{"Error Message":"Limit Reach . Please upgrade your plan."}"#;
        let response: FmpResponse<FmpQuote> = serde_json::from_str(body).unwrap();
        assert!(matches!(
            into_data(response),
            Err(QuoteError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_search_item_parse() {
        let body = r#"[{"symbol":"AAPL","name":"Apple Inc.","currency":"USD","stockExchange":"NASDAQ Global Select","exchangeShortName":"NASDAQ"}]"#;
        let response: FmpResponse<FmpSearchItem> = serde_json::from_str(body).unwrap();
        let items = into_data(response).unwrap();
        assert_eq!(items[0].exchange_short_name.as_deref(), Some("NASDAQ"));
    }
}
