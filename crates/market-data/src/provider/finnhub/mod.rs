//! Finnhub market data provider implementation.
//!
//! This module provides market data from Finnhub API:
//! - Equities via the /quote endpoint
//! - Symbol search via the /search endpoint
//!
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::{ConfigError, QuoteError};
use crate::models::{Quote, SearchResult};
use crate::provider::http;
use crate::provider::{MarketDataProvider, QuotaWindow, RateLimitPolicy};

pub const PROVIDER_ID: &str = "FINNHUB";
pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Change
    d: Option<f64>,
    /// Percent change
    dp: Option<f64>,
    /// High price of the day
    h: Option<f64>,
    /// Low price of the day
    l: Option<f64>,
    /// Previous close
    pc: Option<f64>,
    /// Timestamp (Unix)
    t: Option<i64>,
}

/// Response from /search endpoint
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchItem>,
}

/// Individual search result item
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    /// Full description/name
    description: String,
    /// Display symbol
    display_symbol: String,
    /// Security type (e.g., "Common Stock", "ETF")
    #[serde(rename = "type")]
    security_type: Option<String>,
}

// ============================================================================
// FinnhubProvider
// ============================================================================

/// Finnhub market data provider.
pub struct FinnhubProvider {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl FinnhubProvider {
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

    /// Make a GET request to the Finnhub API.
    async fn fetch(
        &self,
        endpoint: &str,
        subject: &str,
        params: &[(&str, &str)],
    ) -> Result<String, QuoteError> {
        let url = format!("{}{}", self.base_url, endpoint);
        // API key as header rather than query param
        let request = self
            .client
            .get(&url)
            .header("X-Finnhub-Token", &self.api_key)
            .query(params);
        http::send(PROVIDER_ID, subject, request).await
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn default_priority(&self) -> i32 {
        4
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn rate_limit(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(Duration::from_millis(100)).with_window(QuotaWindow::per_minute(60))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn supports_search(&self) -> bool {
        true
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let body = self.fetch("/quote", symbol, &[("symbol", symbol)]).await?;
        let response: QuoteResponse = http::parse(PROVIDER_ID, &body)?;
        map_quote(symbol, response)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, QuoteError> {
        let body = self.fetch("/search", query, &[("q", query)]).await?;
        let response: SearchResponse = http::parse(PROVIDER_ID, &body)?;

        Ok(response
            .result
            .into_iter()
            .map(|item| {
                SearchResult::new(item.display_symbol, item.description)
                    .with_asset_type(item.security_type)
            })
            .collect())
    }
}

/// Finnhub returns zeros for unknown symbols instead of an error, which the
/// positive-price check rejects as not found.
fn map_quote(symbol: &str, response: QuoteResponse) -> Result<Quote, QuoteError> {
    let timestamp = response
        .t
        .filter(|ts| *ts > 0)
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single());

    Ok(Quote::new(symbol, response.c, PROVIDER_ID)?
        .with_previous_close(response.pc)
        .with_change(response.d, response.dp)
        .with_day_range(response.h, response.l)
        .with_last_update(timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_defaults() {
        let provider = FinnhubProvider::new("test_key".to_string()).unwrap();
        assert_eq!(provider.id(), "FINNHUB");
        assert_eq!(provider.default_priority(), 4);
        assert!(provider.has_api_key());

        let limit = provider.rate_limit();
        assert_eq!(limit.windows, vec![QuotaWindow::per_minute(60)]);
        assert_eq!(limit.min_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_map_quote() {
        let body = r#"{"c":150.0,"d":1.5,"dp":1.0101,"h":151.2,"l":148.3,"o":149.0,"pc":148.5,"t":1700000000}"#;
        let response: QuoteResponse = serde_json::from_str(body).unwrap();

        let quote = map_quote("aapl", response).unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.price, 150.0);
        assert_eq!(quote.change, 1.5);
        assert_eq!(quote.previous_close, Some(148.5));
        assert_eq!(quote.day_high, Some(151.2));
        assert_eq!(quote.last_update.timestamp(), 1700000000);
    }

    #[test]
    fn test_zero_price_is_not_found() {
        let body = r#"{"c":0,"d":null,"dp":null,"h":0,"l":0,"o":0,"pc":0,"t":0}"#;
        let response: QuoteResponse = serde_json::from_str(body).unwrap();

        let err = map_quote("ZZZZZ999", response).unwrap_err();
        assert_eq!(err, QuoteError::NotFound("ZZZZZ999".to_string()));
    }

    #[test]
    fn test_search_response_parse() {
        let body = r#"{"count":1,"result":[{"description":"APPLE INC","displaySymbol":"AAPL","symbol":"AAPL","type":"Common Stock"}]}"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.result.len(), 1);
        assert_eq!(response.result[0].display_symbol, "AAPL");
        assert_eq!(response.result[0].security_type.as_deref(), Some("Common Stock"));
    }
}
