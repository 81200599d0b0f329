//! Alpha Vantage market data provider.
//!
//! Uses the `GLOBAL_QUOTE` and `SYMBOL_SEARCH` functions of the
//! `/query` endpoint.
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute and
//! 500 per day. Quota exhaustion is reported in the body of a 200 response
//! (`Note` or `Information`), not via HTTP 429.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{ConfigError, QuoteError};
use crate::models::{Quote, SearchResult};
use crate::provider::http;
use crate::provider::{MarketDataProvider, QuotaWindow, RateLimitPolicy};

pub const PROVIDER_ID: &str = "ALPHA_VANTAGE";
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Symbols fetched one by one in a multi-symbol request.
pub const ALPHA_VANTAGE_BATCH_FALLBACK_LIMIT: usize = 3;

// Response structures for Alpha Vantage API

/// Fields every Alpha Vantage payload may carry instead of data.
#[derive(Debug, Default, Deserialize)]
struct ApiNotice {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(flatten)]
    notice: ApiNotice,
}

/// All values arrive as strings
#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    /// e.g. "1.2345%"
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SymbolSearchResponse {
    #[serde(rename = "bestMatches")]
    best_matches: Option<Vec<SearchMatch>>,
    #[serde(flatten)]
    notice: ApiNotice,
}

#[derive(Debug, Deserialize)]
struct SearchMatch {
    #[serde(rename = "1. symbol")]
    symbol: String,
    #[serde(rename = "2. name")]
    name: Option<String>,
    #[serde(rename = "3. type")]
    asset_type: Option<String>,
    #[serde(rename = "4. region")]
    region: Option<String>,
}

/// Alpha Vantage provider.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl AlphaVantageProvider {
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
            base_url: base_url.to_string(),
            timeout,
        })
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, subject: &str, params: &[(&str, &str)]) -> Result<String, QuoteError> {
        debug!(
            "Alpha Vantage request: {:?}",
            params.iter().map(|(k, _)| *k).collect::<Vec<_>>()
        );
        let request = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())]);
        http::send(PROVIDER_ID, subject, request).await
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn default_priority(&self) -> i32 {
        3
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn rate_limit(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(Duration::from_secs(1))
            .with_window(QuotaWindow::per_minute(5))
            .with_window(QuotaWindow::per_day(500))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn supports_search(&self) -> bool {
        true
    }

    fn batch_fallback_limit(&self) -> Option<usize> {
        Some(ALPHA_VANTAGE_BATCH_FALLBACK_LIMIT)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let body = self
            .fetch(symbol, &[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        let response: GlobalQuoteResponse = http::parse(PROVIDER_ID, &body)?;
        map_global_quote(symbol, response)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, QuoteError> {
        let body = self
            .fetch(query, &[("function", "SYMBOL_SEARCH"), ("keywords", query)])
            .await?;
        let response: SymbolSearchResponse = http::parse(PROVIDER_ID, &body)?;
        check_notice(query, &response.notice)?;

        Ok(response
            .best_matches
            .unwrap_or_default()
            .into_iter()
            .map(|m| {
                let name = m.name.unwrap_or_else(|| m.symbol.clone());
                SearchResult::new(m.symbol, name)
                    .with_exchange(m.region)
                    .with_asset_type(m.asset_type)
            })
            .collect())
    }
}

/// Turn an in-body notice into an error.
fn check_notice(subject: &str, notice: &ApiNotice) -> Result<(), QuoteError> {
    if let Some(ref msg) = notice.error_message {
        if msg.contains("Invalid API call") {
            return Err(QuoteError::NotFound(subject.to_string()));
        }
        return Err(QuoteError::upstream(PROVIDER_ID, msg.clone()));
    }

    // "Note" is only ever sent for call frequency
    if notice.note.is_some() {
        return Err(QuoteError::RateLimited {
            provider: PROVIDER_ID.to_string(),
        });
    }

    if let Some(ref msg) = notice.information {
        let lower = msg.to_lowercase();
        if lower.contains("rate limit")
            || lower.contains("call frequency")
            || lower.contains("requests per day")
        {
            return Err(QuoteError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        warn!("Alpha Vantage info: {}", msg);
        return Err(QuoteError::upstream(PROVIDER_ID, msg.clone()));
    }

    Ok(())
}

fn parse_number(value: &Option<String>) -> Option<f64> {
    value
        .as_deref()
        .map(|v| v.trim().trim_end_matches('%'))
        .and_then(|v| v.parse::<f64>().ok())
}

/// Parse a date string in YYYY-MM-DD format to DateTime<Utc>.
fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|dt| Utc.from_local_datetime(&dt).single())
}

fn map_global_quote(symbol: &str, response: GlobalQuoteResponse) -> Result<Quote, QuoteError> {
    check_notice(symbol, &response.notice)?;

    // Unknown symbols come back as an empty "Global Quote" object
    let q = response
        .global_quote
        .ok_or_else(|| QuoteError::NotFound(symbol.to_string()))?;
    let quote_symbol = q.symbol.as_deref().unwrap_or(symbol);

    Ok(Quote::new(quote_symbol, parse_number(&q.price), PROVIDER_ID)?
        .with_previous_close(parse_number(&q.previous_close))
        .with_change(parse_number(&q.change), parse_number(&q.change_percent))
        .with_volume(parse_number(&q.volume))
        .with_day_range(parse_number(&q.high), parse_number(&q.low))
        .with_last_update(q.latest_trading_day.as_deref().and_then(parse_date)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_quote(body: &str) -> GlobalQuoteResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_provider_defaults() {
        let provider = AlphaVantageProvider::new("test_key".to_string()).unwrap();
        assert_eq!(provider.id(), "ALPHA_VANTAGE");
        assert_eq!(provider.default_priority(), 3);
        assert!(!provider.supports_batch());
        assert_eq!(provider.batch_fallback_limit(), Some(3));

        let limit = provider.rate_limit();
        assert_eq!(
            limit.windows,
            vec![QuotaWindow::per_minute(5), QuotaWindow::per_day(500)]
        );
    }

    #[test]
    fn test_map_global_quote() {
        let body = r#"{"Global Quote": {
            "01. symbol": "IBM", "02. open": "160.0000", "03. high": "162.5000",
            "04. low": "159.1000", "05. price": "161.2000", "06. volume": "3456789",
            "07. latest trading day": "2024-01-05", "08. previous close": "160.0000",
            "09. change": "1.2000", "10. change percent": "0.7500%"
        }}"#;

        let quote = map_global_quote("IBM", parse_quote(body)).unwrap();
        assert_eq!(quote.symbol, "IBM");
        assert_eq!(quote.price, 161.2);
        assert_eq!(quote.change, 1.2);
        assert_eq!(quote.change_percent, 0.75);
        assert_eq!(quote.volume, 3_456_789);
        assert_eq!(quote.day_low, Some(159.1));
        assert_eq!(quote.last_update.date_naive().to_string(), "2024-01-05");
    }

    #[test]
    fn test_empty_global_quote_is_not_found() {
        let err = map_global_quote("ZZZZZ999", parse_quote(r#"{"Global Quote": {}}"#)).unwrap_err();
        assert_eq!(err, QuoteError::NotFound("ZZZZZ999".to_string()));
    }

    #[test]
    fn test_note_is_rate_limited() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        assert!(matches!(
            map_global_quote("IBM", parse_quote(body)),
            Err(QuoteError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_information_rate_limit() {
        let body = r#"{"Information": "We have detected your API key and our standard API rate limit is 25 requests per day."}"#;
        assert!(matches!(
            map_global_quote("IBM", parse_quote(body)),
            Err(QuoteError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        assert!(matches!(
            map_global_quote("BAD", parse_quote(body)),
            Err(QuoteError::NotFound(_))
        ));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(&Some("1.5%".to_string())), Some(1.5));
        assert_eq!(parse_number(&Some("abc".to_string())), None);
        assert_eq!(parse_number(&None), None);
    }

    #[test]
    fn test_symbol_search_parse() {
        let body = r#"{"bestMatches": [
            {"1. symbol": "TSCO.LON", "2. name": "Tesco PLC", "3. type": "Equity", "4. region": "United Kingdom", "8. currency": "GBX", "9. matchScore": "0.7273"}
        ]}"#;
        let response: SymbolSearchResponse = serde_json::from_str(body).unwrap();
        let matches = response.best_matches.unwrap();
        assert_eq!(matches[0].symbol, "TSCO.LON");
        assert_eq!(matches[0].region.as_deref(), Some("United Kingdom"));
    }
}
