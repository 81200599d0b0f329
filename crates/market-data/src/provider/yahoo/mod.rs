//! Yahoo Finance market data provider.
//!
//! Uses the public (keyless) endpoints:
//! - `/v8/finance/chart/{symbol}` for the quote, market state and
//!   extended-hours prices
//! - `/v1/finance/search` for symbol lookup

mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use tracing::debug;

use crate::errors::{ConfigError, QuoteError};
use crate::models::{MarketState, Quote, SearchResult};
use crate::provider::http;
use crate::provider::{MarketDataProvider, QuotaWindow, RateLimitPolicy};

use models::{YahooChartResponse, YahooSearchResponse, YahooTradingPeriods};

pub const PROVIDER_ID: &str = "YAHOO";
pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Yahoo Finance provider. Tried first by default.
pub struct YahooProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl YahooProvider {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_options(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_options(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http::build_client(PROVIDER_ID, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn default_priority(&self) -> i32 {
        1
    }

    fn rate_limit(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(Duration::from_millis(250)).with_window(QuotaWindow::per_hour(2000))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn supports_search(&self) -> bool {
        true
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(symbol)
        );
        let request = self.client.get(&url).query(&[
            ("interval", "1m"),
            ("range", "1d"),
            ("includePrePost", "true"),
        ]);

        let body = http::send(PROVIDER_ID, symbol, request).await?;
        let response: YahooChartResponse = http::parse(PROVIDER_ID, &body)?;
        map_chart(symbol, response, Utc::now())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, QuoteError> {
        let url = format!("{}/v1/finance/search", self.base_url);
        let request = self.client.get(&url).query(&[
            ("q", query),
            ("quotesCount", "10"),
            ("newsCount", "0"),
        ]);

        let body = http::send(PROVIDER_ID, query, request).await?;
        let response: YahooSearchResponse = http::parse(PROVIDER_ID, &body)?;
        Ok(map_search(response))
    }
}

fn timestamp(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|t| Utc.timestamp_opt(t, 0).single())
}

/// Session the instant `now` falls into.
fn market_state(periods: Option<&YahooTradingPeriods>, now: i64) -> MarketState {
    let Some(periods) = periods else {
        return MarketState::Closed;
    };
    if periods.regular.is_some_and(|p| p.contains(now)) {
        MarketState::Regular
    } else if periods.pre.is_some_and(|p| p.contains(now)) {
        MarketState::Pre
    } else if periods.post.is_some_and(|p| p.contains(now)) {
        MarketState::Post
    } else {
        MarketState::Closed
    }
}

/// Map a chart response into a quote.
///
/// Pre- and post-market prices are the last traded bar inside the
/// respective session.
fn map_chart(
    symbol: &str,
    response: YahooChartResponse,
    now: DateTime<Utc>,
) -> Result<Quote, QuoteError> {
    if let Some(error) = response.chart.error {
        debug!(
            "Yahoo chart error for '{}': {:?} {:?}",
            symbol, error.code, error.description
        );
        return Err(QuoteError::NotFound(symbol.to_string()));
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| QuoteError::NotFound(symbol.to_string()))?;
    let meta = result.meta;

    let closes = result
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .map(|bars| bars.close)
        .unwrap_or_default();
    let last_bar_in = |period: Option<models::YahooTradingPeriod>| {
        let period = period?;
        result
            .timestamp
            .iter()
            .zip(closes.iter())
            .filter(|(ts, _)| period.contains(**ts))
            .filter_map(|(ts, close)| close.map(|c| (*ts, c)))
            .last()
    };

    let periods = meta.current_trading_period.as_ref();
    let pre = last_bar_in(periods.and_then(|p| p.pre));
    let post = last_bar_in(periods.and_then(|p| p.post));
    let state = market_state(periods, now.timestamp());

    let name = meta.long_name.as_deref().or(meta.short_name.as_deref());
    let previous_close = meta.previous_close.or(meta.chart_previous_close);

    let quote = Quote::new(symbol, meta.regular_market_price, PROVIDER_ID)?
        .with_name(name)
        .with_previous_close(previous_close)
        .with_change(None, None)
        .with_volume(meta.regular_market_volume)
        .with_day_range(meta.regular_market_day_high, meta.regular_market_day_low)
        .with_year_range(meta.fifty_two_week_high, meta.fifty_two_week_low)
        .with_last_update(timestamp(meta.regular_market_time))
        .with_market_state(state)
        .with_pre_market(pre.map(|(_, p)| p), timestamp(pre.map(|(t, _)| t)))
        .with_post_market(post.map(|(_, p)| p), timestamp(post.map(|(t, _)| t)));

    Ok(quote)
}

fn map_search(response: YahooSearchResponse) -> Vec<SearchResult> {
    response
        .quotes
        .into_iter()
        .filter_map(|q| {
            let symbol = q.symbol?;
            let name = q.longname.or(q.shortname).unwrap_or_else(|| symbol.clone());
            Some(
                SearchResult::new(symbol, name)
                    .with_exchange(q.exch_disp.or(q.exchange))
                    .with_asset_type(q.quote_type),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "symbol": "AAPL",
                    "longName": "Apple Inc.",
                    "regularMarketPrice": 189.5,
                    "regularMarketTime": 1700000000,
                    "previousClose": 188.0,
                    "regularMarketDayHigh": 190.2,
                    "regularMarketDayLow": 187.1,
                    "regularMarketVolume": 51234567,
                    "fiftyTwoWeekHigh": 199.62,
                    "fiftyTwoWeekLow": 164.08,
                    "currentTradingPeriod": {
                        "pre": {"start": 1000, "end": 2000},
                        "regular": {"start": 2000, "end": 3000},
                        "post": {"start": 3000, "end": 4000}
                    }
                },
                "timestamp": [1500, 1600, 2500, 3500, 3600],
                "indicators": {"quote": [{"close": [188.5, 188.9, 189.5, 190.0, null]}]}
            }],
            "error": null
        }
    }"#;

    fn chart() -> YahooChartResponse {
        serde_json::from_str(CHART).unwrap()
    }

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).single().unwrap()
    }

    #[test]
    fn test_provider_defaults() {
        let provider = YahooProvider::new().unwrap();
        assert_eq!(provider.id(), "YAHOO");
        assert_eq!(provider.default_priority(), 1);
        assert!(!provider.requires_api_key());
        assert!(!provider.supports_batch());
        assert_eq!(provider.rate_limit().min_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_map_chart() {
        let quote = map_chart("AAPL", chart(), at(2500)).unwrap();

        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.name, "Apple Inc.");
        assert_eq!(quote.price, 189.5);
        assert_eq!(quote.previous_close, Some(188.0));
        assert!((quote.change - 1.5).abs() < 1e-9);
        assert_eq!(quote.volume, 51_234_567);
        assert_eq!(quote.day_high, Some(190.2));
        assert_eq!(quote.year_low, Some(164.08));
        assert_eq!(quote.last_update, at(1700000000));
        assert_eq!(quote.market_state, MarketState::Regular);
        assert_eq!(quote.source, "YAHOO");
    }

    #[test]
    fn test_extended_hours_from_bars() {
        let quote = map_chart("AAPL", chart(), at(3550)).unwrap();

        assert_eq!(quote.market_state, MarketState::Post);
        assert!(quote.has_extended_data);
        assert_eq!(quote.pre_market_price, Some(188.9));
        assert_eq!(quote.pre_market_time, Some(at(1600)));
        // null close at 3600 is skipped
        assert_eq!(quote.post_market_price, Some(190.0));
        assert_eq!(quote.post_market_time, Some(at(3500)));
    }

    #[test]
    fn test_market_state_closed_outside_sessions() {
        let quote = map_chart("AAPL", chart(), at(5000)).unwrap();
        assert_eq!(quote.market_state, MarketState::Closed);
    }

    #[test]
    fn test_chart_error_is_not_found() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let response: YahooChartResponse = serde_json::from_str(body).unwrap();

        let err = map_chart("ZZZZZ999", response, Utc::now()).unwrap_err();
        assert_eq!(err, QuoteError::NotFound("ZZZZZ999".to_string()));
    }

    #[test]
    fn test_missing_price_is_not_found() {
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"AAPL"}}],"error":null}}"#;
        let response: YahooChartResponse = serde_json::from_str(body).unwrap();

        assert!(matches!(
            map_chart("AAPL", response, Utc::now()),
            Err(QuoteError::NotFound(_))
        ));
    }

    #[test]
    fn test_map_search() {
        let body = r#"{"quotes":[
            {"symbol":"AAPL","shortname":"Apple Inc.","longname":"Apple Inc.","exchange":"NMS","exchDisp":"NASDAQ","quoteType":"EQUITY"},
            {"shortname":"no symbol"},
            {"symbol":"APLE","shortname":"Apple Hospitality REIT","exchange":"NYQ","quoteType":"EQUITY"}
        ]}"#;
        let response: YahooSearchResponse = serde_json::from_str(body).unwrap();

        let results = map_search(response);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].symbol, "AAPL");
        assert_eq!(results[0].exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(results[1].name, "Apple Hospitality REIT");
        assert_eq!(results[1].exchange.as_deref(), Some("NYQ"));
    }
}
