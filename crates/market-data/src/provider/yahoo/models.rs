//! Yahoo Finance API response models.
//!
//! The v8 chart endpoint carries everything the canonical quote needs in
//! its `meta` block, plus intraday bars that cover the extended sessions
//! when requested with `includePrePost=true`.

use serde::Deserialize;

/// Top-level wrapper of the v8 chart API
#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Deserialize)]
pub struct YahooChart {
    pub result: Option<Vec<YahooChartResult>>,
    pub error: Option<YahooChartError>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartError {
    pub code: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    pub meta: YahooChartMeta,
    /// Bar timestamps (Unix seconds)
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Option<YahooIndicators>,
}

/// Quote fields of the chart `meta` block
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooChartMeta {
    pub symbol: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_time: Option<i64>,
    pub previous_close: Option<f64>,
    pub chart_previous_close: Option<f64>,
    pub regular_market_day_high: Option<f64>,
    pub regular_market_day_low: Option<f64>,
    pub regular_market_volume: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub current_trading_period: Option<YahooTradingPeriods>,
}

#[derive(Debug, Deserialize)]
pub struct YahooTradingPeriods {
    pub pre: Option<YahooTradingPeriod>,
    pub regular: Option<YahooTradingPeriod>,
    pub post: Option<YahooTradingPeriod>,
}

/// Session bounds (Unix seconds, end exclusive)
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct YahooTradingPeriod {
    pub start: i64,
    pub end: i64,
}

impl YahooTradingPeriod {
    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts < self.end
    }
}

#[derive(Debug, Deserialize)]
pub struct YahooIndicators {
    #[serde(default)]
    pub quote: Vec<YahooBars>,
}

/// Bar series; entries are null where no trade happened
#[derive(Debug, Deserialize)]
pub struct YahooBars {
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

/// Response of the v1 search API
#[derive(Debug, Deserialize)]
pub struct YahooSearchResponse {
    #[serde(default)]
    pub quotes: Vec<YahooSearchQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooSearchQuote {
    pub symbol: Option<String>,
    pub shortname: Option<String>,
    pub longname: Option<String>,
    pub exch_disp: Option<String>,
    pub exchange: Option<String>,
    pub quote_type: Option<String>,
}
