use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::QuoteError;

/// Trading session a quote was observed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketState {
    /// Pre-market session
    Pre,
    /// Regular trading hours
    Regular,
    /// After-hours session
    Post,
    /// Outside every session
    #[default]
    Closed,
}

/// Market capitalization as the upstream reported it.
///
/// Some providers send a number, others a pre-formatted string ("2.95T").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarketCap {
    Value(f64),
    Formatted(String),
}

impl MarketCap {
    /// Wraps a numeric market cap, dropping non-finite or non-positive values.
    pub fn from_value(value: Option<f64>) -> Option<Self> {
        positive(value).map(Self::Value)
    }

    /// Human-readable form with a T/B/M/K suffix.
    pub fn formatted(&self) -> String {
        match self {
            Self::Formatted(s) => s.clone(),
            Self::Value(v) => {
                const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];
                for (scale, suffix) in UNITS {
                    if *v >= scale {
                        return format!("{:.2}{}", v / scale, suffix);
                    }
                }
                format!("{:.0}", v)
            }
        }
    }
}

impl fmt::Display for MarketCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

/// Canonical quote produced by every provider.
///
/// Built through [`Quote::new`], which rejects a missing or non-positive
/// price, followed by the `with_*` setters, which silently drop invalid
/// optional values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Normalized uppercase ticker
    pub symbol: String,

    /// Display name, falls back to the symbol
    pub name: String,

    /// Last traded price
    pub price: f64,

    /// Absolute change against the previous close
    pub change: f64,

    /// Percentage change against the previous close
    pub change_percent: f64,

    /// Session volume
    pub volume: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<MarketCap>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_high: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_low: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_high: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_low: Option<f64>,

    /// When the upstream last updated the price
    pub last_update: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_market_price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_market_change: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_market_change_percent: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_market_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_market_price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_market_change: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_market_change_percent: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_market_time: Option<DateTime<Utc>>,

    pub market_state: MarketState,

    /// True when a pre- or post-market price is attached
    pub has_extended_data: bool,

    /// Provider that produced the quote (YAHOO, FMP, ...)
    pub source: String,

    /// Synthetic quote, never handed to the price recorder
    #[serde(default)]
    pub simulated: bool,
}

impl Quote {
    /// Start a quote from its required fields.
    ///
    /// Fails closed with [`QuoteError::NotFound`] when the price is missing,
    /// non-finite or not positive.
    pub fn new(symbol: &str, price: Option<f64>, source: &str) -> Result<Self, QuoteError> {
        let symbol = normalize_symbol(symbol);
        let price = positive(price).ok_or_else(|| QuoteError::NotFound(symbol.clone()))?;

        Ok(Self {
            name: symbol.clone(),
            symbol,
            price,
            change: 0.0,
            change_percent: 0.0,
            volume: 0,
            market_cap: None,
            previous_close: None,
            day_high: None,
            day_low: None,
            year_high: None,
            year_low: None,
            last_update: Utc::now(),
            pre_market_price: None,
            pre_market_change: None,
            pre_market_change_percent: None,
            pre_market_time: None,
            post_market_price: None,
            post_market_change: None,
            post_market_change_percent: None,
            post_market_time: None,
            market_state: MarketState::default(),
            has_extended_data: false,
            source: source.to_string(),
            simulated: false,
        })
    }

    pub fn with_name(mut self, name: Option<&str>) -> Self {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            self.name = name.to_string();
        }
        self
    }

    pub fn with_previous_close(mut self, previous_close: Option<f64>) -> Self {
        self.previous_close = positive(previous_close);
        self
    }

    /// Set the change values, deriving missing ones from the previous close.
    ///
    /// Call after [`with_previous_close`](Self::with_previous_close).
    pub fn with_change(mut self, change: Option<f64>, change_percent: Option<f64>) -> Self {
        let derived = self.previous_close.map(|pc| self.price - pc);
        self.change = finite(change).or(derived).unwrap_or(0.0);
        self.change_percent = finite(change_percent)
            .or_else(|| {
                self.previous_close
                    .map(|pc| (self.price - pc) / pc * 100.0)
            })
            .unwrap_or(0.0);
        self
    }

    pub fn with_volume(mut self, volume: Option<f64>) -> Self {
        self.volume = finite(volume).filter(|v| *v >= 0.0).map_or(0, |v| v as u64);
        self
    }

    pub fn with_market_cap(mut self, market_cap: Option<MarketCap>) -> Self {
        self.market_cap = market_cap;
        self
    }

    pub fn with_day_range(mut self, high: Option<f64>, low: Option<f64>) -> Self {
        self.day_high = positive(high);
        self.day_low = positive(low);
        self
    }

    pub fn with_year_range(mut self, high: Option<f64>, low: Option<f64>) -> Self {
        self.year_high = positive(high);
        self.year_low = positive(low);
        self
    }

    pub fn with_last_update(mut self, last_update: Option<DateTime<Utc>>) -> Self {
        if let Some(ts) = last_update {
            self.last_update = ts;
        }
        self
    }

    pub fn with_market_state(mut self, state: MarketState) -> Self {
        self.market_state = state;
        self
    }

    /// Attach a pre-market price. Change is measured against the regular price.
    pub fn with_pre_market(mut self, price: Option<f64>, time: Option<DateTime<Utc>>) -> Self {
        if let Some(p) = positive(price) {
            let change = p - self.price;
            self.pre_market_price = Some(p);
            self.pre_market_change = Some(change);
            self.pre_market_change_percent = Some(change / self.price * 100.0);
            self.pre_market_time = time;
            self.has_extended_data = true;
        }
        self
    }

    /// Attach a post-market price. Change is measured against the regular price.
    pub fn with_post_market(mut self, price: Option<f64>, time: Option<DateTime<Utc>>) -> Self {
        if let Some(p) = positive(price) {
            let change = p - self.price;
            self.post_market_price = Some(p);
            self.post_market_change = Some(change);
            self.post_market_change_percent = Some(change / self.price * 100.0);
            self.post_market_time = time;
            self.has_extended_data = true;
        }
        self
    }

    /// Flag the quote as synthetic.
    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }
}

/// Trim and uppercase a ticker.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Keep a price only if it is finite and strictly positive.
pub(crate) fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

pub(crate) fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
