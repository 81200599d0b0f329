//! Search result models for symbol lookup.

use serde::{Deserialize, Serialize};

/// Result from a ticker/symbol search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Symbol/ticker (e.g., "AAPL", "SHOP.TO")
    pub symbol: String,

    /// Display name (e.g., "Apple Inc")
    pub name: String,

    /// Exchange as reported upstream (e.g., "NASDAQ", "NMS")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    /// Asset type (e.g., "EQUITY", "ETF")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
}

impl SearchResult {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            exchange: None,
            asset_type: None,
        }
    }

    pub fn with_exchange(mut self, exchange: Option<String>) -> Self {
        self.exchange = exchange.filter(|e| !e.is_empty());
        self
    }

    pub fn with_asset_type(mut self, asset_type: Option<String>) -> Self {
        self.asset_type = asset_type.filter(|t| !t.is_empty());
        self
    }
}
