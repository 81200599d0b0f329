//! Market data provider trait definitions.
//!
//! This module defines the `MarketDataProvider` trait that every upstream
//! adapter implements. Adapters make exactly one upstream call per method
//! and report failures as [`QuoteError`]; rate limiting, timeouts, counters
//! and health tracking are layered on top by [`ProviderHandle`].
//!
//! [`ProviderHandle`]: super::ProviderHandle

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::QuoteError;
use crate::models::{Quote, SearchResult};

use super::policy::RateLimitPolicy;

/// Default upstream timeout when an adapter does not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Trait for market data providers.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use pricewatch_market_data::provider::{MarketDataProvider, RateLimitPolicy};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn rate_limit(&self) -> RateLimitPolicy {
///         RateLimitPolicy::default()
///     }
///
///     async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
///         // one upstream call, mapped into a Quote
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier, e.g. "YAHOO" or "ALPHA_VANTAGE".
    fn id(&self) -> &'static str;

    /// Priority used when no explicit one is configured.
    ///
    /// Lower values are tried first.
    fn default_priority(&self) -> i32 {
        10
    }

    /// Whether the upstream needs an API key.
    fn requires_api_key(&self) -> bool {
        false
    }

    /// Whether an API key is configured.
    fn has_api_key(&self) -> bool {
        false
    }

    /// Rate limits applied when calling this provider.
    fn rate_limit(&self) -> RateLimitPolicy;

    /// Upper bound on a single upstream call.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Whether [`fetch_batch`](Self::fetch_batch) issues one multi-symbol call.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Whether [`search`](Self::search) is implemented.
    fn supports_search(&self) -> bool {
        false
    }

    /// Cap on symbols fetched one by one when batching is unavailable.
    ///
    /// `None` means every symbol is attempted.
    fn batch_fallback_limit(&self) -> Option<usize> {
        None
    }

    /// Fetch and normalize the latest quote for one symbol.
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError>;

    /// Fetch several symbols in one upstream call.
    ///
    /// Symbols missing upstream are simply absent from the map.
    /// Default implementation returns `NotSupported`.
    async fn fetch_batch(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, QuoteError> {
        let _ = symbols;
        Err(QuoteError::NotSupported {
            operation: "batch".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Search for symbols matching the query.
    ///
    /// Default implementation returns `NotSupported`.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, QuoteError> {
        let _ = query;
        Err(QuoteError::NotSupported {
            operation: "search".to_string(),
            provider: self.id().to_string(),
        })
    }
}
