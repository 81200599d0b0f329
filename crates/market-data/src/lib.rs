//! Pricewatch Market Data Crate
//!
//! Multi-provider quote aggregation: one API in front of several upstream
//! market data services, with failover, rate limiting, health tracking and
//! a short-lived cache.
//!
//! # Overview
//!
//! - Providers: Yahoo Finance, Financial Modeling Prep, Alpha Vantage, Finnhub
//! - Priority ordering with automatic failover to the next healthy provider
//! - Per-provider quota windows, minimum spacing and 429 backoff
//! - Error-rate based health flags, re-probed on a schedule
//! - TTL cache shared by single and batch lookups
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  QuoteManager    |  (cache, ordering, batch phases)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  ProviderHandle  | --> |   RateLimiter    |  (windows, delay, backoff)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |    Provider      |  (Yahoo, FMP, AlphaVantage, Finnhub)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |     Quote        |  (canonical quote)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`QuoteManager`] - Entry point for quote lookups
//! - [`ProviderHandle`] - Provider adapter plus its runtime state
//! - [`MarketDataProvider`] - Trait implemented by upstream adapters
//! - [`Quote`] - Canonical quote record
//! - [`MarketDataConfig`] - Settings and the provider factory input

pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod recorder;
pub mod registry;

pub use config::{build_providers, MarketDataConfig, ProviderConfig};
pub use errors::{ConfigError, QuoteError, RetryClass};

pub use models::{
    normalize_symbol, BatchQuoteRequest, MarketCap, MarketState, ProviderStatus, Quote,
    QuoteRequest, RateLimitStatus, SearchResult,
};

pub use provider::{
    AlphaVantageProvider, FinnhubProvider, FmpProvider, MarketDataProvider, QuotaWindow,
    RateLimitPolicy, YahooProvider,
};

pub use recorder::{PriceRecorder, RecordError};

pub use registry::{ProviderHandle, QuoteCache, QuoteManager, RateLimiter};
