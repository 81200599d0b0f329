//! Market data provider module.
//!
//! This module contains the provider trait, rate-limit policy and the
//! upstream adapters:
//! - `traits` - The `MarketDataProvider` trait definition
//! - `policy` - Rate-limit policies (min delay, quota windows, backoff)
//! - `yahoo`, `fmp`, `alpha_vantage`, `finnhub` - Upstream adapters

pub mod alpha_vantage;
pub mod finnhub;
pub mod fmp;
mod http;
mod policy;
mod traits;
pub mod yahoo;

pub use alpha_vantage::{AlphaVantageProvider, ALPHA_VANTAGE_BATCH_FALLBACK_LIMIT};
pub use finnhub::FinnhubProvider;
pub use fmp::{FmpProvider, FMP_BATCH_FALLBACK_LIMIT};
pub use policy::{QuotaWindow, RateLimitPolicy};
pub use traits::{MarketDataProvider, DEFAULT_TIMEOUT};
pub use yahoo::YahooProvider;
