//! Market data models
//!
//! - `quote` - canonical quote (Quote, MarketState, MarketCap)
//! - `request` - manager requests (QuoteRequest, BatchQuoteRequest)
//! - `search` - symbol search results (SearchResult)
//! - `status` - provider status views (ProviderStatus, RateLimitStatus)

mod quote;
mod request;
mod search;
mod status;

pub(crate) use quote::{finite, positive};
pub use quote::{normalize_symbol, MarketCap, MarketState, Quote};
pub use request::{BatchQuoteRequest, QuoteRequest, DEFAULT_MAX_CONCURRENCY};
pub use search::SearchResult;
pub use status::{ProviderStatus, RateLimitStatus};
