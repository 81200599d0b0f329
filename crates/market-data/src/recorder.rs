//! Persistence hand-off for freshly fetched quotes.
//!
//! The manager does not store prices itself. Each quote fetched from an
//! upstream (not served from cache, not simulated) is passed to the
//! configured [`PriceRecorder`] on a detached task.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Quote;

/// Failure reported by a price recorder. Logged, never propagated.
#[derive(Error, Debug)]
#[error("Failed to record price for {symbol}: {message}")]
pub struct RecordError {
    pub symbol: String,
    pub message: String,
}

/// Sink for fetched prices, e.g. a price-history table.
#[async_trait]
pub trait PriceRecorder: Send + Sync {
    async fn record_price(&self, quote: &Quote) -> Result<(), RecordError>;
}
