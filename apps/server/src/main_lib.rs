use std::sync::Arc;

use async_trait::async_trait;
use pricewatch_market_data::{
    MarketDataConfig, PriceRecorder, Quote, QuoteManager, RecordError,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub quote_manager: Arc<QuoteManager>,
    /// Default in-flight cap for batch requests that do not set one.
    pub max_concurrency: usize,
}

impl AppState {
    pub fn new(quote_manager: Arc<QuoteManager>, max_concurrency: usize) -> Self {
        Self {
            quote_manager,
            max_concurrency,
        }
    }
}

/// Records every fetched price to the log. Stands in for a price-history
/// store in deployments without one.
pub struct LoggingRecorder;

#[async_trait]
impl PriceRecorder for LoggingRecorder {
    async fn record_price(&self, quote: &Quote) -> Result<(), RecordError> {
        tracing::info!(
            symbol = %quote.symbol,
            price = quote.price,
            source = %quote.source,
            "Recorded price"
        );
        Ok(())
    }
}

pub fn init_tracing() {
    let log_format = std::env::var("PW_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Build the quote manager from the environment and start its health probe.
pub fn build_state() -> anyhow::Result<Arc<AppState>> {
    let market_config = MarketDataConfig::from_env()?;
    let manager =
        QuoteManager::from_config(&market_config)?.with_recorder(Arc::new(LoggingRecorder));
    manager.init();

    Ok(Arc::new(AppState::new(
        Arc::new(manager),
        market_config.max_concurrency,
    )))
}
