//! Provider handle: a configured adapter plus its runtime state.
//!
//! The handle turns a raw [`MarketDataProvider`] into the contract the
//! manager relies on:
//! - every upstream call goes through the provider's [`RateLimiter`]
//! - every upstream call is bounded by the provider's timeout
//! - request and error counters are updated synchronously on the call path
//! - failures are logged and surface as `None` / empty results

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::errors::{QuoteError, RetryClass};
use crate::models::{normalize_symbol, ProviderStatus, Quote, SearchResult};
use crate::provider::MarketDataProvider;

use super::health::ProviderHealth;
use super::rate_limiter::RateLimiter;

/// Symbol probed by [`ProviderHandle::health_check`].
pub const DEFAULT_SENTINEL_SYMBOL: &str = "AAPL";

/// How a guarded upstream call ended.
enum CallOutcome<T> {
    Success(T),
    Failed,
    /// A local quota refused the call; nothing was sent upstream.
    Throttled,
}

impl<T> CallOutcome<T> {
    fn ok(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failed | Self::Throttled => None,
        }
    }
}

/// A provider as seen by the manager.
pub struct ProviderHandle {
    adapter: Arc<dyn MarketDataProvider>,
    priority: AtomicI32,
    timeout: Duration,
    batch_fallback_limit: Option<usize>,
    sentinel_symbol: String,
    limiter: RateLimiter,
    health: Mutex<ProviderHealth>,
}

impl ProviderHandle {
    /// Wrap an adapter with its default priority, policy and timeout.
    pub fn new(adapter: Arc<dyn MarketDataProvider>) -> Self {
        let limiter = RateLimiter::new(adapter.id(), adapter.rate_limit());
        Self {
            priority: AtomicI32::new(adapter.default_priority()),
            timeout: adapter.timeout(),
            batch_fallback_limit: adapter.batch_fallback_limit(),
            sentinel_symbol: DEFAULT_SENTINEL_SYMBOL.to_string(),
            limiter,
            health: Mutex::new(ProviderHealth::default()),
            adapter,
        }
    }

    pub fn with_priority(self, priority: i32) -> Self {
        self.priority.store(priority, Ordering::SeqCst);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the cap on sequential fallback fetches. `None` lifts it.
    pub fn with_batch_fallback_limit(mut self, limit: Option<usize>) -> Self {
        self.batch_fallback_limit = limit;
        self
    }

    pub fn with_sentinel_symbol(mut self, symbol: &str) -> Self {
        self.sentinel_symbol = normalize_symbol(symbol);
        self
    }

    pub fn name(&self) -> &'static str {
        self.adapter.id()
    }

    pub fn priority(&self) -> i32 {
        self.priority.load(Ordering::SeqCst)
    }

    pub fn set_priority(&self, priority: i32) {
        self.priority.store(priority, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.lock_health().is_healthy
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    fn lock_health(&self) -> MutexGuard<'_, ProviderHealth> {
        self.health.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Health mutex for provider '{}' was poisoned, recovering",
                self.name()
            );
            poisoned.into_inner()
        })
    }

    /// Run one upstream call under the limiter and timeout, updating counters.
    async fn guarded<T, F, Fut>(&self, operation: &str, call: F) -> CallOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, QuoteError>>,
    {
        if let Err(throttled) = self.limiter.acquire().await {
            warn!(
                "Provider '{}' quota exhausted, {} not sent (retry in {:?})",
                self.name(),
                operation,
                throttled.retry_after
            );
            return CallOutcome::Throttled;
        }

        self.lock_health().record_request();

        let result = match tokio::time::timeout(self.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(QuoteError::Timeout {
                provider: self.name().to_string(),
            }),
        };

        match result {
            Ok(value) => {
                self.limiter.record_success();
                self.lock_health().record_success(Utc::now());
                CallOutcome::Success(value)
            }
            Err(err) => {
                self.record_failure(operation, &err);
                CallOutcome::Failed
            }
        }
    }

    fn record_failure(&self, operation: &str, err: &QuoteError) {
        let retry_class = err.retry_class();
        if retry_class == RetryClass::Backoff {
            self.limiter.penalize();
        }

        if retry_class == RetryClass::Never {
            debug!("Provider '{}' {} failed: {}", self.name(), operation, err);
        } else {
            warn!("Provider '{}' {} failed: {}", self.name(), operation, err);
        }

        let flipped = self.lock_health().record_failure(Utc::now(), err.to_string());
        if flipped {
            warn!(
                "Provider '{}' marked unhealthy after repeated failures",
                self.name()
            );
        }
    }

    /// Fetch one quote. Every failure is absorbed into `None`.
    pub async fn fetch_quote(&self, symbol: &str) -> Option<Quote> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return None;
        }
        self.guarded("quote", || self.adapter.fetch_quote(&symbol))
            .await
            .ok()
    }

    pub async fn validate_symbol(&self, symbol: &str) -> bool {
        self.fetch_quote(symbol).await.is_some()
    }

    /// Best-effort symbol search; empty on failure or when unsupported.
    pub async fn search_symbols(&self, query: &str) -> Vec<SearchResult> {
        let query = query.trim();
        if query.is_empty() || !self.adapter.supports_search() {
            return Vec::new();
        }
        self.guarded("search", || self.adapter.search(query))
            .await
            .ok()
            .unwrap_or_default()
    }

    /// Fetch several symbols, batching when the adapter can.
    ///
    /// A failed batch call falls back to sequential single fetches, capped by
    /// the batch fallback limit. Unresolved symbols are absent from the map.
    pub async fn fetch_multiple_quotes(&self, symbols: &[String]) -> HashMap<String, Quote> {
        let symbols: Vec<String> = symbols
            .iter()
            .map(|s| normalize_symbol(s))
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return HashMap::new();
        }

        if self.adapter.supports_batch() {
            if let Some(quotes) = self
                .guarded("batch", || self.adapter.fetch_batch(&symbols))
                .await
                .ok()
            {
                return quotes
                    .into_iter()
                    .map(|(symbol, quote)| (normalize_symbol(&symbol), quote))
                    .collect();
            }
            debug!(
                "Provider '{}' batch failed, falling back to single fetches",
                self.name()
            );
        }

        self.fetch_sequential(&symbols).await
    }

    async fn fetch_sequential(&self, symbols: &[String]) -> HashMap<String, Quote> {
        let limit = self.batch_fallback_limit.unwrap_or(symbols.len());
        if symbols.len() > limit {
            debug!(
                "Provider '{}' fetching {} of {} symbols one by one",
                self.name(),
                limit,
                symbols.len()
            );
        }

        let mut quotes = HashMap::new();
        for symbol in symbols.iter().take(limit) {
            if let Some(quote) = self.fetch_quote(symbol).await {
                quotes.insert(symbol.clone(), quote);
            }
        }
        quotes
    }

    /// Probe the sentinel symbol; the result overwrites the health flag.
    ///
    /// A probe refused by the local quota leaves the flag untouched.
    pub async fn health_check(&self) -> bool {
        let symbol = self.sentinel_symbol.clone();
        match self
            .guarded("health check", || self.adapter.fetch_quote(&symbol))
            .await
        {
            CallOutcome::Success(_) => {
                self.lock_health().is_healthy = true;
                true
            }
            CallOutcome::Failed => {
                self.lock_health().is_healthy = false;
                false
            }
            CallOutcome::Throttled => self.is_available(),
        }
    }

    /// Clear error counters and any 429 backoff.
    pub fn reset_error_tracking(&self) {
        self.lock_health().reset();
        self.limiter.reset_backoff();
        info!("Error tracking reset for provider '{}'", self.name());
    }

    pub fn status(&self) -> ProviderStatus {
        let health = self.lock_health().clone();
        ProviderStatus {
            name: self.name().to_string(),
            priority: self.priority(),
            has_api_key: self.adapter.has_api_key(),
            is_healthy: health.is_healthy,
            request_count: health.request_count,
            error_count: health.error_count,
            last_success: health.last_success,
            last_error: health.last_error,
            last_error_message: health.last_error_message,
            rate_limit: self.limiter.status(),
        }
    }
}
