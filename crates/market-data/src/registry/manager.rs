//! Quote manager: cache, priority failover and health probing in front of
//! the configured providers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::{build_providers, MarketDataConfig};
use crate::errors::{ConfigError, QuoteError};
use crate::models::{
    normalize_symbol, BatchQuoteRequest, ProviderStatus, Quote, QuoteRequest, SearchResult,
};
use crate::recorder::PriceRecorder;

use super::cache::{QuoteCache, DEFAULT_CACHE_TTL};
use super::health_monitor::{
    spawn_health_monitor, DEFAULT_HEALTH_INITIAL_DELAY, DEFAULT_HEALTH_INTERVAL,
};
use super::provider_handle::ProviderHandle;
use super::scheduler::ScheduledTask;

/// Added to every other provider's priority by [`QuoteManager::set_default_provider`].
pub const DEFAULT_PRIORITY_OFFSET: i32 = 10;

/// Entry point for quote lookups.
///
/// Owns the providers (in registration order), the result cache and the
/// health-probe task. Construct once at startup, call [`init`](Self::init)
/// inside the runtime and [`shutdown`](Self::shutdown) on exit.
pub struct QuoteManager {
    providers: Vec<Arc<ProviderHandle>>,
    cache: QuoteCache,
    recorder: Option<Arc<dyn PriceRecorder>>,
    health_initial_delay: Duration,
    health_interval: Duration,
    health_task: Mutex<Option<ScheduledTask>>,
}

impl QuoteManager {
    /// Create a manager. Provider names must be unique.
    pub fn new(providers: Vec<Arc<ProviderHandle>>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for provider in &providers {
            if !seen.insert(provider.name()) {
                return Err(ConfigError::DuplicateProvider(provider.name().to_string()));
            }
        }

        Ok(Self {
            providers,
            cache: QuoteCache::new(DEFAULT_CACHE_TTL),
            recorder: None,
            health_initial_delay: DEFAULT_HEALTH_INITIAL_DELAY,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            health_task: Mutex::new(None),
        })
    }

    /// Build the providers described by `config` and a manager around them.
    pub fn from_config(config: &MarketDataConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(build_providers(config)?)?
            .with_cache_ttl(config.cache_ttl())
            .with_health_schedule(config.health_initial_delay(), config.health_interval()))
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = QuoteCache::new(ttl);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn PriceRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_health_schedule(mut self, initial_delay: Duration, interval: Duration) -> Self {
        self.health_initial_delay = initial_delay;
        self.health_interval = interval;
        self
    }

    fn lock_health_task(&self) -> MutexGuard<'_, Option<ScheduledTask>> {
        self.health_task.lock().unwrap_or_else(|poisoned| {
            warn!("Health task mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Start the health probe: once after the initial delay, then periodically.
    ///
    /// Calling it again while the probe runs is a no-op.
    pub fn init(&self) {
        let mut task = self.lock_health_task();
        if task.is_some() {
            debug!("Quote manager already initialized");
            return;
        }
        *task = Some(spawn_health_monitor(
            self.providers.clone(),
            self.health_initial_delay,
            self.health_interval,
        ));
        info!(
            "Quote manager started with {} providers (cache TTL {:?})",
            self.providers.len(),
            self.cache.ttl()
        );
    }

    /// Stop the health probe and drop every cached quote.
    pub async fn shutdown(&self) {
        let task = self.lock_health_task().take();
        if let Some(task) = task {
            task.stop().await;
        }
        self.cache.clear();
        info!("Quote manager shut down");
    }

    pub fn providers(&self) -> &[Arc<ProviderHandle>] {
        &self.providers
    }

    pub fn provider(&self, name: &str) -> Option<&Arc<ProviderHandle>> {
        self.providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    /// Healthy providers by ascending priority, ties in registration order.
    pub fn available_providers(&self) -> Vec<Arc<ProviderHandle>> {
        let mut ranked: Vec<(i32, usize, &Arc<ProviderHandle>)> = self
            .providers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_available())
            .map(|(idx, p)| (p.priority(), idx, p))
            .collect();
        ranked.sort_by_key(|(priority, idx, _)| (*priority, *idx));
        ranked.into_iter().map(|(_, _, p)| p.clone()).collect()
    }

    /// Providers to attempt, in order.
    ///
    /// The preferred provider (when available) goes first. Without fallback
    /// the list stops there, and a request naming no provider gets only the
    /// highest-priority one.
    fn attempt_order(
        &self,
        preferred: Option<&str>,
        allow_fallback: bool,
    ) -> Vec<Arc<ProviderHandle>> {
        let available = self.available_providers();
        let requested = preferred.is_some();
        let preferred = preferred.and_then(|name| {
            let found = available
                .iter()
                .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
                .cloned();
            if found.is_none() {
                debug!("Preferred provider '{}' is not available", name);
            }
            found
        });

        let mut order = Vec::with_capacity(available.len());
        if let Some(preferred) = &preferred {
            order.push(preferred.clone());
        }

        if allow_fallback {
            order.extend(
                available
                    .into_iter()
                    .filter(|p| !preferred.as_ref().is_some_and(|pref| Arc::ptr_eq(pref, p))),
            );
        } else if !requested {
            order.extend(available.into_iter().take(1));
        }
        order
    }

    /// Cache a freshly fetched quote and hand it to the recorder.
    fn accept(&self, symbol: &str, quote: Quote) -> Quote {
        self.cache.insert(symbol, quote.clone());

        if let Some(recorder) = &self.recorder {
            if !quote.simulated {
                let recorder = recorder.clone();
                let quote = quote.clone();
                tokio::spawn(async move {
                    if let Err(e) = recorder.record_price(&quote).await {
                        warn!("{}", e);
                    }
                });
            }
        }
        quote
    }

    /// Latest quote for one symbol, or `None` when no provider has it.
    pub async fn fetch_quote(&self, request: QuoteRequest) -> Option<Quote> {
        let symbol = normalize_symbol(&request.symbol);
        if symbol.is_empty() {
            return None;
        }

        if let Some(quote) = self.cache.get(&symbol) {
            debug!("Cache hit for '{}'", symbol);
            return Some(quote);
        }

        let order = self.attempt_order(
            request.preferred_provider.as_deref(),
            request.allow_fallback,
        );
        if order.is_empty() {
            warn!("{} for '{}'", QuoteError::NoProviderAvailable, symbol);
            return None;
        }

        for provider in order {
            if let Some(quote) = provider.fetch_quote(&symbol).await {
                debug!("Quote for '{}' served by '{}'", symbol, provider.name());
                return Some(self.accept(&symbol, quote));
            }
            debug!(
                "Provider '{}' had no quote for '{}', trying next",
                provider.name(),
                symbol
            );
        }

        debug!("All providers failed for '{}'", symbol);
        None
    }

    /// Quotes for many symbols. Symbols nobody could resolve are absent.
    ///
    /// Phases, each only for symbols still unresolved:
    /// 1. cache
    /// 2. batch call per provider, preferred first, strictly in order
    /// 3. individual [`fetch_quote`](Self::fetch_quote) calls, at most
    ///    `max_concurrency` in flight
    pub async fn fetch_multiple_quotes(
        &self,
        request: BatchQuoteRequest,
    ) -> HashMap<String, Quote> {
        let mut results = HashMap::new();
        let mut misses = Vec::new();
        let mut seen = HashSet::new();

        for symbol in &request.symbols {
            let symbol = normalize_symbol(symbol);
            if symbol.is_empty() || !seen.insert(symbol.clone()) {
                continue;
            }
            match self.cache.get(&symbol) {
                Some(quote) => {
                    results.insert(symbol, quote);
                }
                None => misses.push(symbol),
            }
        }
        debug!(
            "Batch request: {} cached, {} to fetch",
            results.len(),
            misses.len()
        );

        let order = self.attempt_order(
            request.preferred_provider.as_deref(),
            request.allow_fallback,
        );
        for provider in order {
            if misses.is_empty() {
                break;
            }
            let found = provider.fetch_multiple_quotes(&misses).await;
            for (symbol, quote) in found {
                if misses.contains(&symbol) && !results.contains_key(&symbol) {
                    let quote = self.accept(&symbol, quote);
                    results.insert(symbol, quote);
                }
            }
            misses.retain(|s| !results.contains_key(s));
        }

        if !misses.is_empty() {
            let concurrency = request.max_concurrency.max(1);
            let preferred = request.preferred_provider.clone();
            let allow_fallback = request.allow_fallback;

            let individual: Vec<(String, Option<Quote>)> = stream::iter(misses)
                .map(|symbol| {
                    let single = QuoteRequest {
                        symbol: symbol.clone(),
                        preferred_provider: preferred.clone(),
                        allow_fallback,
                    };
                    async move { (symbol, self.fetch_quote(single).await) }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for (symbol, quote) in individual {
                match quote {
                    Some(quote) => {
                        results.insert(symbol, quote);
                    }
                    None => debug!("No provider could resolve '{}'", symbol),
                }
            }
        }

        results
    }

    /// True when a quote for the symbol can be obtained.
    pub async fn validate_symbol(&self, symbol: &str) -> bool {
        self.fetch_quote(QuoteRequest::new(symbol)).await.is_some()
    }

    /// First non-empty result list in priority order.
    pub async fn search_symbols(&self, query: &str) -> Vec<SearchResult> {
        for provider in self.available_providers() {
            let results = provider.search_symbols(query).await;
            if !results.is_empty() {
                return results;
            }
            debug!(
                "Provider '{}' returned no search results for '{}'",
                provider.name(),
                query
            );
        }
        Vec::new()
    }

    pub fn get_provider_status(&self) -> BTreeMap<String, ProviderStatus> {
        self.providers
            .iter()
            .map(|p| (p.name().to_string(), p.status()))
            .collect()
    }

    /// Make `name` the first provider tried.
    ///
    /// It gets priority 1; every other provider is pushed back by
    /// [`DEFAULT_PRIORITY_OFFSET`], keeping their relative order.
    pub fn set_default_provider(&self, name: &str) -> Result<(), QuoteError> {
        let target = self
            .provider(name)
            .ok_or_else(|| QuoteError::UnknownProvider(name.to_string()))?;

        for provider in &self.providers {
            if !Arc::ptr_eq(provider, target) {
                provider.set_priority(provider.priority() + DEFAULT_PRIORITY_OFFSET);
            }
        }
        target.set_priority(1);
        info!("Default quote provider set to '{}'", target.name());
        Ok(())
    }

    pub fn reset_error_tracking(&self, name: &str) -> Result<(), QuoteError> {
        let provider = self
            .provider(name)
            .ok_or_else(|| QuoteError::UnknownProvider(name.to_string()))?;
        provider.reset_error_tracking();
        Ok(())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
