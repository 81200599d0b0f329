//! Market data configuration and the provider factory.
//!
//! Settings come from serde (e.g. a JSON settings blob) or from the
//! environment via [`MarketDataConfig::from_env`]. API keys are read from
//! `FMP_API_KEY`, `ALPHA_VANTAGE_API_KEY` and `FINNHUB_API_KEY`; every other
//! knob uses the `PW_` prefix.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::errors::ConfigError;
use crate::models::DEFAULT_MAX_CONCURRENCY;
use crate::provider::{
    alpha_vantage, finnhub, fmp, yahoo, AlphaVantageProvider, FinnhubProvider, FmpProvider,
    MarketDataProvider, YahooProvider,
};
use crate::registry::{ProviderHandle, DEFAULT_SENTINEL_SYMBOL};

/// Longest accepted quote cache TTL.
pub const MAX_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
/// Longest accepted health check period.
pub const MAX_HEALTH_INTERVAL_MINUTES: u64 = 24 * 60;
/// Longest accepted delay before the first health check.
pub const MAX_HEALTH_INITIAL_DELAY_SECS: u64 = 24 * 60 * 60;

/// Per-provider settings. Every field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderConfig {
    /// `None` enables keyless providers, and keyed ones when a key is set
    pub enabled: Option<bool>,
    pub api_key: Option<String>,
    pub priority: Option<i32>,
    pub timeout_secs: Option<u64>,
    pub base_url: Option<String>,
    pub batch_fallback_limit: Option<usize>,
}

impl ProviderConfig {
    fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Whether to build the provider at all.
    fn is_enabled(&self, provider: &str, requires_key: bool) -> Result<bool, ConfigError> {
        match (self.enabled, requires_key, self.api_key().is_some()) {
            (Some(false), _, _) => Ok(false),
            (Some(true), true, false) => Err(ConfigError::MissingApiKey {
                provider: provider.to_string(),
            }),
            (Some(true), _, _) => Ok(true),
            (None, true, has_key) => Ok(has_key),
            (None, false, _) => Ok(true),
        }
    }

    fn timeout(&self, default: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(default)
    }

    fn base_url<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(default)
    }
}

/// Settings for the quote manager and its providers.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketDataConfig {
    pub cache_ttl_secs: u64,
    pub health_interval_minutes: u64,
    pub health_initial_delay_secs: u64,
    pub max_concurrency: usize,
    pub sentinel_symbol: String,
    pub yahoo: ProviderConfig,
    pub fmp: ProviderConfig,
    pub alpha_vantage: ProviderConfig,
    pub finnhub: ProviderConfig,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 60,
            health_interval_minutes: 5,
            health_initial_delay_secs: 5,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            sentinel_symbol: DEFAULT_SENTINEL_SYMBOL.to_string(),
            yahoo: ProviderConfig::default(),
            fmp: ProviderConfig::default(),
            alpha_vantage: ProviderConfig::default(),
            finnhub: ProviderConfig::default(),
        }
    }
}

impl MarketDataConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "PW_CACHE_TTL_SECS")? {
            config.cache_ttl_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "PW_HEALTH_INTERVAL_MINUTES")? {
            config.health_interval_minutes = v;
        }
        if let Some(v) = parse_var(&lookup, "PW_HEALTH_INITIAL_DELAY_SECS")? {
            config.health_initial_delay_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "PW_MAX_CONCURRENCY")? {
            config.max_concurrency = v;
        }
        if let Some(v) = lookup("PW_SENTINEL_SYMBOL") {
            config.sentinel_symbol = v;
        }

        config.yahoo = provider_from_lookup(&lookup, "YAHOO", None)?;
        config.fmp = provider_from_lookup(&lookup, "FMP", Some("FMP_API_KEY"))?;
        config.alpha_vantage =
            provider_from_lookup(&lookup, "ALPHA_VANTAGE", Some("ALPHA_VANTAGE_API_KEY"))?;
        config.finnhub = provider_from_lookup(&lookup, "FINNHUB", Some("FINNHUB_API_KEY"))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(invalid("cacheTtlSecs", "must be at most one day"));
        }
        if self.health_interval_minutes == 0 {
            return Err(invalid("healthIntervalMinutes", "must be at least 1"));
        }
        if self.health_interval_minutes > MAX_HEALTH_INTERVAL_MINUTES {
            return Err(invalid("healthIntervalMinutes", "must be at most one day"));
        }
        if self.health_initial_delay_secs > MAX_HEALTH_INITIAL_DELAY_SECS {
            return Err(invalid("healthInitialDelaySecs", "must be at most one day"));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("maxConcurrency", "must be at least 1"));
        }
        if self.sentinel_symbol.trim().is_empty() {
            return Err(invalid("sentinelSymbol", "must not be empty"));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_minutes.saturating_mul(60))
    }

    pub fn health_initial_delay(&self) -> Duration {
        Duration::from_secs(self.health_initial_delay_secs)
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(key, &e.to_string())),
    }
}

fn provider_from_lookup<F>(
    lookup: &F,
    name: &str,
    key_var: Option<&str>,
) -> Result<ProviderConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(ProviderConfig {
        enabled: parse_var(lookup, &format!("PW_{}_ENABLED", name))?,
        api_key: key_var.and_then(lookup),
        priority: parse_var(lookup, &format!("PW_{}_PRIORITY", name))?,
        timeout_secs: parse_var(lookup, &format!("PW_{}_TIMEOUT_SECS", name))?,
        base_url: lookup(&format!("PW_{}_BASE_URL", name)),
        batch_fallback_limit: parse_var(lookup, &format!("PW_{}_BATCH_FALLBACK_LIMIT", name))?,
    })
}

/// Build the enabled providers, in registration order
/// YAHOO, FMP, ALPHA_VANTAGE, FINNHUB.
pub fn build_providers(config: &MarketDataConfig) -> Result<Vec<Arc<ProviderHandle>>, ConfigError> {
    let mut providers = Vec::new();

    if config.yahoo.is_enabled(yahoo::PROVIDER_ID, false)? {
        let adapter = YahooProvider::with_options(
            config.yahoo.base_url(yahoo::DEFAULT_BASE_URL),
            config.yahoo.timeout(yahoo::DEFAULT_TIMEOUT),
        )?;
        providers.push(wrap(Arc::new(adapter), &config.yahoo, config));
    }

    if config.fmp.is_enabled(fmp::PROVIDER_ID, true)? {
        let adapter = FmpProvider::with_options(
            config.fmp.api_key().unwrap_or_default().to_string(),
            config.fmp.base_url(fmp::DEFAULT_BASE_URL),
            config.fmp.timeout(fmp::DEFAULT_TIMEOUT),
        )?;
        providers.push(wrap(Arc::new(adapter), &config.fmp, config));
    }

    if config.alpha_vantage.is_enabled(alpha_vantage::PROVIDER_ID, true)? {
        let adapter = AlphaVantageProvider::with_options(
            config.alpha_vantage.api_key().unwrap_or_default().to_string(),
            config.alpha_vantage.base_url(alpha_vantage::DEFAULT_BASE_URL),
            config.alpha_vantage.timeout(alpha_vantage::DEFAULT_TIMEOUT),
        )?;
        providers.push(wrap(Arc::new(adapter), &config.alpha_vantage, config));
    }

    if config.finnhub.is_enabled(finnhub::PROVIDER_ID, true)? {
        let adapter = FinnhubProvider::with_options(
            config.finnhub.api_key().unwrap_or_default().to_string(),
            config.finnhub.base_url(finnhub::DEFAULT_BASE_URL),
            config.finnhub.timeout(finnhub::DEFAULT_TIMEOUT),
        )?;
        providers.push(wrap(Arc::new(adapter), &config.finnhub, config));
    }

    if providers.is_empty() {
        return Err(ConfigError::NoProviders);
    }

    for provider in &providers {
        info!(
            "Market data provider '{}' enabled (priority {})",
            provider.name(),
            provider.priority()
        );
    }
    Ok(providers)
}

fn wrap(
    adapter: Arc<dyn MarketDataProvider>,
    settings: &ProviderConfig,
    config: &MarketDataConfig,
) -> Arc<ProviderHandle> {
    let mut handle = ProviderHandle::new(adapter).with_sentinel_symbol(&config.sentinel_symbol);
    if let Some(priority) = settings.priority {
        handle = handle.with_priority(priority);
    }
    if let Some(limit) = settings.batch_fallback_limit {
        handle = handle.with_batch_fallback_limit(Some(limit));
    }
    Arc::new(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MarketDataConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.health_interval(), Duration::from_secs(300));
        assert_eq!(config.health_initial_delay(), Duration::from_secs(5));
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.sentinel_symbol, "AAPL");
    }

    #[test]
    fn test_keyless_setup_has_only_yahoo() {
        let config = MarketDataConfig::from_lookup(lookup(&[])).unwrap();
        let providers = build_providers(&config).unwrap();

        let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["YAHOO"]);
    }

    #[test]
    fn test_keys_enable_providers() {
        let config = MarketDataConfig::from_lookup(lookup(&[
            ("FMP_API_KEY", "fmp-key"),
            ("FINNHUB_API_KEY", "fh-key"),
            ("PW_FINNHUB_PRIORITY", "0"),
        ]))
        .unwrap();
        let providers = build_providers(&config).unwrap();

        let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["YAHOO", "FMP", "FINNHUB"]);
        assert_eq!(providers[2].priority(), 0);
        assert!(providers[1].status().has_api_key);
    }

    #[test]
    fn test_enabled_without_key_is_fatal() {
        let config =
            MarketDataConfig::from_lookup(lookup(&[("PW_ALPHA_VANTAGE_ENABLED", "true")])).unwrap();

        let err = build_providers(&config).err().unwrap();
        assert!(matches!(
            err,
            ConfigError::MissingApiKey { ref provider } if provider == "ALPHA_VANTAGE"
        ));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let config = MarketDataConfig::from_lookup(lookup(&[
            ("FMP_API_KEY", "   "),
            ("PW_FMP_ENABLED", "true"),
        ]))
        .unwrap();
        assert!(build_providers(&config).is_err());
    }

    #[test]
    fn test_everything_disabled() {
        let config =
            MarketDataConfig::from_lookup(lookup(&[("PW_YAHOO_ENABLED", "false")])).unwrap();
        assert!(matches!(
            build_providers(&config),
            Err(ConfigError::NoProviders)
        ));
    }

    #[test]
    fn test_invalid_values() {
        let err = MarketDataConfig::from_lookup(lookup(&[("PW_CACHE_TTL_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "PW_CACHE_TTL_SECS"
        ));

        let err = MarketDataConfig::from_lookup(lookup(&[("PW_HEALTH_INTERVAL_MINUTES", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let err = MarketDataConfig::from_lookup(lookup(&[(
            "PW_CACHE_TTL_SECS",
            "18446744073709551615",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "cacheTtlSecs"
        ));

        let err = MarketDataConfig::from_lookup(lookup(&[(
            "PW_HEALTH_INTERVAL_MINUTES",
            "18446744073709551615",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "healthIntervalMinutes"
        ));

        let err = MarketDataConfig::from_lookup(lookup(&[(
            "PW_HEALTH_INITIAL_DELAY_SECS",
            "100000000",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let config = MarketDataConfig::from_lookup(lookup(&[
            ("PW_CACHE_TTL_SECS", "86400"),
            ("PW_HEALTH_INTERVAL_MINUTES", "1440"),
        ]))
        .unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.health_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_health_interval_saturates_without_validation() {
        let config = MarketDataConfig {
            health_interval_minutes: u64::MAX,
            ..MarketDataConfig::default()
        };
        assert_eq!(config.health_interval(), Duration::from_secs(u64::MAX));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: MarketDataConfig = serde_json::from_str(
            r#"{"cacheTtlSecs": 30, "fmp": {"apiKey": "k", "batchFallbackLimit": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.cache_ttl_secs, 30);
        assert_eq!(config.health_interval_minutes, 5);
        assert_eq!(config.fmp.batch_fallback_limit, Some(2));
    }
}
