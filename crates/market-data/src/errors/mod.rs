//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`QuoteError`]: failures of a single provider call
//! - [`ConfigError`]: construction-time misconfiguration, fatal at startup
//! - [`RetryClass`]: how a provider handle reacts to a [`QuoteError`]

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors produced by a market data provider call.
///
/// None of these escape the provider handle for quote fetches: they are
/// logged, counted against the provider and turned into an absent quote.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    /// The symbol is unknown upstream, or the payload carried no usable price.
    #[error("Symbol not found: {0}")]
    NotFound(String),

    /// The upstream answered 429 or reported quota exhaustion in its body.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The call did not complete within the provider's timeout.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// Transport failure, non-2xx status or an unparseable payload.
    #[error("Upstream error: {provider} - {message}")]
    UpstreamError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// Every configured provider is unhealthy or none is configured.
    #[error("No provider available")]
    NoProviderAvailable,

    /// The provider does not implement the requested operation.
    #[error("Operation '{operation}' not supported by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The provider lacking it
        provider: String,
    },

    /// An administrative call named a provider that is not configured.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl QuoteError {
    /// Shorthand for an [`QuoteError::UpstreamError`].
    pub fn upstream(provider: &str, message: impl Into<String>) -> Self {
        Self::UpstreamError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricewatch_market_data::errors::{QuoteError, RetryClass};
    ///
    /// let error = QuoteError::RateLimited { provider: "FMP".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Backoff);
    ///
    /// let error = QuoteError::NotFound("ZZZZZ999".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::NotFound(_) | Self::NotSupported { .. } | Self::UnknownProvider(_) => {
                RetryClass::Never
            }

            Self::RateLimited { .. } => RetryClass::Backoff,

            Self::Timeout { .. } | Self::UpstreamError { .. } => RetryClass::NextProvider,

            Self::NoProviderAvailable => RetryClass::Never,
        }
    }
}

/// Misconfiguration detected while building providers or the manager.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A provider that needs a key was enabled without one.
    #[error("Provider {provider} is enabled but has no API key")]
    MissingApiKey {
        /// The provider id
        provider: String,
    },

    /// Two providers registered under the same name.
    #[error("Provider {0} is registered more than once")]
    DuplicateProvider(String),

    /// The manager was built with an empty provider set.
    #[error("No market data providers are enabled")]
    NoProviders,

    /// A configuration value could not be parsed or is out of range.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The environment variable or field name
        key: String,
        /// What was wrong with it
        message: String,
    },

    /// The HTTP client for a provider could not be created.
    #[error("Failed to build HTTP client for {provider}: {message}")]
    HttpClient {
        /// The provider id
        provider: String,
        /// The builder error
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_never_retries() {
        let error = QuoteError::NotFound("ZZZZZ999".to_string());
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_rate_limited_backs_off() {
        let error = QuoteError::RateLimited {
            provider: "ALPHA_VANTAGE".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Backoff);
    }

    #[test]
    fn test_timeout_tries_next_provider() {
        let error = QuoteError::Timeout {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_upstream_error_tries_next_provider() {
        let error = QuoteError::upstream("FINNHUB", "HTTP 500");
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_error_display() {
        let error = QuoteError::NotFound("ZZZZZ999".to_string());
        assert_eq!(format!("{}", error), "Symbol not found: ZZZZZ999");

        let error = QuoteError::RateLimited {
            provider: "FMP".to_string(),
        };
        assert_eq!(format!("{}", error), "Rate limited: FMP");

        let error = QuoteError::upstream("YAHOO", "HTTP 503");
        assert_eq!(format!("{}", error), "Upstream error: YAHOO - HTTP 503");
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::MissingApiKey {
            provider: "FMP".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Provider FMP is enabled but has no API key"
        );
    }
}
