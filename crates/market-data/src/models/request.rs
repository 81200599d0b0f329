//! Request types accepted by the quote manager.

use serde::Deserialize;

/// Default number of concurrent individual fetches in a batch request.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Single-symbol quote request.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub symbol: String,

    /// Provider to try before the priority order
    #[serde(default)]
    pub preferred_provider: Option<String>,

    /// Whether the remaining providers may be tried
    #[serde(default = "default_true")]
    pub allow_fallback: bool,
}

impl QuoteRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            preferred_provider: None,
            allow_fallback: true,
        }
    }

    pub fn prefer(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.allow_fallback = false;
        self
    }
}

/// Multi-symbol quote request.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchQuoteRequest {
    pub symbols: Vec<String>,

    #[serde(default)]
    pub preferred_provider: Option<String>,

    #[serde(default = "default_true")]
    pub allow_fallback: bool,

    /// Upper bound on in-flight individual fetches
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl BatchQuoteRequest {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            preferred_provider: None,
            allow_fallback: true,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn prefer(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.allow_fallback = false;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}
