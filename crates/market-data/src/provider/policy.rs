//! Rate limiting configuration for providers.
//!
//! Controls how aggressively we can call a provider to avoid
//! hitting its quotas and getting blocked.

use std::time::Duration;

/// A rolling quota: at most `limit` requests in any `period`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaWindow {
    pub limit: u32,
    pub period: Duration,
}

impl QuotaWindow {
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(60),
        }
    }

    pub const fn per_hour(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(60 * 60),
        }
    }

    pub const fn per_day(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Rate limiting policy for a single provider.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitPolicy {
    /// Minimum delay between two requests. Callers wait it out.
    pub min_delay: Duration,

    /// Rolling quotas. A request that would exceed one is rejected locally.
    pub windows: Vec<QuotaWindow>,

    /// Delay used for the first 429 when `min_delay` is zero.
    pub backoff_initial: Duration,

    /// Factor applied to the current delay on every 429.
    pub backoff_multiplier: u32,

    /// Ceiling for the backoff delay.
    pub max_backoff: Duration,
}

impl RateLimitPolicy {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            ..Self::default()
        }
    }

    pub fn with_window(mut self, window: QuotaWindow) -> Self {
        self.windows.push(window);
        self
    }

    /// No delay and no quota; used by in-memory providers.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            windows: Vec::new(),
            backoff_initial: Duration::from_secs(1),
            backoff_multiplier: 2,
            max_backoff: Duration::from_secs(30),
        }
    }
}
