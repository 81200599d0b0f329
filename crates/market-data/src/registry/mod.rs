//! Provider registry module.
//!
//! This module provides orchestration for market data providers, including:
//! - Provider handles with per-provider rate limiting and health counters
//! - Priority ordering and failover (`QuoteManager`)
//! - The short-lived quote cache
//! - The periodic health probe

mod cache;
mod health;
mod health_monitor;
mod manager;
mod provider_handle;
mod rate_limiter;
mod scheduler;

pub use cache::{QuoteCache, DEFAULT_CACHE_TTL};
pub use health::{ProviderHealth, UNHEALTHY_ERROR_RATE, UNHEALTHY_MIN_ERRORS};
pub use health_monitor::{
    probe_all, spawn_health_monitor, DEFAULT_HEALTH_INITIAL_DELAY, DEFAULT_HEALTH_INTERVAL,
};
pub use manager::{QuoteManager, DEFAULT_PRIORITY_OFFSET};
pub use provider_handle::{ProviderHandle, DEFAULT_SENTINEL_SYMBOL};
pub use rate_limiter::{RateLimiter, Throttled};
pub use scheduler::ScheduledTask;
