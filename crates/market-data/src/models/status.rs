use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of a provider's rate limiter.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Requests left in the tightest quota window, `None` without quotas
    pub remaining: Option<u32>,

    /// Seconds until the tightest window frees a slot
    pub reset_in_secs: Option<u64>,

    /// Current inter-request delay including any 429 backoff
    pub current_delay_ms: u64,
}

/// Read-only view of a provider for status endpoints.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub name: String,
    pub priority: i32,
    pub has_api_key: bool,
    pub is_healthy: bool,
    pub request_count: u64,
    pub error_count: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
    pub rate_limit: RateLimitStatus,
}
