//! Request counters and the healthy/unhealthy flag of a provider.

use chrono::{DateTime, Utc};

/// More errors than this are needed before a provider can turn unhealthy.
pub const UNHEALTHY_MIN_ERRORS: u64 = 5;

/// Error ratio above which a provider turns unhealthy.
pub const UNHEALTHY_ERROR_RATE: f64 = 0.5;

/// Counters kept per provider.
///
/// The flag only turns back to healthy through a success that leaves the
/// error rate under the threshold, an explicit reset, or a health probe.
#[derive(Clone, Debug)]
pub struct ProviderHealth {
    pub request_count: u64,
    pub error_count: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
    pub is_healthy: bool,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            request_count: 0,
            error_count: 0,
            last_success: None,
            last_error: None,
            last_error_message: None,
            is_healthy: true,
        }
    }
}

impl ProviderHealth {
    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.last_success = Some(at);
        self.last_error = None;
        self.last_error_message = None;
        if !self.error_threshold_exceeded() {
            self.is_healthy = true;
        }
    }

    /// Returns true when this failure flipped the provider to unhealthy.
    pub fn record_failure(&mut self, at: DateTime<Utc>, message: String) -> bool {
        self.error_count += 1;
        self.last_error = Some(at);
        self.last_error_message = Some(message);

        let was_healthy = self.is_healthy;
        if self.error_threshold_exceeded() {
            self.is_healthy = false;
        }
        was_healthy && !self.is_healthy
    }

    pub fn error_threshold_exceeded(&self) -> bool {
        self.request_count > 0
            && self.error_count > UNHEALTHY_MIN_ERRORS
            && self.error_count as f64 / self.request_count as f64 > UNHEALTHY_ERROR_RATE
    }

    /// Clear the error counters. Health comes back only for a provider
    /// that has succeeded at least once.
    pub fn reset(&mut self) {
        self.error_count = 0;
        self.last_error = None;
        self.last_error_message = None;
        if self.last_success.is_some() {
            self.is_healthy = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail(health: &mut ProviderHealth) -> bool {
        health.record_request();
        health.record_failure(Utc::now(), "boom".to_string())
    }

    #[test]
    fn test_five_failures_keep_provider_healthy() {
        let mut health = ProviderHealth::default();
        for _ in 0..5 {
            assert!(!fail(&mut health));
        }
        assert!(health.is_healthy);
    }

    #[test]
    fn test_sixth_failure_flips_to_unhealthy() {
        let mut health = ProviderHealth::default();
        for _ in 0..5 {
            fail(&mut health);
        }
        assert!(fail(&mut health));
        assert!(!health.is_healthy);
        assert_eq!(health.error_count, 6);
        assert_eq!(health.request_count, 6);
    }

    #[test]
    fn test_low_error_rate_stays_healthy() {
        let mut health = ProviderHealth::default();
        for _ in 0..10 {
            health.record_request();
            health.record_success(Utc::now());
        }
        for _ in 0..6 {
            fail(&mut health);
        }
        // 6 errors / 16 requests
        assert!(health.is_healthy);
    }

    #[test]
    fn test_success_does_not_restore_while_rate_is_high() {
        let mut health = ProviderHealth::default();
        for _ in 0..6 {
            fail(&mut health);
        }
        health.record_request();
        health.record_success(Utc::now());
        assert!(!health.is_healthy);
        assert!(health.last_error.is_none());
    }

    #[test]
    fn test_reset_requires_prior_success() {
        let mut health = ProviderHealth::default();
        for _ in 0..6 {
            fail(&mut health);
        }
        health.reset();
        assert_eq!(health.error_count, 0);
        assert!(!health.is_healthy);

        health.last_success = Some(Utc::now());
        health.reset();
        assert!(health.is_healthy);
    }
}
