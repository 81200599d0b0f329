//! Sliding-window rate limiter for a single market data provider.
//!
//! Each provider handle owns one limiter. It enforces three things:
//! - a minimum delay between requests (callers sleep until it elapses)
//! - rolling quota windows (requests beyond a quota are rejected, not queued)
//! - multiplicative backoff after the upstream answers 429

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::models::RateLimitStatus;
use crate::provider::RateLimitPolicy;

/// A request was refused because a quota window is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Throttled {
    /// Time until the oldest request leaves the exhausted window.
    pub retry_after: Duration,
}

#[derive(Debug)]
struct LimiterState {
    /// When the last request was let through.
    last_request: Option<Instant>,
    /// Admission times per quota window, oldest first.
    windows: Vec<VecDeque<Instant>>,
    /// Current inter-request delay, grows on 429.
    current_delay: Duration,
}

impl LimiterState {
    fn prune(&mut self, now: Instant, policy: &RateLimitPolicy) {
        for (log, window) in self.windows.iter_mut().zip(&policy.windows) {
            while let Some(oldest) = log.front() {
                if now.saturating_duration_since(*oldest) >= window.period {
                    log.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// Longest wait among the windows that are currently full.
    fn exhausted(&self, now: Instant, policy: &RateLimitPolicy) -> Option<Duration> {
        self.windows
            .iter()
            .zip(&policy.windows)
            .filter(|(log, window)| log.len() as u32 >= window.limit)
            .filter_map(|(log, window)| {
                log.front()
                    .map(|oldest| (*oldest + window.period).saturating_duration_since(now))
            })
            .max()
    }
}

/// Rate limiter for one provider.
pub struct RateLimiter {
    provider: &'static str,
    policy: RateLimitPolicy,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(provider: &'static str, policy: RateLimitPolicy) -> Self {
        let state = LimiterState {
            last_request: None,
            windows: policy.windows.iter().map(|_| VecDeque::new()).collect(),
            current_delay: policy.min_delay,
        };
        Self {
            provider,
            policy,
            state: Mutex::new(state),
        }
    }

    /// Lock the state mutex, recovering from poison if necessary.
    ///
    /// The worst case after recovery is slightly incorrect rate limiting,
    /// which is better than panicking.
    fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Rate limiter mutex for '{}' was poisoned, recovering",
                self.provider
            );
            poisoned.into_inner()
        })
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Admit one request.
    ///
    /// Waits for the inter-request delay, then records the request in
    /// every quota window. Returns [`Throttled`] without waiting when a
    /// window is already full.
    pub async fn acquire(&self) -> Result<(), Throttled> {
        loop {
            let wait_time = {
                let mut state = self.lock_state();
                let now = Instant::now();
                state.prune(now, &self.policy);

                if let Some(retry_after) = state.exhausted(now, &self.policy) {
                    return Err(Throttled { retry_after });
                }

                let ready_at = state.last_request.map(|last| last + state.current_delay);
                match ready_at {
                    Some(at) if at > now => at - now,
                    _ => {
                        state.last_request = Some(now);
                        for log in state.windows.iter_mut() {
                            log.push_back(now);
                        }
                        return Ok(());
                    }
                }
            };

            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait_time, self.provider
            );
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Grow the inter-request delay after an upstream 429.
    pub fn penalize(&self) {
        let mut state = self.lock_state();
        let base = state.current_delay.max(self.policy.backoff_initial);
        let next = base
            .saturating_mul(self.policy.backoff_multiplier.max(1))
            .min(self.policy.max_backoff);
        warn!(
            "Provider '{}' rate limited upstream, delay {:?} -> {:?}",
            self.provider, state.current_delay, next
        );
        state.current_delay = next;
    }

    /// Halve any backoff after a successful call, down to the base delay.
    pub fn record_success(&self) {
        let mut state = self.lock_state();
        if state.current_delay > self.policy.min_delay {
            state.current_delay = (state.current_delay / 2).max(self.policy.min_delay);
            debug!(
                "Provider '{}' backoff decayed to {:?}",
                self.provider, state.current_delay
            );
        }
    }

    /// Drop the backoff penalty.
    pub fn reset_backoff(&self) {
        self.lock_state().current_delay = self.policy.min_delay;
    }

    pub fn current_delay(&self) -> Duration {
        self.lock_state().current_delay
    }

    /// Remaining requests and reset time of the tightest quota window.
    pub fn status(&self) -> RateLimitStatus {
        let mut state = self.lock_state();
        let now = Instant::now();
        state.prune(now, &self.policy);

        let tightest = state
            .windows
            .iter()
            .zip(&self.policy.windows)
            .map(|(log, window)| {
                let remaining = window.limit.saturating_sub(log.len() as u32);
                let reset = log
                    .front()
                    .map(|oldest| (*oldest + window.period).saturating_duration_since(now));
                (remaining, reset)
            })
            .min_by_key(|(remaining, _)| *remaining);

        RateLimitStatus {
            remaining: tightest.map(|(remaining, _)| remaining),
            reset_in_secs: tightest.and_then(|(_, reset)| reset).map(|d| d.as_secs()),
            current_delay_ms: state.current_delay.as_millis() as u64,
        }
    }
}
