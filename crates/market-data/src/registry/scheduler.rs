//! Cancellable recurring background task.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shortest period a task may run on.
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// A job that runs once after an initial delay, then on a fixed period,
/// until cancelled.
///
/// Dropping the task cancels it.
pub struct ScheduledTask {
    name: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Spawn the job on the current tokio runtime.
    ///
    /// A period below [`MIN_PERIOD`] is raised to it.
    pub fn spawn<F, Fut>(
        name: &'static str,
        initial_delay: Duration,
        period: Duration,
        job: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = if period < MIN_PERIOD {
            warn!(
                "Scheduled task '{}' period {:?} is too short, using {:?}",
                name, period, MIN_PERIOD
            );
            MIN_PERIOD
        } else {
            period
        };
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            info!("Scheduled task '{}' started ({:?} interval)", name, period);

            tokio::select! {
                _ = cancelled.cancelled() => return,
                _ = tokio::time::sleep(initial_delay) => {}
            }
            job().await;

            let Some(start) = Instant::now().checked_add(period) else {
                warn!("Scheduled task '{}' period {:?} overflows the clock", name, period);
                cancelled.cancelled().await;
                return;
            };
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => job().await,
                }
            }
            debug!("Scheduled task '{}' stopped", name);
        });

        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Signal the task to stop after its current run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the task to finish.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(initial: u64, period: u64) -> (ScheduledTask, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = ScheduledTask::spawn(
            "test",
            Duration::from_secs(initial),
            Duration::from_secs(period),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );
        (task, runs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_initial_delay_then_periodically() {
        let (task, runs) = counting_task(5, 300);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_clamped() {
        let (task, runs) = counting_task(0, 0);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 4);
        assert!(!task.is_cancelled());

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_run() {
        let (task, runs) = counting_task(5, 300);

        task.cancel();
        assert!(task.is_cancelled());
        task.stop().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
