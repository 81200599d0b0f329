//! Periodic health probing of every provider.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use super::provider_handle::ProviderHandle;
use super::scheduler::ScheduledTask;

/// Default period between probes.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default delay before the first probe after startup.
pub const DEFAULT_HEALTH_INITIAL_DELAY: Duration = Duration::from_secs(5);

/// Probe every provider in parallel. Returns how many are healthy.
pub async fn probe_all(providers: &[Arc<ProviderHandle>]) -> usize {
    let results = join_all(providers.iter().map(|p| p.health_check())).await;

    let healthy = results.iter().filter(|ok| **ok).count();
    for (provider, ok) in providers.iter().zip(&results) {
        if !ok {
            warn!("Health check failed for provider '{}'", provider.name());
        }
    }
    info!(
        "Health check complete: {}/{} providers healthy",
        healthy,
        providers.len()
    );
    healthy
}

/// Start the recurring health probe.
pub fn spawn_health_monitor(
    providers: Vec<Arc<ProviderHandle>>,
    initial_delay: Duration,
    interval: Duration,
) -> ScheduledTask {
    let providers = Arc::new(providers);
    ScheduledTask::spawn("provider-health", initial_delay, interval, move || {
        let providers = providers.clone();
        async move {
            probe_all(&providers).await;
        }
    })
}
