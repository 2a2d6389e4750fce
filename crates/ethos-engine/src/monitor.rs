//! Background limiter monitor for CLI runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::limiter::ConcurrencyLimiter;

/// Periodically log limiter usage. Abort the returned handle to stop.
pub fn spawn_limiter_monitor(
    limiter: Arc<ConcurrencyLimiter>,
    interval: Duration,
) -> JoinHandle<()> {
    tracing::info!(
        "starting limiter monitor (capacity: {}, interval: {:?})",
        limiter.capacity(),
        interval
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let snapshot = limiter.snapshot();
            tracing::info!(
                "running: {} waiting: {} limit: {}",
                snapshot.active,
                snapshot.waiting,
                snapshot.capacity
            );
        }
    })
}
