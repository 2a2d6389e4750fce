//! Counting limiter for concurrent backend calls, with live usage introspection.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::EngineError;

/// Caps the number of concurrent backend calls and exposes the current usage.
///
/// One instance is shared by every component that invokes the backend; there
/// is no process-wide global. Slots are held through [`SlotGuard`], so a slot
/// is returned on every exit path, including task cancellation.
pub struct ConcurrencyLimiter {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    active: AtomicUsize,
    waiting: AtomicUsize,
}

/// Point-in-time usage numbers, safe to read from any concurrent context.
///
/// For dashboards and logs only; callers must not make correctness decisions
/// from a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct LimiterSnapshot {
    /// Slots currently held.
    pub active: usize,
    /// Tasks currently blocked in `acquire`.
    pub waiting: usize,
    /// Total slot count.
    pub capacity: usize,
}

/// RAII handle for one limiter slot. Dropping it releases the slot.
pub struct SlotGuard {
    limiter: Arc<ConcurrencyLimiter>,
    _permit: OwnedSemaphorePermit,
}

/// Decrements the waiting counter when an `acquire` future completes or is dropped.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// Create a limiter with the given capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        tracing::info!("concurrency limiter initialized with capacity {capacity}");
        Arc::new(Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            active: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
        })
    }

    /// Wait for a free slot. Fails only if the limiter has been closed.
    pub async fn acquire(self: &Arc<Self>) -> Result<SlotGuard, EngineError> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let waiting = WaitingGuard(&self.waiting);
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::LimiterClosed)?;
        drop(waiting);
        self.active.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            "limiter slot acquired (active: {}, waiting: {}, capacity: {})",
            self.active.load(Ordering::SeqCst),
            self.waiting.load(Ordering::SeqCst),
            self.capacity
        );
        Ok(SlotGuard {
            limiter: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Total slot count, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of tasks currently blocked in [`Self::acquire`].
    pub fn waiting_count(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// All three usage numbers in one read.
    pub fn snapshot(&self) -> LimiterSnapshot {
        LimiterSnapshot {
            active: self.active_count(),
            waiting: self.waiting_count(),
            capacity: self.capacity,
        }
    }

    /// Decrement the active counter, refusing to go below zero.
    ///
    /// Guards against double-release bugs: a stray call at zero is a no-op
    /// and never corrupts the counter.
    fn debit_active(&self) {
        let updated = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });
        if updated.is_err() {
            tracing::warn!("limiter release with active count already zero");
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.limiter.debit_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn release_at_zero_is_a_no_op() {
        let limiter = ConcurrencyLimiter::new(2);
        limiter.debit_active();
        assert_eq!(limiter.active_count(), 0);

        // A normal acquire/release cycle still works after the stray release.
        let guard = limiter.acquire().await.expect("acquire should succeed");
        assert_eq!(limiter.active_count(), 1);
        drop(guard);
        assert_eq!(limiter.active_count(), 0);
    }

    #[tokio::test]
    async fn capacity_is_clamped_to_one() {
        let limiter = ConcurrencyLimiter::new(0);
        assert_eq!(limiter.capacity(), 1);
    }

    #[tokio::test]
    async fn cancelled_acquire_does_not_leak_waiting_count() {
        let limiter = ConcurrencyLimiter::new(1);
        let _held = limiter.acquire().await.expect("acquire should succeed");

        {
            let contender = limiter.acquire();
            tokio::pin!(contender);
            let poll =
                tokio::time::timeout(std::time::Duration::from_millis(20), contender.as_mut())
                    .await;
            assert!(poll.is_err(), "second acquire should still be blocked");
            assert_eq!(limiter.waiting_count(), 1);
        }

        // Dropping the blocked acquire future must give its waiting slot back.
        assert_eq!(limiter.waiting_count(), 0);
    }
}
