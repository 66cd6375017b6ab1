//! Optional throttling of outbound tool invocations.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Admission control applied before each tool invocation.
///
/// The limiter is the one object shared by reference across concurrently
/// executing tests; implementations must queue callers safely.
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Suspends until the caller may proceed with an invocation.
    async fn acquire(&self);
}

/// Enforces a minimum spacing between consecutive invocations.
pub struct IntervalRateLimiter {
    min_interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl IntervalRateLimiter {
    /// Creates a limiter spacing invocations at least `min_interval` apart.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_release: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RateLimit for IntervalRateLimiter {
    async fn acquire(&self) {
        // Holding the lock across the sleep serializes waiters in arrival
        // order on the mutex queue.
        let mut last = self.last_release.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
