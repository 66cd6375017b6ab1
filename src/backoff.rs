//! Deterministic exponential backoff for retry scheduling.

use serde::{Deserialize, Serialize};

/// Retry delay schedule: `delay = min(cap, initial * multiplier^attempt)`.
///
/// Pure and side-effect-free; the executor decides when to actually sleep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry, in milliseconds.
    pub initial_ms: u64,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Upper bound on any single delay, in milliseconds.
    pub cap_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 250,
            multiplier: 2.0,
            cap_ms: 5_000,
        }
    }
}

impl BackoffConfig {
    /// Creates a schedule from its three parameters.
    pub fn new(initial_ms: u64, multiplier: f64, cap_ms: u64) -> Self {
        Self {
            initial_ms,
            multiplier,
            cap_ms,
        }
    }

    /// Delay in milliseconds before retry `attempt` (zero-based).
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let scaled = (self.initial_ms as f64) * multiplier.powi(attempt as i32);
        if !scaled.is_finite() || scaled >= self.cap_ms as f64 {
            self.cap_ms
        } else {
            scaled as u64
        }
    }
}
