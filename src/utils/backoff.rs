//! Linear backoff for retried remote operations.

use crate::constants::{DEFAULT_BACKOFF_BASE, DEFAULT_RESOLVE_ATTEMPTS};
use std::time::Duration;

/// How many times to try an operation and how long to wait after each failure.
///
/// The delay after failed attempt `n` (1-based) is `n * base`, so the default
/// policy waits 1s, 2s and 3s. Tests use [`RetryPolicy::immediate`] to avoid
/// wall-clock waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Never less than 1.
    pub attempts: u32,
    /// Base delay multiplied by the attempt number.
    pub base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RESOLVE_ATTEMPTS,
            base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with `attempts` tries and a linear `base` delay.
    pub fn new(attempts: u32, base: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base,
        }
    }

    /// Same number of attempts as the default, without sleeping.
    pub fn immediate() -> Self {
        Self::new(DEFAULT_RESOLVE_ATTEMPTS, Duration::ZERO)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }

    /// Sleep for the delay belonging to `attempt`.
    pub async fn wait(&self, attempt: u32) {
        let delay = self.delay_for(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
