//! Retry budget and backoff schedule for message processing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffMode {
    /// Same delay before every retry.
    Fixed,
    /// Delay doubles with each retry.
    Exponential,
}

/// Per-message retry budget.
///
/// A message gets `max_retries + 1` processing attempts in total before it
/// is dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub mode: BackoffMode,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            mode: BackoffMode::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep before retry number `attempt` (zero-based: the delay
    /// after the first failure is `delay_for(0)`).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.mode {
            BackoffMode::Fixed => self.base_delay,
            BackoffMode::Exponential => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt)),
        }
    }

    /// Total number of processing attempts a message may consume.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}
