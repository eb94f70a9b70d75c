//! Retry policy for handshake failures
//!
//! Applies only before the stream is accepted. Backoff grows geometrically
//! from `initial_backoff_ms`, is capped at `max_backoff_ms`, and optionally
//! gets up to 25% jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Initial backoff delay
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f32,

    /// Add jitter to backoff
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate backoff duration for attempt N (0-indexed)
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_backoff_ms as f64 * f64::from(self.backoff_multiplier).powi(exponent);
        let capped = base.min(self.max_backoff_ms as f64);

        let duration_ms = if self.use_jitter {
            // Up to 25% extra
            let jitter = rand::random::<f64>() * 0.25;
            (capped * (1.0 + jitter)) as u64
        } else {
            capped as u64
        };

        Duration::from_millis(duration_ms)
    }

    /// Whether another attempt is allowed after `retries_so_far` retries
    pub fn allows_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }
}
