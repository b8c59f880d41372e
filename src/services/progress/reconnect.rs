//! Reconnection Backoff Policy
//!
//! Exponential backoff for the progress channel:
//! `delay = base_interval * 1.5^(attempt-1)` with attempt starting at 1,
//! capped by a hard attempt limit. The counter tracks consecutive failures:
//! a successful handshake resets it, as does a manual reconnect.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for reconnect behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts before giving up (default: 5)
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff (default: 1000)
    pub base_interval_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_interval_ms: 1000,
        }
    }
}

impl ReconnectPolicy {
    /// Calculate the delay for a given reconnect attempt (1-based).
    ///
    /// Formula: `base_interval_ms * 1.5^(attempt-1)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1.5f64.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.base_interval_ms as f64 * factor).round() as u64)
    }
}

/// Consecutive-failure accounting over a policy.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl ReconnectState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Number of attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Register a failure and return the delay before the next attempt,
    /// or `None` once the attempt cap is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(self.policy.delay_for_attempt(self.attempt))
    }

    /// Reset the counter (successful handshake or manual reconnect).
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
