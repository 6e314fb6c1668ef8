//! Reconnect policy: exponential backoff with jitter, capped attempts.
//!
//! Delays double from `base` up to `max`. Each delay is scaled by a random
//! factor in `[0.5, 1.0]` so clients dropped together do not reconnect in
//! lockstep. After `max_attempts` consecutive failures the policy yields
//! `None` and the caller hands control back to the user.

use std::time::Duration;

use rand::Rng;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self { base, max: max.max(base), max_attempts, attempts: 0 }
    }

    /// Delay before the next attempt, or `None` once attempts are used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        let ceiling = self.ceiling(self.attempts);
        self.attempts += 1;
        let factor: f64 = rand::rng().random_range(0.5..=1.0);
        Some(ceiling.mul_f64(factor))
    }

    /// Un-jittered delay for the zero-based `attempt`.
    #[must_use]
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Called after a connection was established.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
#[path = "reconnect_test.rs"]
mod tests;
