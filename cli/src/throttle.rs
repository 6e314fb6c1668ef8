use std::time::{Duration, Instant};

/// Minimum spacing between outgoing cursor updates.
pub const CURSOR_INTERVAL: Duration = Duration::from_millis(50);

/// Drops events that arrive within `interval` of the last admitted one.
#[derive(Debug, Clone)]
pub struct CursorThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl CursorThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Admit an event observed at `now`, recording it when admitted.
    pub fn admit(&mut self, now: Instant) -> bool {
        if self.last.is_some_and(|last| now.saturating_duration_since(last) < self.interval) {
            return false;
        }
        self.last = Some(now);
        true
    }

    /// Forget the last admitted event so the next one goes through.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for CursorThrottle {
    fn default() -> Self {
        Self::new(CURSOR_INTERVAL)
    }
}

#[cfg(test)]
#[path = "throttle_test.rs"]
mod tests;
