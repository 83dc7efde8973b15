//! Double-press gesture detection
//!
//! Matches two fresh presses of the trigger key that land closer together
//! than the configured threshold. Presses of other keys and auto-repeats
//! never touch the timing window.

use std::time::{Duration, Instant};

/// Default gap allowed between the two presses of a gesture
pub const DEFAULT_THRESHOLD_MS: u64 = 300;

/// Detects a double press of a single trigger key
#[derive(Debug)]
pub struct DoublePressDetector {
    trigger_code: u16,
    threshold: Duration,
    /// Time of the last qualifying press still waiting for a partner
    last_press: Option<Instant>,
}

impl DoublePressDetector {
    pub fn new(trigger_code: u16, threshold: Duration) -> Self {
        Self {
            trigger_code,
            threshold,
            last_press: None,
        }
    }

    /// Register a key press observed now.
    ///
    /// Returns true when this press completes a double-press gesture.
    pub fn register(&mut self, code: u16, is_repeat: bool) -> bool {
        self.register_at(code, is_repeat, Instant::now())
    }

    /// Register a key press observed at `now`.
    ///
    /// A match consumes the window, so a third rapid press starts a new
    /// gesture instead of chaining onto the second.
    pub fn register_at(&mut self, code: u16, is_repeat: bool, now: Instant) -> bool {
        if is_repeat || code != self.trigger_code {
            return false;
        }

        match self.last_press {
            Some(last) if now.saturating_duration_since(last) < self.threshold => {
                self.last_press = None;
                true
            }
            _ => {
                self.last_press = Some(now);
                false
            }
        }
    }

    #[cfg(test)]
    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}
