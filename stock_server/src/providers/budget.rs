//! Per-provider request budget over a fixed window.
//!
//! The window is reset lazily: the first access after `window` has elapsed
//! starts a new window with an empty counter. There is no background timer.

use std::time::{Duration, Instant};

/// Request counter for one provider.
#[derive(Debug, Clone)]
pub struct ProviderBudget {
    ceiling: u32,
    window: Duration,
    used: u32,
    window_start: Instant,
}

impl ProviderBudget {
    /// Budget allowing `ceiling` requests per `window`, starting now.
    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self::starting_at(ceiling, window, Instant::now())
    }

    /// Budget whose first window starts at `start`.
    pub fn starting_at(ceiling: u32, window: Duration, start: Instant) -> Self {
        Self {
            ceiling,
            window,
            used: 0,
            window_start: start,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.used = 0;
        }
    }

    /// Consume `cost` units at `now` if the current window can afford them.
    ///
    /// Returns `false` and leaves the counter untouched otherwise. A zero cost
    /// always succeeds.
    pub fn try_consume_at(&mut self, cost: u32, now: Instant) -> bool {
        self.roll(now);
        match self.used.checked_add(cost) {
            Some(total) if total <= self.ceiling => {
                self.used = total;
                true
            }
            _ => false,
        }
    }

    /// [`Self::try_consume_at`] with the current time.
    pub fn try_consume(&mut self, cost: u32) -> bool {
        self.try_consume_at(cost, Instant::now())
    }

    /// Units left in the window that is current at `now`.
    pub fn remaining_at(&mut self, now: Instant) -> u32 {
        self.roll(now);
        self.ceiling - self.used
    }

    /// Units used in the current window.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Configured ceiling.
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }
}
