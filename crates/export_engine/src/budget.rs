use std::time::{Duration, Instant};

use export_core::Settings;

/// Per-tick work cap: a unit count and a wall-clock allowance, whichever trips first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBudget {
    max_units: usize,
    max_elapsed: Duration,
}

impl TickBudget {
    pub fn new(max_units: usize, max_elapsed: Duration) -> Self {
        Self {
            max_units: max_units.max(1),
            max_elapsed,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.batch_size(), settings.tick_budget())
    }

    /// A tick always gets at least one unit, so a zero time budget still makes progress.
    pub fn exhausted(&self, units: usize, tick_start: Instant, now: Instant) -> bool {
        if units == 0 {
            return false;
        }
        units >= self.max_units || now.saturating_duration_since(tick_start) >= self.max_elapsed
    }
}
