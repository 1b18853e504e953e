use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shortest interval a job may re-schedule itself with.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Longest delay or interval a fractional-seconds setting can produce.
pub const MAX_SETTING_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Static configuration read by every job when it starts.
///
/// Every field has a default so a partial settings file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum units of work per tick.
    pub batch_size: usize,
    /// Wall-clock budget per tick, in milliseconds.
    pub tick_budget_ms: u64,
    /// Seconds between enrichment ticks.
    pub enrich_tick_sec: f64,
    /// Asynchronous lookups a single enrichment tick may issue.
    pub requests_per_tick: usize,
    /// Asynchronous lookups a whole enrichment job may issue.
    pub max_requests: usize,
    /// Hard ceiling on enrichment runtime.
    pub max_runtime_sec: u64,
    /// Continue into the next phase after a standalone scan or read.
    pub auto_chain: bool,
    /// Minimum seconds between unforced progress lines.
    pub progress_interval_sec: u64,
    /// Seconds between readiness polls while waiting for a scan.
    pub scan_poll_sec: f64,
    /// Give up waiting for scan readiness after this many seconds.
    pub scan_timeout_sec: u64,
    /// A readiness signal younger than this triggers the "recently ran" prompt.
    pub scan_cooldown_sec: u64,
    /// Waiting longer than this marks the scan as likely throttled.
    pub throttle_hint_sec: u64,
    /// Delay before the final reconciliation pass.
    pub post_read_delay_sec: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: 200,
            tick_budget_ms: 10,
            enrich_tick_sec: 0.5,
            requests_per_tick: 25,
            max_requests: 2000,
            max_runtime_sec: 120,
            auto_chain: false,
            progress_interval_sec: 5,
            scan_poll_sec: 2.0,
            scan_timeout_sec: 180,
            scan_cooldown_sec: 900,
            throttle_hint_sec: 20,
            post_read_delay_sec: 1.0,
        }
    }
}

impl Settings {
    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn tick_budget(&self) -> Duration {
        Duration::from_millis(self.tick_budget_ms)
    }

    pub fn enrich_tick_interval(&self) -> Duration {
        clamped_interval(self.enrich_tick_sec)
    }

    pub fn scan_poll_interval(&self) -> Duration {
        clamped_interval(self.scan_poll_sec)
    }

    pub fn max_runtime(&self) -> Duration {
        Duration::from_secs(self.max_runtime_sec)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_sec)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_sec)
    }

    pub fn scan_cooldown(&self) -> Duration {
        Duration::from_secs(self.scan_cooldown_sec)
    }

    pub fn throttle_hint_after(&self) -> Duration {
        Duration::from_secs(self.throttle_hint_sec)
    }

    pub fn post_read_delay(&self) -> Duration {
        seconds(self.post_read_delay_sec)
    }
}

fn clamped_interval(secs: f64) -> Duration {
    seconds(secs).max(MIN_TICK_INTERVAL)
}

fn seconds(secs: f64) -> Duration {
    if !(secs.is_finite() && secs > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs)
        .unwrap_or(MAX_SETTING_DELAY)
        .min(MAX_SETTING_DELAY)
}
