use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::{ProgressReport, Settings};

/// Pipeline stages, in the order a full run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scan,
    WaitingScan,
    Read,
    Enrich,
    PostRead,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Scan => "scan",
            Stage::WaitingScan => "waiting for scan",
            Stage::Read => "read",
            Stage::Enrich => "enrich",
            Stage::PostRead => "post-read",
            Stage::Done => "done",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// scan -> wait -> read -> enrich -> final pass.
    Full,
    /// scan -> wait, then stop unless auto-chaining.
    ScanOnly,
}

/// Whether a bulk scan request is outstanding and what we saw while waiting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessTracker {
    waiting: bool,
    requested_at: Option<Instant>,
    last_print_at: Option<Instant>,
    throttle_observed: bool,
}

impl ReadinessTracker {
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn requested_at(&self) -> Option<Instant> {
        self.requested_at
    }

    pub fn throttle_observed(&self) -> bool {
        self.throttle_observed
    }

    fn arm(&mut self, now: Instant) {
        *self = Self {
            waiting: true,
            requested_at: Some(now),
            last_print_at: Some(now),
            throttle_observed: false,
        };
    }

    fn stop(&mut self) {
        self.waiting = false;
    }

    fn waited(&self, now: Instant) -> Duration {
        self.requested_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default()
    }

    fn print_due(&mut self, now: Instant, interval: Duration) -> bool {
        let due = self
            .last_print_at
            .map_or(true, |last| now.saturating_duration_since(last) >= interval);
        if due {
            self.last_print_at = Some(now);
        }
        due
    }
}

/// Timing knobs the coordinator needs, copied out of [`Settings`] at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTimings {
    pub poll_interval: Duration,
    pub progress_interval: Duration,
    pub scan_timeout: Duration,
    pub scan_cooldown: Duration,
    pub throttle_hint_after: Duration,
    pub post_read_delay: Duration,
}

impl From<&Settings> for PipelineTimings {
    fn from(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.scan_poll_interval(),
            progress_interval: settings.progress_interval(),
            scan_timeout: settings.scan_timeout(),
            scan_cooldown: settings.scan_cooldown(),
            throttle_hint_after: settings.throttle_hint_after(),
            post_read_delay: settings.post_read_delay(),
        }
    }
}

/// Coordinator state for one pipeline run.
///
/// Kept deliberately small: the extraction and enrichment jobs own their own
/// counters, this only knows where in the pipeline we are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    mode: RunMode,
    stage: Stage,
    started_at: Instant,
    scan_timestamp: Option<DateTime<Utc>>,
    readiness: ReadinessTracker,
    awaiting_confirmation: bool,
    auto_chain: bool,
    timings: PipelineTimings,
    outcome: Option<bool>,
}

impl PipelineState {
    pub fn new(mode: RunMode, now: Instant, settings: &Settings) -> Self {
        Self {
            mode,
            stage: Stage::Scan,
            started_at: now,
            scan_timestamp: None,
            readiness: ReadinessTracker::default(),
            awaiting_confirmation: false,
            auto_chain: settings.auto_chain,
            timings: PipelineTimings::from(settings),
            outcome: None,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn scan_timestamp(&self) -> Option<DateTime<Utc>> {
        self.scan_timestamp
    }

    pub fn readiness(&self) -> &ReadinessTracker {
        &self.readiness
    }

    pub fn awaiting_confirmation(&self) -> bool {
        self.awaiting_confirmation
    }

    pub fn timings(&self) -> &PipelineTimings {
        &self.timings
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    /// `Some(success)` once the pipeline reached `Done`.
    pub fn outcome(&self) -> Option<bool> {
        self.outcome
    }

    pub fn progress(&self, now: Instant) -> ProgressReport {
        ProgressReport::Pipeline {
            stage: self.stage,
            elapsed: now.saturating_duration_since(self.started_at),
        }
    }

    pub(crate) fn auto_chain(&self) -> bool {
        self.auto_chain
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub(crate) fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
    }

    pub(crate) fn set_awaiting_confirmation(&mut self, awaiting: bool) {
        self.awaiting_confirmation = awaiting;
    }

    pub(crate) fn set_scan_timestamp(&mut self, at: DateTime<Utc>) {
        self.scan_timestamp = Some(at);
    }

    pub(crate) fn arm_readiness(&mut self, now: Instant) {
        self.readiness.arm(now);
    }

    pub(crate) fn stop_readiness(&mut self) {
        self.readiness.stop();
    }

    pub(crate) fn waited(&self, now: Instant) -> Duration {
        self.readiness.waited(now)
    }

    pub(crate) fn mark_throttle_observed(&mut self) -> bool {
        let first = !self.readiness.throttle_observed;
        self.readiness.throttle_observed = true;
        first
    }

    pub(crate) fn wait_print_due(&mut self, now: Instant) -> bool {
        let interval = self.timings.progress_interval;
        self.readiness.print_due(now, interval)
    }

    pub(crate) fn finish(&mut self, success: bool) {
        self.readiness.stop();
        self.awaiting_confirmation = false;
        self.stage = Stage::Done;
        self.outcome = Some(success);
    }
}
