use std::fmt;
use std::time::{Duration, Instant};

use crate::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Extraction,
    Enrichment,
    Pipeline,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Extraction => write!(f, "read"),
            JobKind::Enrichment => write!(f, "enrich"),
            JobKind::Pipeline => write!(f, "pipeline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentProgress {
    pub keys_done: usize,
    pub keys_total: usize,
    pub pending: usize,
    pub queued_completions: usize,
    pub requested: usize,
    pub max_requests: usize,
    pub rows_updated: usize,
    pub elapsed: Duration,
    pub max_runtime: Duration,
}

/// Snapshot of a job's counters, rendered into one status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressReport {
    Extraction { position: usize, total: usize },
    Enrichment(EnrichmentProgress),
    Pipeline { stage: Stage, elapsed: Duration },
}

impl ProgressReport {
    pub fn kind(&self) -> JobKind {
        match self {
            ProgressReport::Extraction { .. } => JobKind::Extraction,
            ProgressReport::Enrichment(_) => JobKind::Enrichment,
            ProgressReport::Pipeline { .. } => JobKind::Pipeline,
        }
    }

    pub fn percent(&self) -> u32 {
        match self {
            ProgressReport::Extraction { position, total } => percent(*position, *total),
            ProgressReport::Enrichment(p) => percent(p.keys_done, p.keys_total),
            ProgressReport::Pipeline { .. } => 0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ProgressReport::Extraction { position, total } => format!(
                "Reading auctions: {position}/{total} ({}%)",
                self.percent()
            ),
            ProgressReport::Enrichment(p) => format!(
                "Enriching items: {}/{} ({}%), pending {}, queued {}, requested {}/{}, rows updated {}, elapsed {}s/{}s",
                p.keys_done,
                p.keys_total,
                self.percent(),
                p.pending,
                p.queued_completions,
                p.requested,
                p.max_requests,
                p.rows_updated,
                p.elapsed.as_secs(),
                p.max_runtime.as_secs()
            ),
            ProgressReport::Pipeline { stage, elapsed } => {
                format!("Pipeline: {stage} ({}s elapsed)", elapsed.as_secs())
            }
        }
    }
}

/// Integer percentage, 0 when `total` is 0, never above 100.
pub fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = done.min(total) as u128 * 100 / total as u128;
    pct as u32
}

/// Rate limits progress lines for a single job.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// The first call always emits; later calls emit when forced or when
    /// `interval` has passed since the previous emission.
    pub fn should_emit(&mut self, now: Instant, forced: bool) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if forced || due {
            self.last = Some(now);
            true
        } else {
            false
        }
    }
}
