use std::time::Instant;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Start the run; `scan_view_open` is the host's precondition for scanning.
    Begin {
        now: Instant,
        scan_view_open: bool,
        last_ready_at: Option<Instant>,
    },
    /// Answer to the "scanned recently" confirmation prompt.
    ConfirmationAnswered { proceed: bool, now: Instant },
    /// Host readiness notification. May be unrelated to our request.
    ScanReady { now: Instant },
    /// The pipeline's own timer fired while no stage job was running.
    /// `data_available` is the result of polling the host.
    Wake { now: Instant, data_available: bool },
    /// The extraction job produced a new scan result.
    ExtractionFinished {
        now: Instant,
        scanned_at: DateTime<Utc>,
        row_count: usize,
    },
    /// The enrichment job ended; `completed` is false on timeout.
    EnrichmentFinished { now: Instant, completed: bool },
    /// The final cache-only pass ran.
    FinalPassFinished {
        now: Instant,
        summary: crate::ScanSummary,
    },
    /// User cancelled the run.
    Cancel,
}
