use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Print a status line for the user.
    Notify(String),
    /// Ask the user to confirm before continuing.
    AskConfirmation { prompt: String },
    /// Fire the host's bulk scan request.
    RequestScan,
    /// Remember when data last became ready, for the cooldown gate.
    ReadinessRecorded { at: Instant },
    StartExtraction,
    StartEnrichment,
    /// Wake the pipeline again after `after`.
    ScheduleWake { after: Duration },
    /// Run the synchronous cache-only reconciliation over the live scan.
    RunFinalPass,
    /// The run reached `Done`.
    Finished { success: bool },
}
