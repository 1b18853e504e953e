//! The single-job cooperative scheduler.
//!
//! At most one job is active. Every start, chain or cancel bumps a
//! generation counter; a [`Wake`] ticket from an older generation no-ops.
//! Jobs never arm their own timers: each tick returns how long until the
//! next one and the scheduler stores that as the active job's wake instant.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use export_core::{
    fill_from_cache, update, Command, Effect, EnrichStats, FinalPassStats, ItemKey, JobKind, Msg,
    PartialInfo, PipelineState, RecordDecoder, Row, RunMode, ScanSnapshot, ScanSummary, Settings,
    Stage, MAX_SETTING_DELAY,
};
use thiserror::Error;

use crate::clock::Clock;
use crate::enrichment::{EnrichmentJob, EnrichmentTick, Prepared};
use crate::extraction::{ExtractionJob, ExtractionTick};
use crate::host::{Host, HostEvent};
use crate::persist::{PersistError, SnapshotStore};
use crate::store::{ScanStore, SharedRows};

/// Why a command could not start. Nothing was changed when one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("the auction house is not open")]
    ScanViewClosed,
    #[error("no scan data is available; request a scan first")]
    NoScanData,
    #[error("there is no scan to enrich; read the auctions first")]
    NoScanToEnrich,
    #[error("the item lookup service is unavailable")]
    LookupUnavailable,
    #[error("the scan request was declined")]
    ConfirmationDeclined,
}

/// How the most recent job ended. Cancelled jobs leave no outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOutcome {
    pub kind: JobKind,
    pub success: bool,
}

/// When the active job wants to run next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wake {
    pub generation: u64,
    pub at: Instant,
}

enum StageJob {
    Extraction(ExtractionJob),
    Enrichment(EnrichmentJob),
}

struct PipelineJob {
    state: PipelineState,
    stage_job: Option<StageJob>,
}

enum Job {
    Extraction {
        job: ExtractionJob,
        then_enrich: bool,
    },
    Enrichment(EnrichmentJob),
    Pipeline(PipelineJob),
}

impl Job {
    fn kind(&self) -> JobKind {
        match self {
            Job::Extraction { .. } => JobKind::Extraction,
            Job::Enrichment(_) => JobKind::Enrichment,
            Job::Pipeline(_) => JobKind::Pipeline,
        }
    }
}

enum Next {
    /// Same job continues; `None` keeps the current wake instant.
    Keep(Job, Option<Duration>),
    /// A successor job takes over under a new generation.
    Chain(Job, Duration),
    Stop,
}

pub struct Scheduler<H: Host, C: Clock> {
    host: H,
    clock: C,
    settings: Settings,
    decoder: RecordDecoder,
    job: Option<Job>,
    generation: u64,
    next_wake: Option<Instant>,
    store: ScanStore,
    snapshots: Option<Box<dyn SnapshotStore>>,
    last_ready_at: Option<Instant>,
    last_outcome: Option<JobOutcome>,
    events_tx: Sender<HostEvent>,
    events_rx: Receiver<HostEvent>,
    polls: u64,
}

impl<H: Host, C: Clock> Scheduler<H, C> {
    pub fn new(host: H, clock: C, settings: Settings) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            host,
            clock,
            settings,
            decoder: RecordDecoder::default(),
            job: None,
            generation: 0,
            next_wake: None,
            store: ScanStore::default(),
            snapshots: None,
            last_ready_at: None,
            last_outcome: None,
            events_tx,
            events_rx,
            polls: 0,
        }
    }

    pub fn with_decoder(mut self, decoder: RecordDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_snapshot_store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Load the last saved scan from the snapshot store, if any.
    pub fn restore_from_store(&mut self) -> Result<bool, PersistError> {
        let Some(store) = &self.snapshots else {
            return Ok(false);
        };
        match store.load()? {
            Some(snapshot) => {
                self.restore(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn restore(&mut self, snapshot: ScanSnapshot) {
        engine_info!(
            "restored scan from {} with {} rows",
            snapshot.timestamp,
            snapshot.row_count
        );
        self.store.restore(snapshot);
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ScanStore {
        &self.store
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active_kind(&self) -> Option<JobKind> {
        self.job.as_ref().map(Job::kind)
    }

    pub fn pipeline_stage(&self) -> Option<Stage> {
        match &self.job {
            Some(Job::Pipeline(p)) => Some(p.state.stage()),
            _ => None,
        }
    }

    pub fn last_outcome(&self) -> Option<JobOutcome> {
        self.last_outcome
    }

    pub fn next_wake(&self) -> Option<Wake> {
        self.next_wake.map(|at| Wake {
            generation: self.generation,
            at,
        })
    }

    /// Sender for host notifications arriving from other threads; drained by [`poll`](Self::poll).
    pub fn event_sender(&self) -> Sender<HostEvent> {
        self.events_tx.clone()
    }

    pub fn execute(&mut self, command: Command) -> Result<(), StartError> {
        engine_info!("command: {command}");
        match command {
            Command::Run => self.start_pipeline(RunMode::Full),
            Command::ScanOnly => self.start_pipeline(RunMode::ScanOnly),
            Command::ReadOnly => self.start_read(),
            Command::EnrichOnly => self.start_enrich(),
            Command::Cancel => {
                self.cancel();
                Ok(())
            }
            Command::Clear => {
                self.clear();
                Ok(())
            }
            Command::Status => {
                self.status();
                Ok(())
            }
        }
    }

    /// Drain queued host events, run the active job if it is due, and
    /// report when it wants to run next.
    pub fn poll(&mut self) -> Option<Wake> {
        self.polls += 1;
        engine_logging::set_scheduler_tick(self.polls);
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
        if self.next_wake.is_some_and(|at| self.clock.now() >= at) {
            self.run_active();
        }
        self.next_wake()
    }

    /// Run the active job now if `generation` is still current.
    pub fn wake(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.job.is_none() {
            engine_debug!(
                "stale wake for generation {generation} (current {})",
                self.generation
            );
            return false;
        }
        self.run_active();
        true
    }

    /// Direct event path: a membership check and a queue append for
    /// lookups, a stage transition for readiness.
    pub fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::LookupCompleted { key, success } => {
                let accepted = match &mut self.job {
                    Some(Job::Enrichment(job))
                    | Some(Job::Pipeline(PipelineJob {
                        stage_job: Some(StageJob::Enrichment(job)),
                        ..
                    })) => job.accept_completion(key, success),
                    _ => false,
                };
                if !accepted {
                    engine_trace!("ignoring completion for item {key}");
                }
            }
            HostEvent::ScanReady => {
                let waiting = matches!(
                    &self.job,
                    Some(Job::Pipeline(p)) if p.state.readiness().is_waiting()
                );
                if !waiting {
                    engine_debug!("ignoring scan-ready event; no scan requested");
                    return;
                }
                let Some(Job::Pipeline(pipeline)) = self.job.take() else {
                    return;
                };
                let now = self.clock.now();
                let next = self.step_pipeline(pipeline, Msg::ScanReady { now });
                self.settle(next);
            }
        }
    }

    /// Drop the active job and its readiness tracker. Returns its kind.
    pub fn cancel(&mut self) -> Option<JobKind> {
        let Some(job) = self.job.take() else {
            self.notify("Nothing to cancel.");
            return None;
        };
        let kind = job.kind();
        if let Job::Pipeline(pipeline) = job {
            let stage = pipeline.state.stage();
            let (state, _) = update(pipeline.state, Msg::Cancel);
            engine_debug!("pipeline cancelled during {stage}, now {}", state.stage());
        }
        self.generation += 1;
        self.next_wake = None;
        self.notify(&format!("Cancelled the active {kind} job."));
        Some(kind)
    }

    pub fn clear(&mut self) {
        let had_scan = self.store.clear();
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.clear() {
                engine_error!("failed to remove saved scan: {e}");
            }
        }
        if had_scan {
            self.notify("Cleared the stored scan.");
        } else {
            self.notify("No stored scan to clear.");
        }
    }

    pub fn status(&self) {
        let now = self.clock.now();
        match &self.job {
            None => self.notify("No active job."),
            Some(Job::Extraction { job, .. }) => self.notify(&job.progress().message()),
            Some(Job::Enrichment(job)) => self.notify(&job.progress(now).message()),
            Some(Job::Pipeline(pipeline)) => {
                self.notify(&pipeline.state.progress(now).message());
                match &pipeline.stage_job {
                    Some(StageJob::Extraction(job)) => self.notify(&job.progress().message()),
                    Some(StageJob::Enrichment(job)) => self.notify(&job.progress(now).message()),
                    None => {}
                }
            }
        }
        self.notify(&self.scan_line());
        if let Some(outcome) = self.last_outcome {
            let verdict = if outcome.success { "succeeded" } else { "failed" };
            self.notify(&format!("Last {} job {verdict}.", outcome.kind));
        }
    }

    fn start_pipeline(&mut self, mode: RunMode) -> Result<(), StartError> {
        let now = self.clock.now();
        let view_open = self.host.scan_view_open();
        let (mut state, mut effects) = update(
            PipelineState::new(mode, now, &self.settings),
            Msg::Begin {
                now,
                scan_view_open: view_open,
                last_ready_at: self.last_ready_at,
            },
        );
        // The cooldown gate is answered before any job exists.
        let prompt = effects.iter().find_map(|effect| match effect {
            Effect::AskConfirmation { prompt } => Some(prompt.clone()),
            _ => None,
        });
        if let Some(prompt) = prompt {
            let proceed = self.host.confirm(&prompt);
            (state, effects) = update(state, Msg::ConfirmationAnswered { proceed, now });
        }

        if state.outcome() == Some(false) {
            for effect in effects {
                if let Effect::Notify(text) = effect {
                    self.notify(&text);
                }
            }
            return Err(if view_open {
                StartError::ConfirmationDeclined
            } else {
                StartError::ScanViewClosed
            });
        }

        self.begin_generation();
        let next = self.apply_pipeline_effects(
            PipelineJob {
                state,
                stage_job: None,
            },
            effects,
        );
        self.settle(next);
        Ok(())
    }

    fn start_read(&mut self) -> Result<(), StartError> {
        if !self.host.scan_view_open() {
            return self.refuse(StartError::ScanViewClosed);
        }
        if !self.host.is_scan_ready() {
            return self.refuse(StartError::NoScanData);
        }
        self.begin_generation();
        let job = self.new_extraction();
        self.notify(&format!("Reading {} auctions.", job.total()));
        let then_enrich = self.settings.auto_chain;
        self.settle(Next::Keep(
            Job::Extraction { job, then_enrich },
            Some(Duration::ZERO),
        ));
        Ok(())
    }

    fn start_enrich(&mut self) -> Result<(), StartError> {
        let Some(rows) = self.store.rows() else {
            return self.refuse(StartError::NoScanToEnrich);
        };
        if !self.host.lookup_available() {
            return self.refuse(StartError::LookupUnavailable);
        }
        self.begin_generation();
        let next = self.enrichment_job(rows);
        self.settle(next);
        Ok(())
    }

    fn refuse(&self, error: StartError) -> Result<(), StartError> {
        self.notify(&format!("Cannot start: {error}."));
        Err(error)
    }

    fn begin_generation(&mut self) {
        if let Some(old) = self.job.take() {
            engine_info!("discarding active {} job", old.kind());
        }
        self.generation += 1;
        self.next_wake = None;
    }

    fn settle(&mut self, next: Next) {
        let now = self.clock.now();
        match next {
            Next::Keep(job, delay) => {
                if let Some(delay) = delay {
                    self.next_wake = Some(wake_at(now, delay));
                }
                self.job = Some(job);
            }
            Next::Chain(job, delay) => {
                self.generation += 1;
                engine_debug!("chained into {} job", job.kind());
                self.next_wake = Some(wake_at(now, delay));
                self.job = Some(job);
            }
            Next::Stop => {
                self.job = None;
                self.next_wake = None;
            }
        }
    }

    fn run_active(&mut self) {
        self.next_wake = None;
        let Some(job) = self.job.take() else {
            return;
        };
        let next = match job {
            Job::Extraction { job, then_enrich } => self.run_extraction(job, then_enrich),
            Job::Enrichment(job) => self.run_enrichment(job),
            Job::Pipeline(pipeline) => self.run_pipeline(pipeline),
        };
        self.settle(next);
    }

    fn run_extraction(&mut self, mut job: ExtractionJob, then_enrich: bool) -> Next {
        match job.tick(&self.host, &self.host, &self.decoder, &self.clock) {
            ExtractionTick::Continue => {
                Next::Keep(Job::Extraction { job, then_enrich }, Some(Duration::ZERO))
            }
            ExtractionTick::Finished(rows) => {
                let rows = self.install_scan(job.scanned_at(), rows);
                if !then_enrich {
                    self.notify(&self.scan_line());
                    self.finish_job(JobKind::Extraction, true);
                    return Next::Stop;
                }
                if !self.host.lookup_available() {
                    self.notify(&format!(
                        "Skipping enrichment: {}.",
                        StartError::LookupUnavailable
                    ));
                    self.notify(&self.scan_line());
                    self.finish_job(JobKind::Extraction, true);
                    return Next::Stop;
                }
                match self.enrichment_job(rows) {
                    Next::Keep(job, delay) => Next::Chain(job, delay.unwrap_or(Duration::ZERO)),
                    other => other,
                }
            }
        }
    }

    /// Start enrichment over `rows`, or finish at once when nothing needs it.
    fn enrichment_job(&mut self, rows: SharedRows) -> Next {
        match EnrichmentJob::prepare(Rc::clone(&rows), &self.settings, self.clock.now()) {
            Prepared::Nothing(stats) => {
                self.complete_enrichment(&rows, stats);
                self.notify(&self.scan_line());
                self.finish_job(JobKind::Enrichment, true);
                Next::Stop
            }
            Prepared::Job(job) => Next::Keep(Job::Enrichment(job), Some(Duration::ZERO)),
        }
    }

    fn run_enrichment(&mut self, mut job: EnrichmentJob) -> Next {
        match job.tick(&self.host, &self.host, &self.clock) {
            EnrichmentTick::Continue => Next::Keep(
                Job::Enrichment(job),
                Some(self.settings.enrich_tick_interval()),
            ),
            EnrichmentTick::Finished(stats) | EnrichmentTick::TimedOut(stats) => {
                let success = !stats.timed_out;
                self.complete_enrichment(job.rows(), stats);
                self.notify(&self.scan_line());
                self.finish_job(JobKind::Enrichment, success);
                Next::Stop
            }
        }
    }

    fn run_pipeline(&mut self, mut pipeline: PipelineJob) -> Next {
        let now = self.clock.now();
        match pipeline.stage_job.take() {
            Some(StageJob::Extraction(mut job)) => {
                match job.tick(&self.host, &self.host, &self.decoder, &self.clock) {
                    ExtractionTick::Continue => {
                        pipeline.stage_job = Some(StageJob::Extraction(job));
                        Next::Keep(Job::Pipeline(pipeline), Some(Duration::ZERO))
                    }
                    ExtractionTick::Finished(rows) => {
                        let row_count = rows.len();
                        let scanned_at = job.scanned_at();
                        self.install_scan(scanned_at, rows);
                        self.step_pipeline(
                            pipeline,
                            Msg::ExtractionFinished {
                                now,
                                scanned_at,
                                row_count,
                            },
                        )
                    }
                }
            }
            Some(StageJob::Enrichment(mut job)) => match job.tick(&self.host, &self.host, &self.clock)
            {
                EnrichmentTick::Continue => {
                    pipeline.stage_job = Some(StageJob::Enrichment(job));
                    Next::Keep(
                        Job::Pipeline(pipeline),
                        Some(self.settings.enrich_tick_interval()),
                    )
                }
                EnrichmentTick::Finished(stats) | EnrichmentTick::TimedOut(stats) => {
                    let completed = !stats.timed_out;
                    self.complete_enrichment(job.rows(), stats);
                    self.step_pipeline(pipeline, Msg::EnrichmentFinished { now, completed })
                }
            },
            None => {
                let data_available = pipeline.state.stage() == Stage::WaitingScan
                    && self.host.is_scan_ready();
                self.step_pipeline(
                    pipeline,
                    Msg::Wake {
                        now,
                        data_available,
                    },
                )
            }
        }
    }

    fn step_pipeline(&mut self, mut pipeline: PipelineJob, msg: Msg) -> Next {
        let (state, effects) = update(pipeline.state, msg);
        pipeline.state = state;
        self.apply_pipeline_effects(pipeline, effects)
    }

    fn apply_pipeline_effects(&mut self, mut pipeline: PipelineJob, effects: Vec<Effect>) -> Next {
        let mut queue = VecDeque::from(effects);
        let mut delay = None;
        let mut finished = None;
        while let Some(effect) = queue.pop_front() {
            let now = self.clock.now();
            let follow_up = match effect {
                Effect::Notify(text) => {
                    self.notify(&text);
                    None
                }
                Effect::AskConfirmation { prompt } => {
                    let proceed = self.host.confirm(&prompt);
                    Some(Msg::ConfirmationAnswered { proceed, now })
                }
                Effect::RequestScan => {
                    self.host.request_bulk_scan();
                    None
                }
                Effect::ReadinessRecorded { at } => {
                    self.last_ready_at = Some(at);
                    None
                }
                Effect::StartExtraction => {
                    pipeline.stage_job = Some(StageJob::Extraction(self.new_extraction()));
                    delay = Some(Duration::ZERO);
                    None
                }
                Effect::StartEnrichment => self.start_stage_enrichment(&mut pipeline, &mut delay),
                Effect::ScheduleWake { after } => {
                    delay = Some(after);
                    None
                }
                Effect::RunFinalPass => Some(Msg::FinalPassFinished {
                    now,
                    summary: self.final_pass(),
                }),
                Effect::Finished { success } => {
                    finished = Some(success);
                    None
                }
            };
            if let Some(msg) = follow_up {
                let (state, more) = update(pipeline.state, msg);
                pipeline.state = state;
                queue.extend(more);
            }
        }

        if let Some(success) = finished {
            self.finish_job(JobKind::Pipeline, success);
            return Next::Stop;
        }
        Next::Keep(Job::Pipeline(pipeline), delay)
    }

    fn start_stage_enrichment(
        &mut self,
        pipeline: &mut PipelineJob,
        delay: &mut Option<Duration>,
    ) -> Option<Msg> {
        let now = self.clock.now();
        let Some(rows) = self.store.rows() else {
            engine_warn!("scan result vanished before enrichment");
            return Some(Msg::EnrichmentFinished {
                now,
                completed: false,
            });
        };
        if !self.host.lookup_available() {
            self.notify(&format!(
                "Skipping enrichment: {}.",
                StartError::LookupUnavailable
            ));
            return Some(Msg::EnrichmentFinished {
                now,
                completed: false,
            });
        }
        match EnrichmentJob::prepare(Rc::clone(&rows), &self.settings, now) {
            Prepared::Nothing(stats) => {
                self.complete_enrichment(&rows, stats);
                Some(Msg::EnrichmentFinished {
                    now,
                    completed: true,
                })
            }
            Prepared::Job(job) => {
                pipeline.stage_job = Some(StageJob::Enrichment(job));
                *delay = Some(Duration::ZERO);
                None
            }
        }
    }

    fn new_extraction(&self) -> ExtractionJob {
        ExtractionJob::new(
            self.host.record_count(),
            self.clock.utc_now(),
            &self.settings,
        )
    }

    fn install_scan(&mut self, scanned_at: DateTime<Utc>, rows: Vec<Row>) -> SharedRows {
        engine_info!("installing scan with {} rows", rows.len());
        let rows = self.store.replace(scanned_at, rows);
        self.save_snapshot();
        rows
    }

    fn complete_enrichment(&mut self, rows: &SharedRows, stats: EnrichStats) {
        self.notify(&stats.to_string());
        if self.store.record_enrich_stats(rows, stats) {
            self.save_snapshot();
        } else {
            engine_warn!("enrichment finished for a scan that is no longer live; stats dropped");
        }
    }

    /// Cache-only, unbudgeted pass over the live rows.
    fn final_pass(&mut self) -> ScanSummary {
        let Some(rows) = self.store.rows() else {
            return ScanSummary {
                row_count: 0,
                final_pass: FinalPassStats::default(),
                enrich: None,
            };
        };
        let mut stats = FinalPassStats::default();
        let row_count = {
            let mut guard = rows.borrow_mut();
            let mut cache: HashMap<ItemKey, Option<PartialInfo>> = HashMap::new();
            for row in guard.iter_mut() {
                if !row.missing_any_info() {
                    continue;
                }
                stats.rows_checked += 1;
                if let Some(key) = row.item_key {
                    let info = cache.entry(key).or_insert_with(|| self.host.cached(key));
                    if let Some(info) = info {
                        if fill_from_cache(row, info) {
                            stats.rows_filled += 1;
                        }
                    }
                }
                if row.missing_any_info() {
                    stats.still_missing += 1;
                    if row.item_key.is_none() {
                        stats.without_key += 1;
                    }
                }
            }
            guard.len()
        };
        engine_info!(
            "final pass filled {} of {} rows",
            stats.rows_filled,
            stats.rows_checked
        );
        if self.store.record_final_pass(&rows, stats) {
            self.save_snapshot();
        }
        ScanSummary {
            row_count,
            final_pass: stats,
            enrich: self
                .store
                .live()
                .and_then(|live| live.enrich_stats().cloned()),
        }
    }

    fn finish_job(&mut self, kind: JobKind, success: bool) {
        engine_info!("{kind} job finished (success: {success})");
        self.last_outcome = Some(JobOutcome { kind, success });
    }

    fn scan_line(&self) -> String {
        let Some(live) = self.store.live() else {
            return "No scan data stored.".to_string();
        };
        let counts = live.counts();
        let mut line = format!(
            "Scan from {}: {} rows, {} still missing info ({} without an item key)",
            live.timestamp().format("%Y-%m-%d %H:%M:%S UTC"),
            counts.total,
            counts.missing_info,
            counts.without_key
        );
        if let Some(stats) = live.enrich_stats() {
            line.push_str(&format!(
                "; lookups requested {}, rows updated {}",
                stats.requested, stats.rows_updated
            ));
            if stats.timed_out {
                line.push_str(", enrichment timed out");
            }
        }
        line
    }

    fn save_snapshot(&self) {
        let (Some(store), Some(snapshot)) = (&self.snapshots, self.store.snapshot()) else {
            return;
        };
        match store.save(&snapshot) {
            Ok(()) => engine_debug!("saved scan snapshot ({} rows)", snapshot.row_count),
            Err(e) => engine_error!("failed to save scan snapshot: {e}"),
        }
    }

    fn notify(&self, text: &str) {
        engine_info!("{text}");
        self.host.notify(text);
    }
}

/// `now + delay`, saturating instead of overflowing the platform's `Instant`.
fn wake_at(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(MAX_SETTING_DELAY))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::wake_at;

    #[test]
    fn wake_instant_never_overflows() {
        let now = Instant::now();
        assert_eq!(wake_at(now, Duration::from_secs(2)), now + Duration::from_secs(2));
        assert!(wake_at(now, Duration::MAX) >= now);
    }
}
