//! Filling missing item info through the host's rate-limited lookup service.
//!
//! Requests are deduplicated by item key, but a completion must reach every
//! row sharing that key. The completion path therefore only records the key
//! in a [`CompletionInbox`]; correlating it back to rows happens on the next
//! budgeted tick.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_info};
use export_core::{
    fill_from_cache, EnrichStats, EnrichmentProgress, ItemKey, ProgressReport, ProgressThrottle,
    Settings,
};

use crate::budget::TickBudget;
use crate::clock::Clock;
use crate::host::{ItemLookup, UserChannel};
use crate::store::SharedRows;

/// Keys with an outstanding request, and completions not yet drained.
#[derive(Debug, Default)]
pub struct CompletionInbox {
    pending: HashSet<ItemKey>,
    queue: VecDeque<(ItemKey, bool)>,
}

impl CompletionInbox {
    pub fn mark_pending(&mut self, key: ItemKey) {
        self.pending.insert(key);
    }

    /// Constant time. Completions for keys we never asked about, or already
    /// accepted, are dropped.
    pub fn accept(&mut self, key: ItemKey, success: bool) -> bool {
        if self.pending.remove(&key) {
            self.queue.push_back((key, success));
            true
        } else {
            false
        }
    }

    fn pop(&mut self) -> Option<(ItemKey, bool)> {
        self.queue.pop_front()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Requests whose completion has not been drained yet.
    pub fn pending_count(&self) -> usize {
        self.pending.len() + self.queue.len()
    }
}

#[derive(Debug)]
pub enum Prepared {
    /// No row needs enrichment; the stats are final.
    Nothing(EnrichStats),
    Job(EnrichmentJob),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentTick {
    Continue,
    Finished(EnrichStats),
    TimedOut(EnrichStats),
}

#[derive(Debug)]
pub struct EnrichmentJob {
    rows: SharedRows,
    work_queue: Vec<ItemKey>,
    queue_head: usize,
    rows_by_key: HashMap<ItemKey, Vec<usize>>,
    inbox: CompletionInbox,
    requested_ever: HashSet<ItemKey>,
    updated_rows: HashSet<usize>,
    stats: EnrichStats,
    started_at: Instant,
    budget: TickBudget,
    requests_per_tick: usize,
    max_requests: usize,
    max_runtime: Duration,
    throttle: ProgressThrottle,
    announced: bool,
}

impl EnrichmentJob {
    /// Group the rows needing enrichment by key, in first-seen order.
    pub fn prepare(rows: SharedRows, settings: &Settings, now: Instant) -> Prepared {
        let mut work_queue = Vec::new();
        let mut rows_by_key: HashMap<ItemKey, Vec<usize>> = HashMap::new();
        let mut stats = EnrichStats::default();
        for (position, row) in rows.borrow().iter().enumerate() {
            if !row.missing_any_info() {
                continue;
            }
            let Some(key) = row.item_key else {
                stats.rows_without_key += 1;
                continue;
            };
            stats.rows_needing += 1;
            rows_by_key
                .entry(key)
                .or_insert_with(|| {
                    work_queue.push(key);
                    Vec::new()
                })
                .push(position);
        }
        stats.keys_total = work_queue.len();

        if work_queue.is_empty() {
            return Prepared::Nothing(stats);
        }
        engine_info!(
            "enrichment prepared: {} rows across {} items",
            stats.rows_needing,
            stats.keys_total
        );
        Prepared::Job(Self {
            rows,
            work_queue,
            queue_head: 0,
            rows_by_key,
            inbox: CompletionInbox::default(),
            requested_ever: HashSet::new(),
            updated_rows: HashSet::new(),
            stats,
            started_at: now,
            budget: TickBudget::from_settings(settings),
            requests_per_tick: settings.requests_per_tick,
            max_requests: settings.max_requests,
            max_runtime: settings.max_runtime(),
            throttle: ProgressThrottle::new(settings.progress_interval()),
            announced: false,
        })
    }

    pub fn rows(&self) -> &SharedRows {
        &self.rows
    }

    pub fn pending_count(&self) -> usize {
        self.inbox.pending_count()
    }

    pub fn requested(&self) -> usize {
        self.stats.requested
    }

    /// Entry point for the host's completion event.
    pub fn accept_completion(&mut self, key: ItemKey, success: bool) -> bool {
        self.inbox.accept(key, success)
    }

    pub fn progress(&self, now: Instant) -> ProgressReport {
        ProgressReport::Enrichment(EnrichmentProgress {
            keys_done: self.queue_head,
            keys_total: self.work_queue.len(),
            pending: self.inbox.pending_count(),
            queued_completions: self.inbox.queued(),
            requested: self.stats.requested,
            max_requests: self.max_requests,
            rows_updated: self.updated_rows.len(),
            elapsed: now.saturating_duration_since(self.started_at),
            max_runtime: self.max_runtime,
        })
    }

    pub fn tick<L, U>(&mut self, lookup: &L, user: &U, clock: &dyn Clock) -> EnrichmentTick
    where
        L: ItemLookup + ?Sized,
        U: UserChannel + ?Sized,
    {
        let tick_start = clock.now();
        if tick_start.saturating_duration_since(self.started_at) >= self.max_runtime {
            engine_info!(
                "enrichment timed out with {} requests pending",
                self.inbox.pending_count()
            );
            let stats = self.finish(tick_start, true);
            self.report(user, tick_start, true);
            return EnrichmentTick::TimedOut(stats);
        }
        if !self.announced {
            self.announced = true;
            self.report(user, tick_start, true);
        }

        let mut units = 0;
        while !self.budget.exhausted(units, tick_start, clock.now()) {
            let Some((key, success)) = self.inbox.pop() else {
                break;
            };
            units += 1;
            if !success {
                self.stats.failed_lookups += 1;
            }
            self.refill_key(key, lookup);
        }

        let mut issued = 0;
        while self.queue_head < self.work_queue.len()
            && !self.budget.exhausted(units, tick_start, clock.now())
        {
            let key = self.work_queue[self.queue_head];
            units += 1;
            if !self.refill_key(key, lookup) || self.requested_ever.contains(&key) {
                self.queue_head += 1;
                continue;
            }
            if issued >= self.requests_per_tick || self.stats.requested >= self.max_requests {
                break;
            }
            lookup.request_lookup(key);
            self.inbox.mark_pending(key);
            self.requested_ever.insert(key);
            self.stats.requested += 1;
            issued += 1;
            self.queue_head += 1;
        }
        engine_debug!(
            "enrichment tick: {units} units, {issued} requests, {}/{} keys, {} pending",
            self.queue_head,
            self.work_queue.len(),
            self.inbox.pending_count()
        );

        let now = clock.now();
        if self.queue_head >= self.work_queue.len() && self.inbox.pending_count() == 0 {
            let keys: Vec<ItemKey> = self.rows_by_key.keys().copied().collect();
            for key in keys {
                self.refill_key(key, lookup);
            }
            let stats = self.finish(now, false);
            self.report(user, now, true);
            return EnrichmentTick::Finished(stats);
        }
        self.report(user, now, false);
        EnrichmentTick::Continue
    }

    /// Fill every row mapped to `key` from the cache. Returns whether any of
    /// them still needs enrichment; the mapping is dropped once none does.
    fn refill_key<L: ItemLookup + ?Sized>(&mut self, key: ItemKey, lookup: &L) -> bool {
        let Some(positions) = self.rows_by_key.get(&key) else {
            return false;
        };
        let info = lookup.cached(key);
        let mut rows = self.rows.borrow_mut();
        let mut still_needed = false;
        for &position in positions {
            let Some(row) = rows.get_mut(position) else {
                continue;
            };
            if let Some(info) = &info {
                if fill_from_cache(row, info) {
                    self.updated_rows.insert(position);
                }
            }
            still_needed |= row.needs_enrichment();
        }
        drop(rows);
        if !still_needed {
            self.rows_by_key.remove(&key);
        }
        still_needed
    }

    fn finish(&mut self, now: Instant, timed_out: bool) -> EnrichStats {
        let rows = self.rows.borrow();
        self.stats.unresolved_rows = self
            .rows_by_key
            .values()
            .flatten()
            .filter(|&&position| rows.get(position).is_some_and(|row| row.needs_enrichment()))
            .count();
        drop(rows);
        self.stats.rows_updated = self.updated_rows.len();
        self.stats.timed_out = timed_out;
        self.stats.elapsed_ms =
            u64::try_from(now.saturating_duration_since(self.started_at).as_millis())
                .unwrap_or(u64::MAX);
        self.stats.clone()
    }

    fn report<U: UserChannel + ?Sized>(&mut self, user: &U, now: Instant, forced: bool) {
        if self.throttle.should_emit(now, forced) {
            user.notify(&self.progress(now).message());
        }
    }
}
