use chrono::{DateTime, Utc};
use engine_logging::engine_debug;
use export_core::{ProgressReport, ProgressThrottle, RecordDecoder, Row, Settings};

use crate::budget::TickBudget;
use crate::clock::Clock;
use crate::host::{AuctionSource, UserChannel};

#[derive(Debug, PartialEq, Eq)]
pub enum ExtractionTick {
    Continue,
    /// All records read; the rows become the new scan result.
    Finished(Vec<Row>),
}

/// Pulls records `1..=total` from the host in budgeted ticks.
#[derive(Debug)]
pub struct ExtractionJob {
    next_index: usize,
    total: usize,
    rows: Vec<Row>,
    scanned_at: DateTime<Utc>,
    budget: TickBudget,
    throttle: ProgressThrottle,
    announced: bool,
}

impl ExtractionJob {
    pub fn new(total: usize, scanned_at: DateTime<Utc>, settings: &Settings) -> Self {
        Self {
            next_index: 1,
            total,
            rows: Vec::with_capacity(total),
            scanned_at,
            budget: TickBudget::from_settings(settings),
            throttle: ProgressThrottle::new(settings.progress_interval()),
            announced: false,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn position(&self) -> usize {
        self.rows.len()
    }

    pub fn scanned_at(&self) -> DateTime<Utc> {
        self.scanned_at
    }

    pub fn progress(&self) -> ProgressReport {
        ProgressReport::Extraction {
            position: self.position(),
            total: self.total,
        }
    }

    pub fn tick<S, U>(
        &mut self,
        source: &S,
        user: &U,
        decoder: &RecordDecoder,
        clock: &dyn Clock,
    ) -> ExtractionTick
    where
        S: AuctionSource + ?Sized,
        U: UserChannel + ?Sized,
    {
        let tick_start = clock.now();
        if !self.announced {
            self.announced = true;
            self.report(user, clock, true);
        }

        let mut units = 0;
        while self.next_index <= self.total
            && !self.budget.exhausted(units, tick_start, clock.now())
        {
            let record = source.record_at(self.next_index);
            let index = u32::try_from(self.next_index).unwrap_or(u32::MAX);
            self.rows.push(decoder.decode(index, &record, self.scanned_at));
            self.next_index += 1;
            units += 1;
        }
        engine_debug!(
            "extraction tick read {units} records ({}/{})",
            self.position(),
            self.total
        );

        if self.next_index > self.total {
            self.report(user, clock, true);
            return ExtractionTick::Finished(std::mem::take(&mut self.rows));
        }
        self.report(user, clock, false);
        ExtractionTick::Continue
    }

    fn report<U: UserChannel + ?Sized>(&mut self, user: &U, clock: &dyn Clock, forced: bool) {
        if self.throttle.should_emit(clock.now(), forced) {
            user.notify(&self.progress().message());
        }
    }
}
