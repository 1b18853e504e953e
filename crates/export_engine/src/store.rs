use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use export_core::{count_rows, EnrichStats, FinalPassStats, Row, RowCounts, ScanSnapshot};

/// Row slice shared between the live scan result and the job working on it.
///
/// Jobs compare slices with [`Rc::ptr_eq`]; a job holding an older slice
/// cannot write into a newer scan.
pub type SharedRows = Rc<RefCell<Vec<Row>>>;

#[derive(Debug)]
pub struct ScanResult {
    timestamp: DateTime<Utc>,
    rows: SharedRows,
    enrich_stats: Option<EnrichStats>,
    final_pass: Option<FinalPassStats>,
}

impl ScanResult {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn rows(&self) -> &SharedRows {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn enrich_stats(&self) -> Option<&EnrichStats> {
        self.enrich_stats.as_ref()
    }

    pub fn final_pass(&self) -> Option<FinalPassStats> {
        self.final_pass
    }

    pub fn counts(&self) -> RowCounts {
        count_rows(&self.rows.borrow())
    }
}

/// Holds the single live scan result.
#[derive(Debug, Default)]
pub struct ScanStore {
    live: Option<ScanResult>,
}

impl ScanStore {
    /// Install a fresh scan. Jobs bound to the previous rows lose write access.
    pub fn replace(&mut self, timestamp: DateTime<Utc>, rows: Vec<Row>) -> SharedRows {
        let rows = Rc::new(RefCell::new(rows));
        self.live = Some(ScanResult {
            timestamp,
            rows: Rc::clone(&rows),
            enrich_stats: None,
            final_pass: None,
        });
        rows
    }

    pub fn restore(&mut self, snapshot: ScanSnapshot) {
        self.live = Some(ScanResult {
            timestamp: snapshot.timestamp,
            rows: Rc::new(RefCell::new(snapshot.rows)),
            enrich_stats: snapshot.enrich_stats,
            final_pass: snapshot.final_pass,
        });
    }

    pub fn live(&self) -> Option<&ScanResult> {
        self.live.as_ref()
    }

    pub fn rows(&self) -> Option<SharedRows> {
        self.live.as_ref().map(|live| Rc::clone(&live.rows))
    }

    /// True when `rows` is the slice of the live scan.
    pub fn is_live(&self, rows: &SharedRows) -> bool {
        self.live
            .as_ref()
            .is_some_and(|live| Rc::ptr_eq(&live.rows, rows))
    }

    /// Store stats from an enrichment job; ignored unless `rows` is still live.
    pub fn record_enrich_stats(&mut self, rows: &SharedRows, stats: EnrichStats) -> bool {
        match self.live.as_mut() {
            Some(live) if Rc::ptr_eq(&live.rows, rows) => {
                live.enrich_stats = Some(stats);
                true
            }
            _ => false,
        }
    }

    pub fn record_final_pass(&mut self, rows: &SharedRows, stats: FinalPassStats) -> bool {
        match self.live.as_mut() {
            Some(live) if Rc::ptr_eq(&live.rows, rows) => {
                live.final_pass = Some(stats);
                true
            }
            _ => false,
        }
    }

    /// Drop the live scan. Returns whether there was one.
    pub fn clear(&mut self) -> bool {
        self.live.take().is_some()
    }

    pub fn snapshot(&self) -> Option<ScanSnapshot> {
        self.live.as_ref().map(|live| {
            let rows = live.rows.borrow().clone();
            ScanSnapshot {
                timestamp: live.timestamp,
                row_count: rows.len(),
                rows,
                enrich_stats: live.enrich_stats.clone(),
                final_pass: live.final_pass,
            }
        })
    }
}
