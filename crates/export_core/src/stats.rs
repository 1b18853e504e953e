use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome counters of one enrichment job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichStats {
    pub keys_total: usize,
    pub rows_needing: usize,
    pub rows_updated: usize,
    pub requested: usize,
    pub failed_lookups: usize,
    pub unresolved_rows: usize,
    pub rows_without_key: usize,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

impl fmt::Display for EnrichStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.timed_out {
            "timed out"
        } else {
            "finished"
        };
        write!(
            f,
            "Enrichment {verdict} after {:.1}s: {} items, {} lookups requested, {} rows updated, {} rows unresolved, {} rows without an item key",
            self.elapsed_ms as f64 / 1000.0,
            self.keys_total,
            self.requested,
            self.rows_updated,
            self.unresolved_rows,
            self.rows_without_key
        )
    }
}

/// Counters of the cache-only pass run at the end of a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalPassStats {
    pub rows_checked: usize,
    pub rows_filled: usize,
    pub still_missing: usize,
    pub without_key: usize,
}

/// Closing summary printed when a pipeline finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub row_count: usize,
    pub final_pass: FinalPassStats,
    pub enrich: Option<EnrichStats>,
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scan complete: {} rows, {} still missing info ({} without an item key), final pass filled {}",
            self.row_count,
            self.final_pass.still_missing,
            self.final_pass.without_key,
            self.final_pass.rows_filled
        )?;
        if let Some(enrich) = &self.enrich {
            write!(
                f,
                "; lookups requested {}, rows updated {}",
                enrich.requested, enrich.rows_updated
            )?;
            if enrich.timed_out {
                f.write_str(", enrichment timed out")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EnrichStats, FinalPassStats, ScanSummary};

    #[test]
    fn summary_mentions_timeout() {
        let summary = ScanSummary {
            row_count: 10,
            final_pass: FinalPassStats {
                rows_checked: 4,
                rows_filled: 1,
                still_missing: 3,
                without_key: 2,
            },
            enrich: Some(EnrichStats {
                requested: 5,
                rows_updated: 6,
                timed_out: true,
                ..EnrichStats::default()
            }),
        };
        assert_eq!(
            summary.to_string(),
            "Scan complete: 10 rows, 3 still missing info (2 without an item key), final pass filled 1; lookups requested 5, rows updated 6, enrichment timed out"
        );
    }
}
