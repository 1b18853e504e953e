use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EnrichStats, FinalPassStats, Row};

/// The persisted form of a scan result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub timestamp: DateTime<Utc>,
    pub row_count: usize,
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrich_stats: Option<EnrichStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_pass: Option<FinalPassStats>,
}
