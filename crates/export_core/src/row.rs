use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quality value the host uses for "not known yet".
pub const UNKNOWN_QUALITY: i16 = -1;

/// Numeric item id shared by every listing of the same item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(pub u32);

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One exported auction listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Source position, unique within a scan.
    pub index: u32,
    #[serde(rename = "itemId")]
    pub item_key: Option<ItemKey>,
    pub name: Option<String>,
    #[serde(rename = "itemLink")]
    pub link: Option<String>,
    #[serde(with = "quality_sentinel")]
    pub quality: Option<u8>,
    #[serde(rename = "count")]
    pub quantity: u32,
    pub time_left: Option<u8>,
    #[serde(rename = "minBidCopper")]
    pub min_bid: u64,
    #[serde(rename = "buyoutCopper")]
    pub buyout: u64,
    #[serde(rename = "scannedAtUtc")]
    pub scanned_at: DateTime<Utc>,
    #[serde(rename = "hasAllInfo")]
    pub has_complete_info: Option<bool>,
}

impl Row {
    /// True when any of name, link or quality is still unknown.
    pub fn missing_any_info(&self) -> bool {
        self.name.is_none() || self.link.is_none() || self.quality.is_none()
    }

    /// Rows without an item key can never be enriched.
    pub fn needs_enrichment(&self) -> bool {
        self.item_key.is_some() && self.missing_any_info()
    }
}

/// Whatever the host's item cache currently knows about a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialInfo {
    pub name: Option<String>,
    pub link: Option<String>,
    pub quality: Option<u8>,
}

/// Merge cached item info into a row, keeping any value the row already has.
///
/// Returns whether the row changed; a fully filled row is left untouched.
pub fn fill_from_cache(row: &mut Row, info: &PartialInfo) -> bool {
    let mut changed = false;
    if row.name.is_none() {
        if let Some(name) = info.name.as_deref().filter(|n| !n.is_empty()) {
            row.name = Some(name.to_string());
            changed = true;
        }
    }
    if row.link.is_none() {
        if let Some(link) = info.link.as_deref().filter(|l| !l.is_empty()) {
            row.link = Some(link.to_string());
            changed = true;
        }
    }
    if row.quality.is_none() && info.quality.is_some() {
        row.quality = info.quality;
        changed = true;
    }
    changed
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowCounts {
    pub total: usize,
    pub missing_info: usize,
    pub without_key: usize,
}

pub fn count_rows(rows: &[Row]) -> RowCounts {
    rows.iter().fold(
        RowCounts {
            total: rows.len(),
            ..RowCounts::default()
        },
        |mut counts, row| {
            if row.missing_any_info() {
                counts.missing_info += 1;
                if row.item_key.is_none() {
                    counts.without_key += 1;
                }
            }
            counts
        },
    )
}

mod quality_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::UNKNOWN_QUALITY;

    pub fn serialize<S: Serializer>(quality: &Option<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i16(quality.map_or(UNKNOWN_QUALITY, i16::from))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        let raw = i16::deserialize(deserializer)?;
        Ok(u8::try_from(raw).ok())
    }
}
