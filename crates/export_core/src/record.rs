//! Turning the host's positional records into [`Row`]s.
//!
//! The host hands back one record per index as a flat list of loosely typed
//! values plus a separately fetched item link. Which position carries what is
//! described by a [`RecordLayout`]; how the item key is found is a pluggable
//! [`KeyStrategy`], because the positional fallback only holds for one record
//! shape.

use chrono::{DateTime, Utc};

use crate::row::{ItemKey, Row};

/// Item ids above this are treated as noise by the positional fallback.
const MAX_PLAUSIBLE_ITEM_ID: i64 = 10_000_000;

static NIL: FieldValue = FieldValue::Nil;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Nil,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// One record as returned by the host's indexed extraction call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub link: Option<String>,
    pub time_left: Option<u8>,
    /// Positional values; position 1 is `fields[0]`.
    pub fields: Vec<FieldValue>,
}

impl RawRecord {
    /// Value at a 1-based position, `Nil` when out of range.
    pub fn field(&self, position: usize) -> &FieldValue {
        position
            .checked_sub(1)
            .and_then(|i| self.fields.get(i))
            .unwrap_or(&NIL)
    }
}

/// 1-based positions of the values the decoder reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub name: usize,
    pub count: usize,
    pub quality: usize,
    pub min_bid: usize,
    pub min_increment: usize,
    pub buyout: usize,
    pub bid_amount: usize,
    pub item_id: usize,
    pub has_all_info: usize,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            name: 1,
            count: 3,
            quality: 4,
            min_bid: 8,
            min_increment: 9,
            buyout: 10,
            bid_amount: 11,
            item_id: 17,
            has_all_info: 18,
        }
    }
}

impl RecordLayout {
    /// Positions that carry quantities, qualities or prices.
    fn numeric_data_positions(&self) -> [usize; 6] {
        [
            self.count,
            self.quality,
            self.min_bid,
            self.min_increment,
            self.buyout,
            self.bid_amount,
        ]
    }
}

pub trait KeyStrategy {
    fn item_key(&self, record: &RawRecord) -> Option<ItemKey>;
}

/// Reads the id out of an `item:<id>:...` hyperlink.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkKeyStrategy;

impl KeyStrategy for LinkKeyStrategy {
    fn item_key(&self, record: &RawRecord) -> Option<ItemKey> {
        record.link.as_deref().and_then(parse_item_link)
    }
}

/// Scans candidate positions for the first plausible positive integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalKeyStrategy {
    candidates: Vec<usize>,
    excluded: Vec<usize>,
}

impl PositionalKeyStrategy {
    pub fn new(candidates: Vec<usize>, excluded: Vec<usize>) -> Self {
        Self {
            candidates,
            excluded,
        }
    }

    pub fn for_layout(layout: &RecordLayout) -> Self {
        let candidates = vec![layout.item_id, 16, layout.has_all_info, 15, 14];
        Self::new(candidates, layout.numeric_data_positions().to_vec())
    }
}

impl KeyStrategy for PositionalKeyStrategy {
    fn item_key(&self, record: &RawRecord) -> Option<ItemKey> {
        self.candidates
            .iter()
            .filter(|pos| !self.excluded.contains(*pos))
            .filter_map(|pos| record.field(*pos).as_int())
            .find(|v| *v > 0 && *v < MAX_PLAUSIBLE_ITEM_ID)
            .and_then(|v| u32::try_from(v).ok())
            .map(ItemKey)
    }
}

/// Tries `primary`, then `fallback`.
pub struct FallbackKeyStrategy {
    primary: Box<dyn KeyStrategy>,
    fallback: Box<dyn KeyStrategy>,
}

impl FallbackKeyStrategy {
    pub fn new(primary: Box<dyn KeyStrategy>, fallback: Box<dyn KeyStrategy>) -> Self {
        Self { primary, fallback }
    }
}

impl KeyStrategy for FallbackKeyStrategy {
    fn item_key(&self, record: &RawRecord) -> Option<ItemKey> {
        self.primary
            .item_key(record)
            .or_else(|| self.fallback.item_key(record))
    }
}

pub fn parse_item_link(link: &str) -> Option<ItemKey> {
    let start = link.find("item:")? + "item:".len();
    let digits = link[start..]
        .split(|c: char| !c.is_ascii_digit())
        .next()?;
    digits.parse::<u32>().ok().filter(|id| *id > 0).map(ItemKey)
}

/// Layout plus key strategy; turns raw records into rows.
pub struct RecordDecoder {
    layout: RecordLayout,
    strategy: Box<dyn KeyStrategy>,
}

impl Default for RecordDecoder {
    fn default() -> Self {
        let layout = RecordLayout::default();
        let strategy = FallbackKeyStrategy::new(
            Box::new(LinkKeyStrategy),
            Box::new(PositionalKeyStrategy::for_layout(&layout)),
        );
        Self::new(layout, Box::new(strategy))
    }
}

impl RecordDecoder {
    pub fn new(layout: RecordLayout, strategy: Box<dyn KeyStrategy>) -> Self {
        Self { layout, strategy }
    }

    pub fn decode(&self, index: u32, record: &RawRecord, scanned_at: DateTime<Utc>) -> Row {
        let layout = &self.layout;
        Row {
            index,
            item_key: self.strategy.item_key(record),
            name: record
                .field(layout.name)
                .as_text()
                .filter(|n| !n.is_empty())
                .map(ToOwned::to_owned),
            link: record.link.clone().filter(|l| !l.is_empty()),
            quality: record
                .field(layout.quality)
                .as_int()
                .and_then(|q| u8::try_from(q).ok()),
            quantity: u32::try_from(non_negative(record.field(layout.count))).unwrap_or(u32::MAX),
            time_left: record.time_left,
            min_bid: non_negative(record.field(layout.min_bid)),
            buyout: non_negative(record.field(layout.buyout)),
            scanned_at,
            has_complete_info: record.field(layout.has_all_info).as_bool(),
        }
    }
}

fn non_negative(value: &FieldValue) -> u64 {
    value
        .as_int()
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{parse_item_link, ItemKey};

    #[test]
    fn parses_colored_item_link() {
        let link = "|cff0070dd|Hitem:19019:0:0:0:0:0:0:0:60|h[Thunderfury]|h|r";
        assert_eq!(parse_item_link(link), Some(ItemKey(19019)));
    }

    #[test]
    fn rejects_links_without_item_id() {
        assert_eq!(parse_item_link("|Hbattlepet:1155:25|h[Pet]|h"), None);
        assert_eq!(parse_item_link("|Hitem:|h[Broken]|h"), None);
        assert_eq!(parse_item_link("|Hitem:0:1|h[Zero]|h"), None);
    }
}
