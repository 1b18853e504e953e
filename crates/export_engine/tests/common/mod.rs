#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Once;
use std::time::Duration;

use export_core::{FieldValue, ItemKey, PartialInfo, RawRecord};
use export_engine::{AuctionSource, ItemLookup, ManualClock, UserChannel};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// Host double that records every call. Reads can advance a shared clock.
pub struct FakeHost {
    pub view_open: Cell<bool>,
    pub scan_ready: Cell<bool>,
    pub lookups_available: Cell<bool>,
    pub confirm_answer: Cell<bool>,
    pub records: RefCell<Vec<RawRecord>>,
    pub cache: RefCell<HashMap<ItemKey, PartialInfo>>,
    pub requested: RefCell<Vec<ItemKey>>,
    pub scan_requests: Cell<usize>,
    pub reads: Cell<usize>,
    pub notes: RefCell<Vec<String>>,
    pub prompts: RefCell<Vec<String>>,
    read_cost: Option<(ManualClock, Duration)>,
    lookup_cost: Option<(ManualClock, Duration)>,
}

impl FakeHost {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            view_open: Cell::new(true),
            scan_ready: Cell::new(true),
            lookups_available: Cell::new(true),
            confirm_answer: Cell::new(true),
            records: RefCell::new(records),
            cache: RefCell::new(HashMap::new()),
            requested: RefCell::new(Vec::new()),
            scan_requests: Cell::new(0),
            reads: Cell::new(0),
            notes: RefCell::new(Vec::new()),
            prompts: RefCell::new(Vec::new()),
            read_cost: None,
            lookup_cost: None,
        }
    }

    /// Every `record_at` call advances `clock` by `cost`.
    pub fn with_read_cost(mut self, clock: &ManualClock, cost: Duration) -> Self {
        self.read_cost = Some((clock.clone(), cost));
        self
    }

    /// Every `cached` call advances `clock` by `cost`.
    pub fn with_lookup_cost(mut self, clock: &ManualClock, cost: Duration) -> Self {
        self.lookup_cost = Some((clock.clone(), cost));
        self
    }

    pub fn fill_cache(&self, key: u32, name: &str, quality: u8) {
        self.cache.borrow_mut().insert(
            ItemKey(key),
            PartialInfo {
                name: Some(name.to_string()),
                link: Some(format!("|Hitem:{key}|h[{name}]|h")),
                quality: Some(quality),
            },
        );
    }

    pub fn notes_starting_with(&self, prefix: &str) -> Vec<String> {
        self.notes
            .borrow()
            .iter()
            .filter(|note| note.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn take_notes(&self) -> Vec<String> {
        self.notes.borrow_mut().drain(..).collect()
    }
}

impl AuctionSource for FakeHost {
    fn scan_view_open(&self) -> bool {
        self.view_open.get()
    }

    fn request_bulk_scan(&self) {
        self.scan_requests.set(self.scan_requests.get() + 1);
    }

    fn is_scan_ready(&self) -> bool {
        self.scan_ready.get()
    }

    fn record_count(&self) -> usize {
        self.records.borrow().len()
    }

    fn record_at(&self, index: usize) -> RawRecord {
        self.reads.set(self.reads.get() + 1);
        if let Some((clock, cost)) = &self.read_cost {
            clock.advance(*cost);
        }
        self.records.borrow()[index - 1].clone()
    }
}

impl ItemLookup for FakeHost {
    fn lookup_available(&self) -> bool {
        self.lookups_available.get()
    }

    fn cached(&self, key: ItemKey) -> Option<PartialInfo> {
        if let Some((clock, cost)) = &self.lookup_cost {
            clock.advance(*cost);
        }
        self.cache.borrow().get(&key).cloned()
    }

    fn request_lookup(&self, key: ItemKey) {
        self.requested.borrow_mut().push(key);
    }
}

impl UserChannel for FakeHost {
    fn notify(&self, text: &str) {
        self.notes.borrow_mut().push(text.to_string());
    }

    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.confirm_answer.get()
    }
}

/// A listing whose name, link and quality are unknown unless given.
pub fn listing(key: Option<u32>, name: Option<&str>, quality: Option<i64>) -> RawRecord {
    let mut fields = vec![FieldValue::Nil; 18];
    fields[0] = name.map_or(FieldValue::Nil, |n| FieldValue::Text(n.to_string()));
    fields[2] = FieldValue::Int(1);
    fields[3] = FieldValue::Int(quality.unwrap_or(-1));
    fields[7] = FieldValue::Int(100);
    fields[9] = FieldValue::Int(250);
    fields[16] = key.map_or(FieldValue::Nil, |k| FieldValue::Int(i64::from(k)));
    fields[17] = FieldValue::Bool(false);
    RawRecord {
        link: None,
        time_left: Some(3),
        fields,
    }
}

/// A listing with everything known.
pub fn complete_listing(key: u32, name: &str) -> RawRecord {
    let mut record = listing(Some(key), Some(name), Some(2));
    record.link = Some(format!("|Hitem:{key}|h[{name}]|h"));
    record
}
