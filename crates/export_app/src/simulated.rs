//! An in-process stand-in for the auction house server.
//!
//! [`SimulatedAuctionHouse`] is the [`Host`](export_engine::Host) the
//! scheduler talks to on the main thread. Anything the real server answers
//! asynchronously is forwarded to a [`SimulatedServer`] thread, which replies
//! through the scheduler's event sender after a delay.
//!
//! Listings and item behaviour are derived from the item id so every run
//! looks the same:
//! - ids divisible by 3 are already in the item cache;
//! - ids divisible by 7 (and not cached) never get an answer;
//! - ids divisible by 11 get a failed answer and stay unknown.
//!
//! The readiness event of every odd-numbered bulk scan is dropped, which
//! leaves the scheduler's readiness poll to notice the data.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_info, engine_warn};
use export_core::{FieldValue, ItemKey, PartialInfo, RawRecord};
use export_engine::{AuctionSource, HostEvent, ItemLookup, UserChannel};

use crate::console::{is_yes, Console};

/// The server accepts about one bulk scan every 15 minutes.
pub const SERVER_SCAN_THROTTLE: Duration = Duration::from_secs(15 * 60);
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
const SERVER_LOOP_INTERVAL: Duration = Duration::from_millis(20);
const FIRST_ITEM_ID: u32 = 2000;

const ITEM_NAMES: [&str; 12] = [
    "Copper Ore",
    "Linen Cloth",
    "Peacebloom",
    "Light Leather",
    "Silk Cloth",
    "Iron Ore",
    "Mageroyal",
    "Wool Cloth",
    "Heavy Hide",
    "Briarthorn",
    "Tin Bar",
    "Strange Dust",
];

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub auctions: usize,
    pub scan_delay: Duration,
    pub lookup_latency: Duration,
    pub lookups_available: bool,
    /// Answer every confirmation prompt with yes.
    pub auto_confirm: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            auctions: 2000,
            scan_delay: Duration::from_secs(3),
            lookup_latency: Duration::from_millis(150),
            lookups_available: true,
            auto_confirm: false,
        }
    }
}

enum ServerRequest {
    BulkScan,
    Lookup(ItemKey),
}

enum Delivery {
    Scan { announce: bool },
    Lookup { key: ItemKey, found: bool },
}

type SharedCache = Arc<Mutex<HashMap<ItemKey, PartialInfo>>>;

fn lock(cache: &SharedCache) -> MutexGuard<'_, HashMap<ItemKey, PartialInfo>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SimulatedAuctionHouse {
    config: SimulationConfig,
    listings: Vec<RawRecord>,
    cache: SharedCache,
    scan_ready: Arc<AtomicBool>,
    view_open: Cell<bool>,
    last_scan_request: Cell<Option<Instant>>,
    requests: Sender<ServerRequest>,
    console: Option<Rc<Console>>,
}

impl SimulatedAuctionHouse {
    /// Build the host and the server half it forwards requests to. Call
    /// [`SimulatedServer::spawn`] once the scheduler's event sender exists.
    pub fn new(config: SimulationConfig, console: Option<Rc<Console>>) -> (Self, SimulatedServer) {
        let listings = generate_listings(config.auctions);
        let warm: HashMap<_, _> = listings
            .iter()
            .filter_map(listing_key)
            .filter(|key| is_warm(*key))
            .map(|key| (key, catalog_entry(key)))
            .collect();
        engine_debug!(
            "simulated auction house: {} listings, {} items cached",
            listings.len(),
            warm.len()
        );

        let cache = Arc::new(Mutex::new(warm));
        let scan_ready = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let server = SimulatedServer {
            requests: rx,
            cache: Arc::clone(&cache),
            scan_ready: Arc::clone(&scan_ready),
            scan_delay: config.scan_delay,
            lookup_latency: config.lookup_latency,
        };
        let host = Self {
            config,
            listings,
            cache,
            scan_ready,
            view_open: Cell::new(true),
            last_scan_request: Cell::new(None),
            requests: tx,
            console,
        };
        (host, server)
    }

    pub fn set_view_open(&self, open: bool) {
        self.view_open.set(open);
    }

    pub fn listings(&self) -> &[RawRecord] {
        &self.listings
    }

    fn send(&self, request: ServerRequest) {
        if self.requests.send(request).is_err() {
            engine_warn!("simulated server is gone; request dropped");
        }
    }
}

impl AuctionSource for SimulatedAuctionHouse {
    fn scan_view_open(&self) -> bool {
        self.view_open.get()
    }

    fn request_bulk_scan(&self) {
        let now = Instant::now();
        if let Some(last) = self.last_scan_request.get() {
            if now.duration_since(last) < SERVER_SCAN_THROTTLE {
                engine_info!("server ignored a bulk scan request (throttled)");
                return;
            }
        }
        self.last_scan_request.set(Some(now));
        self.scan_ready.store(false, Ordering::SeqCst);
        self.send(ServerRequest::BulkScan);
    }

    fn is_scan_ready(&self) -> bool {
        self.scan_ready.load(Ordering::SeqCst)
    }

    fn record_count(&self) -> usize {
        if self.is_scan_ready() {
            self.listings.len()
        } else {
            0
        }
    }

    fn record_at(&self, index: usize) -> RawRecord {
        index
            .checked_sub(1)
            .and_then(|i| self.listings.get(i))
            .cloned()
            .unwrap_or_default()
    }
}

impl ItemLookup for SimulatedAuctionHouse {
    fn lookup_available(&self) -> bool {
        self.config.lookups_available
    }

    fn cached(&self, key: ItemKey) -> Option<PartialInfo> {
        lock(&self.cache).get(&key).cloned()
    }

    fn request_lookup(&self, key: ItemKey) {
        self.send(ServerRequest::Lookup(key));
    }
}

impl UserChannel for SimulatedAuctionHouse {
    fn notify(&self, text: &str) {
        println!("{text}");
    }

    fn confirm(&self, prompt: &str) -> bool {
        println!("{prompt} [y/N]");
        if self.config.auto_confirm {
            println!("y");
            return true;
        }
        self.console
            .as_ref()
            .and_then(|console| console.wait_line(CONFIRM_TIMEOUT))
            .is_some_and(|answer| is_yes(&answer))
    }
}

/// The thread half: answers scans and lookups after a delay.
pub struct SimulatedServer {
    requests: Receiver<ServerRequest>,
    cache: SharedCache,
    scan_ready: Arc<AtomicBool>,
    scan_delay: Duration,
    lookup_latency: Duration,
}

impl SimulatedServer {
    pub fn spawn(self, events: Sender<HostEvent>) -> JoinHandle<()> {
        thread::spawn(move || self.run(events))
    }

    fn run(self, events: Sender<HostEvent>) {
        let mut scheduled: Vec<(Instant, Delivery)> = Vec::new();
        let mut scans = 0u32;
        loop {
            loop {
                let now = Instant::now();
                match self.requests.try_recv() {
                    Ok(ServerRequest::BulkScan) => {
                        scans += 1;
                        let announce = scans % 2 == 0;
                        scheduled.push((now + self.scan_delay, Delivery::Scan { announce }));
                    }
                    Ok(ServerRequest::Lookup(key)) => {
                        if is_lost(key) {
                            engine_debug!("server will never answer item {key}");
                            continue;
                        }
                        let delivery = Delivery::Lookup {
                            key,
                            found: !is_failing(key),
                        };
                        scheduled.push((now + self.latency_for(key), delivery));
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }

            let now = Instant::now();
            let (due, waiting): (Vec<_>, Vec<_>) =
                scheduled.into_iter().partition(|(at, _)| *at <= now);
            scheduled = waiting;
            for (_, delivery) in due {
                if !self.deliver(delivery, &events) {
                    engine_debug!("scheduler is gone; stopping the simulated server");
                    return;
                }
            }

            thread::sleep(SERVER_LOOP_INTERVAL);
        }
    }

    fn deliver(&self, delivery: Delivery, events: &Sender<HostEvent>) -> bool {
        match delivery {
            Delivery::Scan { announce } => {
                self.scan_ready.store(true, Ordering::SeqCst);
                if announce {
                    events.send(HostEvent::ScanReady).is_ok()
                } else {
                    engine_debug!("server dropped the scan-ready event");
                    true
                }
            }
            Delivery::Lookup { key, found } => {
                if found {
                    lock(&self.cache).insert(key, catalog_entry(key));
                }
                events
                    .send(HostEvent::LookupCompleted {
                        key,
                        success: found,
                    })
                    .is_ok()
            }
        }
    }

    fn latency_for(&self, key: ItemKey) -> Duration {
        self.lookup_latency + self.lookup_latency * (key.0 % 4) / 2
    }
}

fn is_warm(key: ItemKey) -> bool {
    key.0 % 3 == 0
}

fn is_lost(key: ItemKey) -> bool {
    key.0 % 7 == 0 && !is_warm(key)
}

fn is_failing(key: ItemKey) -> bool {
    key.0 % 11 == 0
}

/// Everything the server knows about an item.
pub fn catalog_entry(key: ItemKey) -> PartialInfo {
    let name = ITEM_NAMES[key.0 as usize % ITEM_NAMES.len()];
    PartialInfo {
        name: Some(name.to_string()),
        link: Some(item_link(key, name)),
        quality: Some((key.0 % 4) as u8 + 1),
    }
}

fn item_link(key: ItemKey, name: &str) -> String {
    format!("|cffffffff|Hitem:{}::::::::60:::::::|h[{}]|h|r", key.0, name)
}

fn listing_key(record: &RawRecord) -> Option<ItemKey> {
    record
        .field(17)
        .as_int()
        .and_then(|id| u32::try_from(id).ok())
        .map(ItemKey)
}

/// Listings in the host's replicate-item layout.
///
/// One in four listings arrives complete, one in fifty has no item id at
/// all, and the rest lack name, link and quality.
pub fn generate_listings(count: usize) -> Vec<RawRecord> {
    let distinct = (count / 3).max(1);
    (0..count)
        .map(|i| {
            let key = ItemKey(FIRST_ITEM_ID + ((i * 7919) % distinct) as u32);
            let keyless = i % 50 == 49;
            let complete = !keyless && i % 4 == 0;
            build_listing(i, key, keyless, complete)
        })
        .collect()
}

fn build_listing(i: usize, key: ItemKey, keyless: bool, complete: bool) -> RawRecord {
    let info = catalog_entry(key);
    let quantity = (i % 20) as i64 + 1;
    let min_bid = 100 + (i64::from(key.0) % 97) * 25;

    let mut fields = vec![FieldValue::Nil; 18];
    if complete {
        fields[0] = info.name.clone().map_or(FieldValue::Nil, FieldValue::Text);
        fields[3] = FieldValue::Int(info.quality.map_or(-1, i64::from));
    } else {
        fields[3] = FieldValue::Int(-1);
    }
    fields[2] = FieldValue::Int(quantity);
    fields[7] = FieldValue::Int(min_bid);
    fields[8] = FieldValue::Int(min_bid / 20);
    fields[9] = FieldValue::Int(min_bid * 3);
    fields[10] = FieldValue::Int(0);
    if !keyless {
        fields[16] = FieldValue::Int(i64::from(key.0));
    }
    fields[17] = FieldValue::Bool(complete);

    RawRecord {
        link: if complete { info.link } else { None },
        time_left: Some((i % 4) as u8 + 1),
        fields,
    }
}
