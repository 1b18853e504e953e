use export_core::{ItemKey, PartialInfo, RawRecord};

/// The auction house scan and its indexed extraction API.
pub trait AuctionSource {
    /// Whether the view required to request a scan is open.
    fn scan_view_open(&self) -> bool;
    /// Fire-and-forget; the host throttles this on its own and never reports failure.
    fn request_bulk_scan(&self);
    /// Poll fallback for a missed readiness event.
    fn is_scan_ready(&self) -> bool;
    fn record_count(&self) -> usize;
    /// Record at a 1-based index.
    fn record_at(&self, index: usize) -> RawRecord;
}

/// The host's item cache and its asynchronous lookup service.
pub trait ItemLookup {
    fn lookup_available(&self) -> bool;
    fn cached(&self, key: ItemKey) -> Option<PartialInfo>;
    /// Completion arrives later as [`HostEvent::LookupCompleted`].
    fn request_lookup(&self, key: ItemKey);
}

/// Status text and the cooldown confirmation.
pub trait UserChannel {
    fn notify(&self, text: &str);
    fn confirm(&self, prompt: &str) -> bool;
}

/// Everything the scheduler needs from its environment.
pub trait Host: AuctionSource + ItemLookup + UserChannel {}

impl<T: AuctionSource + ItemLookup + UserChannel> Host for T {}

/// Notifications the host delivers out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// May fire for reasons unrelated to our request.
    ScanReady,
    LookupCompleted { key: ItemKey, success: bool },
}
