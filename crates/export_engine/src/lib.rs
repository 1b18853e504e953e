//! Export engine: host seams, budgeted jobs and the cooperative scheduler.
mod budget;
mod clock;
mod enrichment;
mod extraction;
mod host;
mod persist;
mod scheduler;
mod store;

pub use budget::TickBudget;
pub use clock::{Clock, ManualClock, SystemClock};
pub use enrichment::{CompletionInbox, EnrichmentJob, EnrichmentTick, Prepared};
pub use extraction::{ExtractionJob, ExtractionTick};
pub use host::{AuctionSource, Host, HostEvent, ItemLookup, UserChannel};
pub use persist::{
    ensure_data_dir, AtomicFileWriter, JsonFileStore, PersistError, SnapshotStore, SNAPSHOT_FILE,
};
pub use scheduler::{JobOutcome, Scheduler, StartError, Wake};
pub use store::{ScanResult, ScanStore, SharedRows};
