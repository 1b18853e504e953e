//! Export core: pure domain types, record decoding and the pipeline state machine.
mod command;
mod effect;
mod msg;
mod progress;
mod record;
mod row;
mod settings;
mod snapshot;
mod state;
mod stats;
mod update;

pub use command::{Command, CommandParseError};
pub use effect::Effect;
pub use msg::Msg;
pub use progress::{percent, EnrichmentProgress, JobKind, ProgressReport, ProgressThrottle};
pub use record::{
    parse_item_link, FallbackKeyStrategy, FieldValue, KeyStrategy, LinkKeyStrategy,
    PositionalKeyStrategy, RawRecord, RecordDecoder, RecordLayout,
};
pub use row::{count_rows, fill_from_cache, ItemKey, PartialInfo, Row, RowCounts, UNKNOWN_QUALITY};
pub use settings::{Settings, MAX_SETTING_DELAY, MIN_TICK_INTERVAL};
pub use snapshot::ScanSnapshot;
pub use state::{PipelineState, PipelineTimings, ReadinessTracker, RunMode, Stage};
pub use stats::{EnrichStats, FinalPassStats, ScanSummary};
pub use update::update;
