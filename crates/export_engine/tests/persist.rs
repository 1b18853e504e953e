mod common;

use std::fs;

use common::{init_logging, listing, FakeHost};
use export_core::{Command, ItemKey, RecordDecoder, ScanSnapshot, Settings};
use export_engine::{
    ensure_data_dir, AtomicFileWriter, Clock, JsonFileStore, ManualClock, Scheduler,
    SnapshotStore, SNAPSHOT_FILE,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn snapshot(clock: &ManualClock) -> ScanSnapshot {
    let decoder = RecordDecoder::default();
    let rows = vec![
        decoder.decode(1, &listing(Some(10), Some("Wool Cloth"), Some(1)), clock.utc_now()),
        decoder.decode(2, &listing(Some(11), None, None), clock.utc_now()),
    ];
    ScanSnapshot {
        timestamp: clock.utc_now(),
        row_count: rows.len(),
        rows,
        enrich_stats: None,
        final_pass: None,
    }
}

#[test]
fn creates_missing_data_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("data");
    assert!(!new_dir.exists());
    ensure_data_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("scan.json", b"{}").unwrap();
    assert_eq!(fs::read_to_string(&first).unwrap(), "{}");

    let second = writer.write("scan.json", b"[]").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "[]");
}

#[test]
fn data_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let store = JsonFileStore::new(file_path.clone());
    let clock = ManualClock::default();
    assert!(store.save(&snapshot(&clock)).is_err());
    assert!(!file_path.with_file_name(SNAPSHOT_FILE).exists());
}

#[test]
fn json_store_round_trips_and_clears() {
    let temp = TempDir::new().unwrap();
    let store = JsonFileStore::new(temp.path().to_path_buf());
    let clock = ManualClock::default();

    assert_eq!(store.load().unwrap(), None);
    let saved = snapshot(&clock);
    store.save(&saved).unwrap();
    assert_eq!(store.load().unwrap(), Some(saved));

    let raw = fs::read_to_string(store.path()).unwrap();
    assert!(raw.contains("\"rowCount\": 2"));
    assert!(raw.contains("\"quality\": -1"));

    store.clear().unwrap();
    assert!(!store.path().exists());
    store.clear().unwrap();
}

#[test]
fn corrupt_snapshot_is_an_error() {
    let temp = TempDir::new().unwrap();
    let store = JsonFileStore::new(temp.path().to_path_buf());
    fs::write(store.path(), "{ not json").unwrap();
    assert!(store.load().is_err());
}

#[test]
fn scheduler_saves_reads_and_restores_them_on_restart() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let records = vec![listing(Some(10), None, None), listing(Some(11), None, None)];

    let clock = ManualClock::default();
    let mut first = Scheduler::new(FakeHost::new(records), clock.clone(), Settings::default())
        .with_snapshot_store(Box::new(JsonFileStore::new(temp.path().to_path_buf())));
    first.execute(Command::ReadOnly).unwrap();
    first.poll();
    assert!(temp.path().join(SNAPSHOT_FILE).exists());

    let mut second = Scheduler::new(FakeHost::new(Vec::new()), clock, Settings::default())
        .with_snapshot_store(Box::new(JsonFileStore::new(temp.path().to_path_buf())));
    assert!(second.restore_from_store().unwrap());
    assert_eq!(second.store().live().unwrap().row_count(), 2);

    second.execute(Command::EnrichOnly).unwrap();
    second.poll();
    assert_eq!(
        *second.host().requested.borrow(),
        vec![ItemKey(10), ItemKey(11)]
    );

    second.execute(Command::Clear).unwrap();
    assert!(!temp.path().join(SNAPSHOT_FILE).exists());
}
