use std::sync::Once;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use export_core::{
    update, Effect, FinalPassStats, Msg, PipelineState, RunMode, ScanSummary, Settings, Stage,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn settings() -> Settings {
    Settings {
        scan_poll_sec: 2.0,
        progress_interval_sec: 5,
        scan_timeout_sec: 60,
        scan_cooldown_sec: 900,
        throttle_hint_sec: 20,
        post_read_delay_sec: 1.0,
        ..Settings::default()
    }
}

fn begin(mode: RunMode, now: Instant, settings: &Settings) -> (PipelineState, Vec<Effect>) {
    update(
        PipelineState::new(mode, now, settings),
        Msg::Begin {
            now,
            scan_view_open: true,
            last_ready_at: None,
        },
    )
}

fn notifications(effects: &[Effect]) -> Vec<&str> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Notify(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn begin_requests_scan_and_waits() {
    init_logging();
    let now = Instant::now();
    let (state, effects) = begin(RunMode::Full, now, &settings());

    assert_eq!(state.stage(), Stage::WaitingScan);
    assert!(state.readiness().is_waiting());
    assert_eq!(state.readiness().requested_at(), Some(now));
    assert_eq!(effects[0], Effect::RequestScan);
    assert_eq!(
        effects.last(),
        Some(&Effect::ScheduleWake {
            after: Duration::from_secs(2)
        })
    );
}

#[test]
fn closed_scan_view_aborts_without_request() {
    init_logging();
    let now = Instant::now();
    let (state, effects) = update(
        PipelineState::new(RunMode::Full, now, &settings()),
        Msg::Begin {
            now,
            scan_view_open: false,
            last_ready_at: None,
        },
    );

    assert!(state.is_finished());
    assert_eq!(state.outcome(), Some(false));
    assert!(!effects.contains(&Effect::RequestScan));
    assert_eq!(effects.last(), Some(&Effect::Finished { success: false }));
}

#[test]
fn recent_readiness_asks_for_confirmation() {
    init_logging();
    let now = Instant::now() + Duration::from_secs(1000);
    let last = now - Duration::from_secs(120);
    let (state, effects) = update(
        PipelineState::new(RunMode::Full, now, &settings()),
        Msg::Begin {
            now,
            scan_view_open: true,
            last_ready_at: Some(last),
        },
    );

    assert_eq!(state.stage(), Stage::Scan);
    assert!(state.awaiting_confirmation());
    assert_eq!(effects.len(), 1);
    match &effects[0] {
        Effect::AskConfirmation { prompt } => assert!(prompt.contains("120s ago")),
        other => panic!("unexpected effect {other:?}"),
    }

    let (declined, effects) = update(
        state.clone(),
        Msg::ConfirmationAnswered {
            proceed: false,
            now,
        },
    );
    assert!(declined.is_finished());
    assert!(!effects.contains(&Effect::RequestScan));
    assert_eq!(effects.last(), Some(&Effect::Finished { success: false }));

    let (accepted, effects) = update(state, Msg::ConfirmationAnswered { proceed: true, now });
    assert_eq!(accepted.stage(), Stage::WaitingScan);
    assert_eq!(effects[0], Effect::RequestScan);
}

#[test]
fn old_readiness_skips_confirmation() {
    init_logging();
    let now = Instant::now() + Duration::from_secs(2000);
    let last = now - Duration::from_secs(901);
    let (state, effects) = update(
        PipelineState::new(RunMode::Full, now, &settings()),
        Msg::Begin {
            now,
            scan_view_open: true,
            last_ready_at: Some(last),
        },
    );
    assert_eq!(state.stage(), Stage::WaitingScan);
    assert_eq!(effects[0], Effect::RequestScan);
}

#[test]
fn readiness_event_starts_extraction() {
    init_logging();
    let now = Instant::now();
    let (state, _) = begin(RunMode::Full, now, &settings());
    let ready_at = now + Duration::from_secs(3);

    let (state, effects) = update(state, Msg::ScanReady { now: ready_at });

    assert_eq!(state.stage(), Stage::Read);
    assert!(!state.readiness().is_waiting());
    assert_eq!(effects[0], Effect::ReadinessRecorded { at: ready_at });
    assert_eq!(effects.last(), Some(&Effect::StartExtraction));
}

#[test]
fn poll_synthesizes_the_readiness_transition() {
    init_logging();
    let now = Instant::now();
    let (state, _) = begin(RunMode::Full, now, &settings());
    let polled_at = now + Duration::from_secs(4);

    let (via_poll, poll_effects) = update(
        state.clone(),
        Msg::Wake {
            now: polled_at,
            data_available: true,
        },
    );
    let (via_event, event_effects) = update(state, Msg::ScanReady { now: polled_at });

    assert_eq!(via_poll, via_event);
    assert_eq!(poll_effects, event_effects);

    // A late event after the poll already fired is ignored.
    let (after, effects) = update(via_poll.clone(), Msg::ScanReady { now: polled_at });
    assert_eq!(after, via_poll);
    assert!(effects.is_empty());
}

#[test]
fn waiting_prints_hint_once_and_times_out() {
    init_logging();
    let now = Instant::now();
    let (state, _) = begin(RunMode::Full, now, &settings());

    let (state, effects) = update(
        state,
        Msg::Wake {
            now: now + Duration::from_secs(2),
            data_available: false,
        },
    );
    assert!(notifications(&effects).is_empty());
    assert!(!state.readiness().throttle_observed());

    let (state, effects) = update(
        state,
        Msg::Wake {
            now: now + Duration::from_secs(21),
            data_available: false,
        },
    );
    let lines = notifications(&effects);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("throttles bulk scans"));
    assert!(lines[1].starts_with("Waiting for scan data (21s)"));
    assert!(state.readiness().throttle_observed());

    let (state, effects) = update(
        state,
        Msg::Wake {
            now: now + Duration::from_secs(27),
            data_available: false,
        },
    );
    assert_eq!(notifications(&effects), vec!["Waiting for scan data (27s)..."]);

    let (state, effects) = update(
        state,
        Msg::Wake {
            now: now + Duration::from_secs(60),
            data_available: false,
        },
    );
    assert!(state.is_finished());
    assert_eq!(state.outcome(), Some(false));
    assert!(!state.readiness().is_waiting());
    assert_eq!(effects.last(), Some(&Effect::Finished { success: false }));
}

#[test]
fn full_run_walks_every_stage() {
    init_logging();
    let now = Instant::now();
    let (state, _) = begin(RunMode::Full, now, &settings());
    let (state, _) = update(state, Msg::ScanReady { now });
    assert_eq!(state.stage(), Stage::Read);

    let scanned_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let (state, effects) = update(
        state,
        Msg::ExtractionFinished {
            now,
            scanned_at,
            row_count: 3,
        },
    );
    assert_eq!(state.stage(), Stage::Enrich);
    assert_eq!(state.scan_timestamp(), Some(scanned_at));
    assert_eq!(effects.last(), Some(&Effect::StartEnrichment));

    let (state, effects) = update(
        state,
        Msg::EnrichmentFinished {
            now,
            completed: false,
        },
    );
    assert_eq!(state.stage(), Stage::PostRead);
    assert_eq!(notifications(&effects).len(), 1);
    assert_eq!(
        effects.last(),
        Some(&Effect::ScheduleWake {
            after: Duration::from_secs(1)
        })
    );

    let (state, effects) = update(
        state,
        Msg::Wake {
            now: now + Duration::from_secs(1),
            data_available: false,
        },
    );
    assert_eq!(effects, vec![Effect::RunFinalPass]);

    let summary = ScanSummary {
        row_count: 3,
        final_pass: FinalPassStats::default(),
        enrich: None,
    };
    let (state, effects) = update(
        state,
        Msg::FinalPassFinished {
            now: now + Duration::from_secs(9),
            summary,
        },
    );
    assert!(state.is_finished());
    assert_eq!(state.outcome(), Some(true));
    let lines = notifications(&effects);
    assert!(lines[0].starts_with("Scan complete: 3 rows"));
    assert_eq!(lines[1], "Pipeline finished in 9s.");
    assert_eq!(effects.last(), Some(&Effect::Finished { success: true }));
}

#[test]
fn scan_only_stops_at_readiness_unless_chaining() {
    init_logging();
    let now = Instant::now();
    let (state, _) = begin(RunMode::ScanOnly, now, &settings());
    let (state, effects) = update(state, Msg::ScanReady { now });
    assert!(state.is_finished());
    assert!(!effects.contains(&Effect::StartExtraction));
    assert_eq!(effects.last(), Some(&Effect::Finished { success: true }));

    let chaining = Settings {
        auto_chain: true,
        ..settings()
    };
    let (state, _) = begin(RunMode::ScanOnly, now, &chaining);
    let (state, effects) = update(state, Msg::ScanReady { now });
    assert_eq!(state.stage(), Stage::Read);
    assert_eq!(state.mode(), RunMode::Full);
    assert_eq!(effects.last(), Some(&Effect::StartExtraction));
}

#[test]
fn cancel_clears_tracker_without_finishing_effect() {
    init_logging();
    let now = Instant::now();
    let (state, _) = begin(RunMode::Full, now, &settings());
    assert!(state.readiness().is_waiting());

    let (state, effects) = update(state, Msg::Cancel);
    assert!(state.is_finished());
    assert_eq!(state.outcome(), None);
    assert!(!state.readiness().is_waiting());
    assert!(effects.is_empty());

    let (state, effects) = update(state, Msg::ScanReady { now });
    assert!(effects.is_empty());
    assert_eq!(state.stage(), Stage::Done);
}

#[test]
fn out_of_stage_messages_are_ignored() {
    init_logging();
    let now = Instant::now();
    let (state, _) = begin(RunMode::Full, now, &settings());
    let before = state.clone();

    let (state, effects) = update(
        state,
        Msg::EnrichmentFinished {
            now,
            completed: true,
        },
    );
    assert_eq!(state, before);
    assert!(effects.is_empty());

    let (state, effects) = update(
        state,
        Msg::Begin {
            now,
            scan_view_open: true,
            last_ready_at: None,
        },
    );
    assert_eq!(state, before);
    assert!(effects.is_empty());
}
