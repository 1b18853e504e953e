use std::time::{Duration, Instant};

use crate::{Effect, Msg, PipelineState, RunMode, Stage};

/// Pure update function: applies a message to the pipeline and returns any effects.
///
/// Messages that do not fit the current stage are ignored, so late or
/// unrelated host notifications can be fed in without checking first.
pub fn update(mut state: PipelineState, msg: Msg) -> (PipelineState, Vec<Effect>) {
    if state.is_finished() {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::Begin {
            now,
            scan_view_open,
            last_ready_at,
        } => {
            if state.stage() != Stage::Scan || state.awaiting_confirmation() {
                return (state, Vec::new());
            }
            if !scan_view_open {
                state.finish(false);
                vec![
                    Effect::Notify(
                        "Cannot request a scan: the auction house is not open.".to_string(),
                    ),
                    Effect::Finished { success: false },
                ]
            } else if let Some(age) = recent_readiness(last_ready_at, now, state.timings().scan_cooldown)
            {
                state.set_awaiting_confirmation(true);
                vec![Effect::AskConfirmation {
                    prompt: format!(
                        "A scan finished {}s ago and the server only allows one bulk scan about every 15 minutes. Request another scan anyway?",
                        age.as_secs()
                    ),
                }]
            } else {
                request_scan(&mut state, now)
            }
        }
        Msg::ConfirmationAnswered { proceed, now } => {
            if !state.awaiting_confirmation() {
                return (state, Vec::new());
            }
            state.set_awaiting_confirmation(false);
            if proceed {
                request_scan(&mut state, now)
            } else {
                state.finish(false);
                vec![
                    Effect::Notify("Scan not requested.".to_string()),
                    Effect::Finished { success: false },
                ]
            }
        }
        Msg::ScanReady { now } => {
            if !state.readiness().is_waiting() {
                return (state, Vec::new());
            }
            scan_ready(&mut state, now)
        }
        Msg::Wake {
            now,
            data_available,
        } => match state.stage() {
            Stage::WaitingScan if data_available => scan_ready(&mut state, now),
            Stage::WaitingScan => wait_tick(&mut state, now),
            Stage::PostRead => vec![Effect::RunFinalPass],
            _ => Vec::new(),
        },
        Msg::ExtractionFinished {
            scanned_at,
            row_count,
            ..
        } => {
            if state.stage() != Stage::Read {
                return (state, Vec::new());
            }
            state.set_scan_timestamp(scanned_at);
            state.set_stage(Stage::Enrich);
            vec![
                Effect::Notify(format!("Read {row_count} auctions; enriching item info.")),
                Effect::StartEnrichment,
            ]
        }
        Msg::EnrichmentFinished { completed, .. } => {
            if state.stage() != Stage::Enrich {
                return (state, Vec::new());
            }
            state.set_stage(Stage::PostRead);
            let mut effects = Vec::with_capacity(2);
            if !completed {
                effects.push(Effect::Notify(
                    "Enrichment stopped early; running the final pass anyway.".to_string(),
                ));
            }
            effects.push(Effect::ScheduleWake {
                after: state.timings().post_read_delay,
            });
            effects
        }
        Msg::FinalPassFinished { now, summary } => {
            if state.stage() != Stage::PostRead {
                return (state, Vec::new());
            }
            let elapsed = now.saturating_duration_since(state.started_at());
            state.finish(true);
            vec![
                Effect::Notify(summary.to_string()),
                Effect::Notify(format!("Pipeline finished in {}s.", elapsed.as_secs())),
                Effect::Finished { success: true },
            ]
        }
        Msg::Cancel => {
            // Cancellation is not a completion: no `Finished` effect.
            state.stop_readiness();
            state.set_awaiting_confirmation(false);
            state.set_stage(Stage::Done);
            Vec::new()
        }
    };

    (state, effects)
}

fn recent_readiness(
    last_ready_at: Option<Instant>,
    now: Instant,
    cooldown: Duration,
) -> Option<Duration> {
    let age = now.saturating_duration_since(last_ready_at?);
    (age < cooldown).then_some(age)
}

fn request_scan(state: &mut PipelineState, now: Instant) -> Vec<Effect> {
    state.set_stage(Stage::WaitingScan);
    state.arm_readiness(now);
    vec![
        Effect::RequestScan,
        Effect::Notify("Bulk scan requested; waiting for the server to send data.".to_string()),
        Effect::ScheduleWake {
            after: state.timings().poll_interval,
        },
    ]
}

fn scan_ready(state: &mut PipelineState, now: Instant) -> Vec<Effect> {
    state.stop_readiness();
    let mut effects = vec![Effect::ReadinessRecorded { at: now }];
    let continue_reading = match state.mode() {
        RunMode::Full => true,
        RunMode::ScanOnly if state.auto_chain() => {
            state.set_mode(RunMode::Full);
            true
        }
        RunMode::ScanOnly => false,
    };
    if continue_reading {
        state.set_stage(Stage::Read);
        effects.push(Effect::Notify("Scan data ready; reading auctions.".to_string()));
        effects.push(Effect::StartExtraction);
    } else {
        state.finish(true);
        effects.push(Effect::Notify(
            "Scan data ready. Use `read` to export it.".to_string(),
        ));
        effects.push(Effect::Finished { success: true });
    }
    effects
}

fn wait_tick(state: &mut PipelineState, now: Instant) -> Vec<Effect> {
    let waited = state.waited(now);
    let timings = *state.timings();
    if waited >= timings.scan_timeout {
        state.finish(false);
        return vec![
            Effect::Notify(format!(
                "No scan data after {}s; giving up. The server may still be throttling bulk scans.",
                waited.as_secs()
            )),
            Effect::Finished { success: false },
        ];
    }

    let mut effects = Vec::new();
    if waited >= timings.throttle_hint_after && state.mark_throttle_observed() {
        effects.push(Effect::Notify(
            "Still no scan data; the server throttles bulk scans to about one every 15 minutes."
                .to_string(),
        ));
    }
    if state.wait_print_due(now) {
        effects.push(Effect::Notify(format!(
            "Waiting for scan data ({}s)...",
            waited.as_secs()
        )));
    }
    effects.push(Effect::ScheduleWake {
        after: timings.poll_interval,
    });
    effects
}
