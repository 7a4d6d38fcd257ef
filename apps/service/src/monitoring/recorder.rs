//! Applies probe outcomes to the engine state.
//!
//! Counter increments happen at dispatch time (`begin_scheduled` /
//! `begin_manual`), after the endpoint's existence is confirmed and
//! before the probe runs, so request numbers follow dispatch order.
//! Everything else lands at completion time in a single `record` call
//! under the caller's state lock, so no partial update is observable.

use chrono::Utc;
use uuid::Uuid;

use crate::engine::state::EngineState;
use crate::models::{
    ActivityLogEntry, EndpointStatus, LogEntry, LogLevel, ResponseTimeSample, StatusCodeSample,
    format_interval,
};
use crate::monitoring::probe::ProbeOutcome;

/// Origin of a probe, fixed at dispatch time by `begin_scheduled` /
/// `begin_manual`.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext {
    /// Present for scheduled probes (timer ticks and run-now), absent
    /// for manual tests.
    pub schedule_id: Option<Uuid>,
    /// 1-based position in the schedule's own sequence, or in the
    /// global sequence for a manual test.
    pub request_number: u64,
    /// Stats generation at dispatch. A clear mid-flight bumps the live
    /// generation, so the completion no longer matches and is
    /// discarded; the request number alone cannot tell a stale
    /// completion apart once post-clear dispatches reuse it.
    pub generation: u64,
}

/// Whether a completion was applied or thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Applied,
    /// The schedule (or its stats generation) vanished while the probe
    /// was in flight; the result is data for nobody.
    Discarded,
}

/// Step 1 for a scheduled probe: bump the schedule's own counter and
/// hand out the 1-based request number. Stats are created lazily here,
/// on a schedule's first run.
pub fn begin_scheduled(state: &mut EngineState, schedule_id: Uuid) -> RecordContext {
    let stats = state.schedule_stats.entry(schedule_id).or_default();
    stats.total_requests += 1;
    RecordContext {
        schedule_id: Some(schedule_id),
        request_number: stats.total_requests,
        generation: stats.generation,
    }
}

/// Step 1 for a manual test: bump the global request counter.
pub fn begin_manual(state: &mut EngineState) -> RecordContext {
    state.global_request_counter += 1;
    RecordContext {
        schedule_id: None,
        request_number: state.global_request_counter,
        generation: 0,
    }
}

/// Steps 2-6: endpoint status, per-schedule log and counters, global
/// histories, activity entry. Persistence (step 7) stays with the
/// caller, which still holds the state lock.
pub fn record(
    state: &mut EngineState,
    endpoint_id: Uuid,
    outcome: &ProbeOutcome,
    ctx: RecordContext,
) -> Recorded {
    let now = Utc::now();

    // A schedule deleted mid-flight takes its stats with it; a clear
    // mid-flight leaves the entry but bumps its generation. Either way
    // the completion is discarded, keeping the counters coherent.
    let interval_seconds = match ctx.schedule_id {
        Some(schedule_id) => {
            let Some(schedule) = state.schedule(schedule_id) else {
                return Recorded::Discarded;
            };
            match state.schedule_stats.get(&schedule_id) {
                Some(stats) if stats.generation == ctx.generation => {}
                _ => return Recorded::Discarded,
            }
            Some(schedule.interval_seconds)
        }
        None => None,
    };

    let Some(endpoint) = state.endpoint_mut(endpoint_id) else {
        return Recorded::Discarded;
    };

    endpoint.status =
        if outcome.is_ok() { EndpointStatus::Success } else { EndpointStatus::Error };
    endpoint.response_time_ms = Some(outcome.response_time_ms());
    endpoint.last_checked = Some(now);
    let endpoint_name = endpoint.name.clone();

    if let Some(schedule_id) = ctx.schedule_id {
        if let Some(stats) = state.schedule_stats.get_mut(&schedule_id) {
            match outcome {
                ProbeOutcome::Completed { status_code, response_time_ms, .. } => {
                    stats.success_count += 1;
                    stats.last_success = Some(now);
                    stats.logs.push(LogEntry {
                        timestamp: now,
                        status: *status_code,
                        response_time_ms: *response_time_ms,
                        level: outcome.level(),
                        message: format!("{status_code} - {response_time_ms}ms"),
                        request_number: ctx.request_number,
                    });
                }
                ProbeOutcome::Failed { error, response_time_ms } => {
                    stats.error_count += 1;
                    stats.last_error = Some(now);
                    stats.logs.push(LogEntry {
                        timestamp: now,
                        status: 0,
                        response_time_ms: *response_time_ms,
                        level: LogLevel::Error,
                        message: format!("Request failed: {error}"),
                        request_number: ctx.request_number,
                    });
                }
            }
        }
    }

    state.response_times.push(ResponseTimeSample {
        timestamp: now,
        response_time_ms: outcome.response_time_ms(),
        endpoint_name: endpoint_name.clone(),
    });
    state.status_codes.push(StatusCodeSample {
        timestamp: now,
        status: outcome.status_code(),
        endpoint_name: endpoint_name.clone(),
    });

    state.activity_log.push(ActivityLogEntry {
        endpoint: endpoint_name,
        message: activity_message(outcome, &ctx, interval_seconds),
        level: outcome.level(),
        timestamp: now,
        request_number: ctx.request_number,
        schedule_id: ctx.schedule_id,
        is_scheduled: ctx.schedule_id.is_some(),
    });

    Recorded::Applied
}

fn activity_message(
    outcome: &ProbeOutcome,
    ctx: &RecordContext,
    interval_seconds: Option<u64>,
) -> String {
    let n = ctx.request_number;
    match (outcome, interval_seconds) {
        (ProbeOutcome::Completed { status_code, response_time_ms, .. }, Some(interval)) => {
            format!(
                "Job #{n} | Status {status_code} - {response_time_ms}ms | {} schedule",
                format_interval(interval)
            )
        }
        (ProbeOutcome::Failed { error, .. }, Some(interval)) => {
            format!("Job #{n} | Request failed: {error} | {} schedule", format_interval(interval))
        }
        (ProbeOutcome::Completed { status_code, response_time_ms, .. }, None) => {
            format!("Manual #{n} | {status_code} - {response_time_ms}ms | Manual test")
        }
        (ProbeOutcome::Failed { error, .. }, None) => {
            format!("Manual #{n} | Request failed: {error} | Manual test")
        }
    }
}
