/// Engine module - coordinates schedules, probes, and recorded state
///
/// The `Watchdog` type is the lifecycle coordinator:
/// - Owns the state container, the entity store, the prober, the
///   notifier, and the driver registry
/// - Starts, stops, and restarts schedule drivers on every mutation
/// - Cascades endpoint deletion into schedule removal
/// - Funnels every probe outcome through the recorder under one lock
pub(crate) mod state;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::export;
use crate::models::{
    ActivityLogEntry, Endpoint, EndpointStatus, InputType, LogLevel, ResponseTimeSample, Schedule,
    ScheduleStats, StatusCodeSample,
};
use crate::monitoring::recorder::{self, RecordContext, Recorded};
use crate::monitoring::{DriverRegistry, ProbeOutcome, Prober, ScheduleRunner, TickOutcome};
use crate::notify::Notifier;
use crate::store::EntityStore;
use state::EngineState;

/// User-supplied endpoint definition fields.
#[derive(Debug, Clone, Default)]
pub struct EndpointDraft {
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub input_type: InputType,
}

/// Snapshot of the global trend histories.
#[derive(Debug, Clone)]
pub struct GlobalHistories {
    pub response_times: Vec<ResponseTimeSample>,
    pub status_codes: Vec<StatusCodeSample>,
}

/// Dashboard roll-up over endpoints, schedules, and the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub total_endpoints: usize,
    pub active_endpoints: usize,
    pub scheduled_jobs: usize,
    pub failed_requests: usize,
}

/// The schedule and probe execution engine.
///
/// Cheap to clone; all clones share one state container and one driver
/// registry.
#[derive(Clone)]
pub struct Watchdog {
    inner: Arc<Inner>,
}

struct Inner {
    settings: Settings,
    store: Arc<dyn EntityStore>,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn Notifier>,
    drivers: Arc<DriverRegistry>,
    state: Mutex<EngineState>,
}

impl Watchdog {
    pub fn new(
        settings: Settings,
        store: Arc<dyn EntityStore>,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                store,
                prober,
                notifier,
                drivers: Arc::new(DriverRegistry::new()),
                state: Mutex::new(EngineState::new()),
            }),
        }
    }

    /// Restores persisted state and starts a driver for every active
    /// schedule.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        let store = &self.inner.store;
        state.endpoints = store.load_endpoints().await.map_err(Error::Store)?;
        state.schedules = store.load_schedules().await.map_err(Error::Store)?;
        state.schedule_stats = store.load_schedule_stats().await.map_err(Error::Store)?;
        state.activity_log = store.load_activity_log().await.map_err(Error::Store)?;
        state.response_times = store.load_response_times().await.map_err(Error::Store)?;
        state.status_codes = store.load_status_codes().await.map_err(Error::Store)?;
        state.global_request_counter = store.load_global_counter().await.map_err(Error::Store)?;

        info!(
            endpoints = state.endpoints.len(),
            schedules = state.schedules.len(),
            "state restored"
        );

        for schedule in state.schedules.iter().filter(|s| s.is_active) {
            self.start_driver(schedule)?;
        }
        Ok(())
    }

    /// Stops every driver. Probes already in flight still record.
    pub async fn shutdown(&self) {
        self.inner.drivers.stop_all();
    }

    // ---- endpoint lifecycle ----

    pub async fn create_endpoint(&self, draft: EndpointDraft) -> Result<Endpoint> {
        validate_endpoint(&draft)?;

        let mut state = self.inner.state.lock().await;
        let mut endpoint = Endpoint::new(draft.name, draft.url, draft.method);
        endpoint.headers = draft.headers;
        endpoint.body = draft.body;
        endpoint.input_type = draft.input_type;

        state.endpoints.push(endpoint.clone());
        self.inner.persist_endpoints(&state).await?;
        info!(endpoint = %endpoint.name, "endpoint created");
        Ok(endpoint)
    }

    /// Updates an endpoint in place; an unknown id is inserted under
    /// that id. Probe-derived fields are reset by an edit.
    pub async fn update_endpoint(&self, id: Uuid, draft: EndpointDraft) -> Result<Endpoint> {
        validate_endpoint(&draft)?;

        let mut state = self.inner.state.lock().await;
        let updated = match state.endpoint_mut(id) {
            Some(existing) => {
                existing.name = draft.name;
                existing.url = draft.url;
                existing.method = draft.method;
                existing.headers = draft.headers;
                existing.body = draft.body;
                existing.input_type = draft.input_type;
                existing.status = EndpointStatus::Active;
                existing.last_checked = None;
                existing.response_time_ms = None;
                existing.clone()
            }
            None => {
                let mut endpoint = Endpoint::new(draft.name, draft.url, draft.method);
                endpoint.id = id;
                endpoint.headers = draft.headers;
                endpoint.body = draft.body;
                endpoint.input_type = draft.input_type;
                state.endpoints.push(endpoint.clone());
                endpoint
            }
        };
        self.inner.persist_endpoints(&state).await?;
        Ok(updated)
    }

    /// Removes an endpoint and every schedule bound to it, stopping
    /// each schedule's driver before the schedule goes away.
    pub async fn delete_endpoint(&self, id: Uuid) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        state.endpoints.retain(|e| e.id != id);

        let doomed: Vec<Uuid> =
            state.schedules.iter().filter(|s| s.endpoint_id == id).map(|s| s.id).collect();
        for schedule_id in &doomed {
            self.inner.drivers.stop(*schedule_id);
            state.schedule_stats.remove(schedule_id);
        }
        state.schedules.retain(|s| s.endpoint_id != id);

        self.inner.persist_endpoints(&state).await?;
        self.inner.persist_schedules(&state).await?;
        self.inner.persist_schedule_stats(&state).await?;
        if !doomed.is_empty() {
            info!(endpoint_id = %id, schedules = doomed.len(), "endpoint deleted with schedules");
        }
        Ok(())
    }

    // ---- schedule lifecycle ----

    /// Creates a schedule bound to an existing endpoint. The schedule
    /// is active by default and its driver starts immediately.
    pub async fn create_schedule(
        &self,
        endpoint_id: Uuid,
        interval_seconds: u64,
    ) -> Result<Schedule> {
        let mut state = self.inner.state.lock().await;
        if state.endpoint(endpoint_id).is_none() {
            return Err(Error::Validation(format!(
                "schedule requires an existing endpoint, none with id {endpoint_id}"
            )));
        }
        validate_interval(interval_seconds)?;

        let schedule = Schedule::new(endpoint_id, interval_seconds);
        state.schedules.push(schedule.clone());
        self.start_driver(&schedule)?;
        self.inner.persist_schedules(&state).await?;
        info!(schedule_id = %schedule.id, interval_seconds, "schedule created");
        Ok(schedule)
    }

    /// Edits a schedule. The old configuration's driver is stopped
    /// before anything mutates, then restarted only if the schedule is
    /// still active, so two timers can never compete for one id.
    pub async fn update_schedule(
        &self,
        id: Uuid,
        endpoint_id: Uuid,
        interval_seconds: u64,
    ) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.schedule(id).is_none() {
            warn!(schedule_id = %id, "update for unknown schedule ignored");
            return Ok(());
        }
        if state.endpoint(endpoint_id).is_none() {
            return Err(Error::Validation(format!(
                "schedule requires an existing endpoint, none with id {endpoint_id}"
            )));
        }
        validate_interval(interval_seconds)?;

        self.inner.drivers.stop(id);
        let restart = {
            // Presence was checked above; mutate in place.
            let Some(schedule) = state.schedule_mut(id) else { return Ok(()) };
            schedule.endpoint_id = endpoint_id;
            schedule.interval_seconds = interval_seconds;
            schedule.is_active
        };
        if restart {
            let Some(schedule) = state.schedule(id).cloned() else { return Ok(()) };
            self.start_driver(&schedule)?;
        }
        self.inner.persist_schedules(&state).await
    }

    /// Flips a schedule's active flag, starting or stopping its driver
    /// accordingly.
    pub async fn toggle_schedule(&self, id: Uuid) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        let Some(schedule) = state.schedule_mut(id) else {
            warn!(schedule_id = %id, "toggle for unknown schedule ignored");
            return Ok(());
        };
        schedule.is_active = !schedule.is_active;
        let now_active = schedule.is_active;
        let schedule = schedule.clone();

        if now_active {
            self.start_driver(&schedule)?;
        } else {
            self.inner.drivers.stop(id);
        }
        debug!(schedule_id = %id, active = now_active, "schedule toggled");
        self.inner.persist_schedules(&state).await
    }

    /// Stops a schedule's driver and removes the schedule with its
    /// stats.
    pub async fn delete_schedule(&self, id: Uuid) -> Result<()> {
        self.inner.remove_schedule(id).await
    }

    /// Probes a schedule's endpoint immediately, outside its timer.
    /// Counts against the schedule's own statistics and sets lastRun,
    /// exactly like a timer tick.
    pub async fn run_schedule_now(&self, id: Uuid) -> Result<()> {
        let dispatched = {
            let mut state = self.inner.state.lock().await;
            let Some(schedule) = state.schedule(id).cloned() else {
                warn!(schedule_id = %id, "run-now for unknown schedule ignored");
                return Ok(());
            };
            match state.endpoint(schedule.endpoint_id).cloned() {
                None => None,
                Some(endpoint) => {
                    if let Some(schedule) = state.schedule_mut(id) {
                        schedule.last_run = Some(Utc::now());
                    }
                    let ctx = recorder::begin_scheduled(&mut state, id);
                    Some((endpoint, ctx))
                }
            }
        };

        let Some((endpoint, ctx)) = dispatched else {
            warn!(schedule_id = %id, "run-now skipped, endpoint gone");
            return Ok(());
        };
        let outcome = self.inner.prober.execute(&endpoint).await;
        self.inner.record_outcome(&endpoint, outcome, ctx).await
    }

    /// Runs one manual test against an endpoint. Counts against the
    /// global request counter; per-schedule statistics are untouched.
    pub async fn test_endpoint(&self, id: Uuid) -> Result<ProbeOutcome> {
        let (endpoint, ctx) = {
            let mut state = self.inner.state.lock().await;
            let Some(endpoint) = state.endpoint(id).cloned() else {
                return Err(Error::EndpointNotFound(id));
            };
            (endpoint, recorder::begin_manual(&mut state))
        };

        let outcome = self.inner.prober.execute(&endpoint).await;
        self.inner.record_outcome(&endpoint, outcome.clone(), ctx).await?;
        Ok(outcome)
    }

    /// Zeroes a schedule's counters and empties its log. The schedule
    /// and its running driver are untouched; the next probe is #1.
    pub async fn clear_schedule_logs(&self, id: Uuid) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        let Some(stats) = state.schedule_stats.get_mut(&id) else {
            return Ok(());
        };
        stats.clear();
        self.inner.persist_schedule_stats(&state).await
    }

    /// Empties the global activity log only.
    pub async fn clear_activity_log(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        state.activity_log.clear();
        self.inner.persist_activity(&state).await
    }

    // ---- read accessors ----

    pub async fn list_endpoints(&self) -> Vec<Endpoint> {
        self.inner.state.lock().await.endpoints.clone()
    }

    pub async fn list_schedules(&self) -> Vec<Schedule> {
        self.inner.state.lock().await.schedules.clone()
    }

    pub async fn get_schedule_stats(&self, id: Uuid) -> Option<ScheduleStats> {
        self.inner.state.lock().await.schedule_stats.get(&id).cloned()
    }

    pub async fn get_global_histories(&self) -> GlobalHistories {
        let state = self.inner.state.lock().await;
        GlobalHistories {
            response_times: state.response_times.to_vec(),
            status_codes: state.status_codes.to_vec(),
        }
    }

    pub async fn get_activity_log(&self) -> Vec<ActivityLogEntry> {
        self.inner.state.lock().await.activity_log.to_vec()
    }

    pub async fn summary(&self) -> Summary {
        let state = self.inner.state.lock().await;
        Summary {
            total_endpoints: state.endpoints.len(),
            active_endpoints: state
                .endpoints
                .iter()
                .filter(|e| e.status == EndpointStatus::Active)
                .count(),
            scheduled_jobs: state.schedules.len(),
            failed_requests: state
                .activity_log
                .iter()
                .filter(|entry| entry.level == LogLevel::Error)
                .count(),
        }
    }

    /// CSV rendering of one schedule's logs, newest first; None when
    /// the schedule has never run.
    pub async fn export_schedule_logs(&self, id: Uuid) -> Option<String> {
        let state = self.inner.state.lock().await;
        state.schedule_stats.get(&id).map(export::schedule_logs_csv)
    }

    fn start_driver(&self, schedule: &Schedule) -> Result<()> {
        let runner: Arc<dyn ScheduleRunner> = self.inner.clone();
        self.inner.drivers.start(runner, schedule.id, schedule.interval())
    }
}

impl Inner {
    /// Removes a schedule, its stats, and its driver; the driver stop
    /// comes first so no timer outlives the schedule.
    async fn remove_schedule(&self, schedule_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        self.drivers.stop(schedule_id);
        state.schedules.retain(|s| s.id != schedule_id);
        state.schedule_stats.remove(&schedule_id);
        self.persist_schedules(&state).await?;
        self.persist_schedule_stats(&state).await
    }

    /// Completion half of a probe: apply the outcome through the
    /// recorder, persist what changed, then hand failures to the
    /// notifier when configured.
    async fn record_outcome(
        &self,
        endpoint: &Endpoint,
        outcome: ProbeOutcome,
        ctx: RecordContext,
    ) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if recorder::record(&mut state, endpoint.id, &outcome, ctx) == Recorded::Discarded {
                debug!(endpoint = %endpoint.name, "probe outcome discarded, target removed mid-flight");
                return Ok(());
            }

            self.persist_endpoints(&state).await?;
            match ctx.schedule_id {
                Some(_) => {
                    self.persist_schedules(&state).await?;
                    self.persist_schedule_stats(&state).await?;
                }
                None => self.persist_global_counter(&state).await?,
            }
            self.persist_histories(&state).await?;
            self.persist_activity(&state).await?;
        }

        if ctx.schedule_id.is_some() && !outcome.is_ok() && self.settings.browser_notifications {
            self.notifier.probe_failed(endpoint, &outcome).await;
        }
        Ok(())
    }

    async fn persist_endpoints(&self, state: &EngineState) -> Result<()> {
        self.store.save_endpoints(&state.endpoints).await.map_err(Error::Store)
    }

    async fn persist_schedules(&self, state: &EngineState) -> Result<()> {
        self.store.save_schedules(&state.schedules).await.map_err(Error::Store)
    }

    async fn persist_schedule_stats(&self, state: &EngineState) -> Result<()> {
        self.store.save_schedule_stats(&state.schedule_stats).await.map_err(Error::Store)
    }

    async fn persist_histories(&self, state: &EngineState) -> Result<()> {
        self.store.save_response_times(&state.response_times).await.map_err(Error::Store)?;
        self.store.save_status_codes(&state.status_codes).await.map_err(Error::Store)
    }

    async fn persist_activity(&self, state: &EngineState) -> Result<()> {
        self.store.save_activity_log(&state.activity_log).await.map_err(Error::Store)
    }

    async fn persist_global_counter(&self, state: &EngineState) -> Result<()> {
        self.store.save_global_counter(state.global_request_counter).await.map_err(Error::Store)
    }
}

#[async_trait]
impl ScheduleRunner for Inner {
    async fn run_tick(&self, schedule_id: Uuid) -> TickOutcome {
        let dispatched = {
            let mut state = self.state.lock().await;
            let Some(schedule) = state.schedule(schedule_id).cloned() else {
                // Deleted while the timer was pending.
                return TickOutcome::Terminate;
            };
            if !schedule.is_active {
                // Stale timer guard: a paused schedule must never fire.
                return TickOutcome::Terminate;
            }
            match state.endpoint(schedule.endpoint_id).cloned() {
                None => None,
                Some(endpoint) => {
                    if let Some(schedule) = state.schedule_mut(schedule_id) {
                        schedule.last_run = Some(Utc::now());
                    }
                    let ctx = recorder::begin_scheduled(&mut state, schedule_id);
                    Some((endpoint, ctx))
                }
            }
        };

        match dispatched {
            None => {
                // Orphan discovered lazily at tick time: the endpoint
                // is gone, so the schedule goes too.
                info!(%schedule_id, "endpoint gone, removing orphaned schedule");
                if let Err(error) = self.remove_schedule(schedule_id).await {
                    error!(%schedule_id, "failed to remove orphaned schedule: {error:#}");
                }
                TickOutcome::Terminate
            }
            Some((endpoint, ctx)) => {
                let outcome = self.prober.execute(&endpoint).await;
                if let Err(error) = self.record_outcome(&endpoint, outcome, ctx).await {
                    error!(%schedule_id, "failed to record probe outcome: {error:#}");
                }
                TickOutcome::Ran
            }
        }
    }
}

fn validate_endpoint(draft: &EndpointDraft) -> Result<()> {
    if draft.name.trim().is_empty() {
        return Err(Error::Validation("endpoint name is required".to_string()));
    }
    if draft.url.trim().is_empty() {
        return Err(Error::Validation("endpoint URL is required".to_string()));
    }
    Url::parse(&draft.url)
        .map_err(|error| Error::Validation(format!("invalid endpoint URL: {error}")))?;
    if draft.method.trim().is_empty() {
        return Err(Error::Validation("HTTP method is required".to_string()));
    }
    Ok(())
}

fn validate_interval(interval_seconds: u64) -> Result<()> {
    if interval_seconds == 0 {
        return Err(Error::Validation("interval must be at least 1 second".to_string()));
    }
    Ok(())
}
