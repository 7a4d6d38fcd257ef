use super::*;
use crate::models::{ACTIVITY_LOG_CAPACITY, HISTORY_CAPACITY};
use crate::store::MemoryStore;
use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time;

/// Replays a scripted sequence of outcomes, then repeats 200/10ms.
struct ScriptedProber {
    script: StdMutex<VecDeque<ProbeOutcome>>,
}

impl ScriptedProber {
    fn new(script: impl IntoIterator<Item = ProbeOutcome>) -> Self {
        Self { script: StdMutex::new(script.into_iter().collect()) }
    }

    fn always_ok() -> Self {
        Self::new([])
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn execute(&self, _endpoint: &Endpoint) -> ProbeOutcome {
        self.script.lock().unwrap().pop_front().unwrap_or(completed(200, 10))
    }
}

/// Completes every probe with 200/10ms after a fixed delay, for
/// probes that must still be in flight when state changes under them.
struct SlowProber {
    delay: Duration,
}

#[async_trait]
impl Prober for SlowProber {
    async fn execute(&self, _endpoint: &Endpoint) -> ProbeOutcome {
        time::sleep(self.delay).await;
        completed(200, 10)
    }
}

#[derive(Default)]
struct CountingNotifier {
    calls: AtomicUsize,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn probe_failed(&self, _endpoint: &Endpoint, _outcome: &ProbeOutcome) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

const fn completed(status_code: u16, response_time_ms: u64) -> ProbeOutcome {
    ProbeOutcome::Completed {
        status_code,
        ok: status_code >= 200 && status_code < 300,
        response_time_ms,
    }
}

fn failed(error: &str) -> ProbeOutcome {
    ProbeOutcome::Failed { error: error.to_string(), response_time_ms: 0 }
}

fn draft(name: &str) -> EndpointDraft {
    EndpointDraft {
        name: name.to_string(),
        url: "https://example.com/health".to_string(),
        method: "GET".to_string(),
        ..EndpointDraft::default()
    }
}

fn engine_with(prober: Arc<dyn Prober>, settings: Settings) -> (Watchdog, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(crate::notify::LogNotifier);
    (Watchdog::new(settings, store.clone(), prober, notifier), store)
}

fn engine(prober: Arc<dyn Prober>) -> (Watchdog, Arc<MemoryStore>) {
    engine_with(prober, Settings::default())
}

#[tokio::test(start_paused = true)]
async fn scheduled_probes_accumulate_stats() {
    let (watchdog, _store) = engine(Arc::new(ScriptedProber::always_ok()));
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();

    time::sleep(Duration::from_millis(3500)).await;

    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.success_count, 3);
    assert_eq!(stats.error_count, 0);
    assert_eq!(stats.logs.len(), 3);
    assert_eq!(stats.logs.iter().last().unwrap().request_number, 3);
    assert!(stats.last_success.is_some());

    let endpoint = watchdog.list_endpoints().await.remove(0);
    assert_eq!(endpoint.status, EndpointStatus::Success);
    assert!(endpoint.last_checked.is_some());

    let schedule = watchdog.list_schedules().await.remove(0);
    assert!(schedule.last_run.is_some());
}

#[tokio::test(start_paused = true)]
async fn transport_failure_counts_as_error() {
    let prober = Arc::new(ScriptedProber::new([failed("connection refused")]));
    let (watchdog, _store) = engine(prober);
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();

    time::sleep(Duration::from_millis(1500)).await;

    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.error_count, 1);
    let entry = stats.logs.iter().last().unwrap();
    assert_eq!(entry.status, 0);
    assert_eq!(entry.message, "Request failed: connection refused");

    let activity = watchdog.get_activity_log().await;
    assert_eq!(
        activity.last().unwrap().message,
        "Job #1 | Request failed: connection refused | 1 seconds schedule"
    );
}

#[tokio::test(start_paused = true)]
async fn toggling_pauses_and_resumes_without_resetting_numbers() {
    let (watchdog, _store) = engine(Arc::new(ScriptedProber::always_ok()));
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();

    time::sleep(Duration::from_millis(2500)).await;
    watchdog.toggle_schedule(schedule.id).await.unwrap();
    time::sleep(Duration::from_secs(5)).await;

    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 2, "paused schedule must not fire");

    watchdog.toggle_schedule(schedule.id).await.unwrap();
    time::sleep(Duration::from_millis(1500)).await;

    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.logs.iter().last().unwrap().request_number, 3);
}

#[tokio::test(start_paused = true)]
async fn deleting_endpoint_cascades_to_schedules() {
    let (watchdog, store) = engine(Arc::new(ScriptedProber::always_ok()));
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let first = watchdog.create_schedule(endpoint.id, 1).await.unwrap();
    let second = watchdog.create_schedule(endpoint.id, 2).await.unwrap();

    time::sleep(Duration::from_millis(1500)).await;
    watchdog.delete_endpoint(endpoint.id).await.unwrap();

    assert!(watchdog.list_endpoints().await.is_empty());
    assert!(watchdog.list_schedules().await.is_empty());
    assert!(watchdog.get_schedule_stats(first.id).await.is_none());
    assert!(watchdog.get_schedule_stats(second.id).await.is_none());
    assert!(store.load_schedules().await.unwrap().is_empty());

    // No driver survives the cascade.
    let before = watchdog.get_activity_log().await.len();
    time::sleep(Duration::from_secs(10)).await;
    assert_eq!(watchdog.get_activity_log().await.len(), before);
}

#[tokio::test(start_paused = true)]
async fn orphaned_schedule_is_removed_at_tick_time() {
    let store = Arc::new(MemoryStore::new());
    let orphan = Schedule::new(Uuid::new_v4(), 1);
    store.save_schedules(std::slice::from_ref(&orphan)).await.unwrap();

    let watchdog = Watchdog::new(
        Settings::default(),
        store.clone(),
        Arc::new(ScriptedProber::always_ok()),
        Arc::new(crate::notify::LogNotifier),
    );
    watchdog.start().await.unwrap();
    assert_eq!(watchdog.list_schedules().await.len(), 1);

    time::sleep(Duration::from_millis(1500)).await;

    assert!(watchdog.list_schedules().await.is_empty());
    assert!(store.load_schedules().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn clearing_logs_restarts_numbering_from_one() {
    let (watchdog, _store) = engine(Arc::new(ScriptedProber::always_ok()));
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();

    time::sleep(Duration::from_millis(3500)).await;
    watchdog.clear_schedule_logs(schedule.id).await.unwrap();

    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 0);
    assert!(stats.logs.is_empty());
    assert!(stats.last_success.is_none());

    time::sleep(Duration::from_secs(1)).await;

    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.logs.iter().last().unwrap().request_number, 1);
}

#[tokio::test(start_paused = true)]
async fn manual_tests_count_globally_not_per_schedule() {
    let prober = Arc::new(ScriptedProber::new([completed(200, 42), completed(503, 7)]));
    let (watchdog, store) = engine(prober);
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 3600).await.unwrap();

    let first = watchdog.test_endpoint(endpoint.id).await.unwrap();
    assert!(first.is_ok());
    let second = watchdog.test_endpoint(endpoint.id).await.unwrap();
    assert!(!second.is_ok());

    let activity = watchdog.get_activity_log().await;
    assert_eq!(activity.len(), 2);
    assert_eq!(activity[0].message, "Manual #1 | 200 - 42ms | Manual test");
    assert_eq!(activity[1].message, "Manual #2 | 503 - 7ms | Manual test");
    assert!(!activity[0].is_scheduled);
    assert_eq!(store.load_global_counter().await.unwrap(), 2);

    // Manual tests never touch per-schedule counters.
    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap_or_default();
    assert_eq!(stats.total_requests, 0);

    let missing = watchdog.test_endpoint(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(Error::EndpointNotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn run_now_probes_outside_the_timer() {
    let (watchdog, _store) = engine(Arc::new(ScriptedProber::always_ok()));
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 3600).await.unwrap();

    watchdog.run_schedule_now(schedule.id).await.unwrap();

    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 1);
    assert!(watchdog.list_schedules().await[0].last_run.is_some());
    let activity = watchdog.get_activity_log().await;
    assert_eq!(activity[0].message, "Job #1 | Status 200 - 10ms | 1 hours schedule");
}

#[tokio::test(start_paused = true)]
async fn updating_a_schedule_replaces_its_timer() {
    let (watchdog, _store) = engine(Arc::new(ScriptedProber::always_ok()));
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();

    time::sleep(Duration::from_millis(1500)).await;
    watchdog.update_schedule(schedule.id, endpoint.id, 5).await.unwrap();

    // Old timer gone: next fire is five seconds after the update.
    time::sleep(Duration::from_millis(4500)).await;
    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 1);

    time::sleep(Duration::from_secs(1)).await;
    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(watchdog.list_schedules().await[0].interval_seconds, 5);
}

#[tokio::test(start_paused = true)]
async fn stopped_schedule_still_records_in_flight_probe() {
    let prober = Arc::new(SlowProber { delay: Duration::from_secs(2) });
    let (watchdog, _store) = engine(prober);
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();

    // Probe dispatches at t=1s and completes at t=3s; pause at t=1.5s.
    time::sleep(Duration::from_millis(1500)).await;
    watchdog.toggle_schedule(schedule.id).await.unwrap();
    time::sleep(Duration::from_secs(3)).await;

    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.success_count, 1);
    assert_eq!(stats.logs.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn clear_during_in_flight_probe_discards_its_completion() {
    let prober = Arc::new(SlowProber { delay: Duration::from_secs(2) });
    let (watchdog, _store) = engine(prober);
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();

    time::sleep(Duration::from_millis(1500)).await;
    watchdog.clear_schedule_logs(schedule.id).await.unwrap();
    watchdog.toggle_schedule(schedule.id).await.unwrap();
    time::sleep(Duration::from_secs(3)).await;

    // The completion carried a number above the cleared baseline.
    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.success_count + stats.error_count, stats.total_requests);
    assert!(stats.logs.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_completion_is_discarded_even_when_numbers_realign() {
    let prober = Arc::new(SlowProber { delay: Duration::from_secs(10) });
    let (watchdog, _store) = engine(prober);
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();

    // Probe #1 dispatches at t=1s and stays in flight for ten seconds.
    time::sleep(Duration::from_millis(1500)).await;
    watchdog.clear_schedule_logs(schedule.id).await.unwrap();
    watchdog.toggle_schedule(schedule.id).await.unwrap();

    // Run-now hands out number 1 again; the discarded probe's number
    // matches the live counter once this one completes.
    watchdog.run_schedule_now(schedule.id).await.unwrap();
    time::sleep(Duration::from_secs(5)).await;

    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.success_count + stats.error_count, stats.total_requests);
    let numbers: Vec<u64> = stats.logs.iter().map(|entry| entry.request_number).collect();
    assert_eq!(numbers, vec![1]);
}

#[tokio::test(start_paused = true)]
async fn global_histories_and_activity_log_stay_bounded() {
    let (watchdog, _store) = engine(Arc::new(ScriptedProber::always_ok()));
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();

    for _ in 0..(ACTIVITY_LOG_CAPACITY + 5) {
        watchdog.test_endpoint(endpoint.id).await.unwrap();
    }

    let activity = watchdog.get_activity_log().await;
    assert_eq!(activity.len(), ACTIVITY_LOG_CAPACITY);
    assert_eq!(activity[0].request_number, 6);
    assert_eq!(activity.last().unwrap().request_number, (ACTIVITY_LOG_CAPACITY + 5) as u64);

    let histories = watchdog.get_global_histories().await;
    assert_eq!(histories.response_times.len(), HISTORY_CAPACITY);
    assert_eq!(histories.status_codes.len(), HISTORY_CAPACITY);
}

#[tokio::test(start_paused = true)]
async fn scheduled_failures_notify_when_enabled() {
    let notifier = Arc::new(CountingNotifier::default());
    let prober = Arc::new(ScriptedProber::new([failed("boom"), failed("boom")]));
    let store = Arc::new(MemoryStore::new());
    let settings = Settings { browser_notifications: true, ..Settings::default() };
    let watchdog = Watchdog::new(settings, store, prober, notifier.clone());

    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    watchdog.create_schedule(endpoint.id, 1).await.unwrap();
    time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);

    // Manual tests never notify, failing or not.
    let outcome = watchdog.test_endpoint(endpoint.id).await.unwrap();
    assert!(!outcome.is_ok());
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn notifications_off_by_default() {
    let notifier = Arc::new(CountingNotifier::default());
    let prober = Arc::new(ScriptedProber::new([failed("boom")]));
    let store = Arc::new(MemoryStore::new());
    let watchdog = Watchdog::new(Settings::default(), store, prober, notifier.clone());

    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    watchdog.create_schedule(endpoint.id, 1).await.unwrap();
    time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn state_survives_a_restart_through_the_store() {
    let store = Arc::new(MemoryStore::new());
    let prober = Arc::new(ScriptedProber::always_ok());
    let watchdog = Watchdog::new(
        Settings::default(),
        store.clone(),
        prober.clone(),
        Arc::new(crate::notify::LogNotifier),
    );
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();
    time::sleep(Duration::from_millis(2500)).await;
    watchdog.test_endpoint(endpoint.id).await.unwrap();
    watchdog.shutdown().await;

    let revived =
        Watchdog::new(Settings::default(), store, prober, Arc::new(crate::notify::LogNotifier));
    revived.start().await.unwrap();

    assert_eq!(revived.list_endpoints().await[0].id, endpoint.id);
    let stats = revived.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(revived.get_activity_log().await.len(), 3);

    // Numbering continues where the previous run stopped.
    time::sleep(Duration::from_millis(1500)).await;
    let stats = revived.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 3);
}

#[tokio::test]
async fn endpoint_validation_rejects_bad_drafts() {
    let (watchdog, _store) = engine(Arc::new(ScriptedProber::always_ok()));

    let nameless = EndpointDraft { name: "  ".to_string(), ..draft("x") };
    assert!(matches!(
        watchdog.create_endpoint(nameless).await,
        Err(Error::Validation(_))
    ));

    let bad_url = EndpointDraft { url: "not a url".to_string(), ..draft("api") };
    assert!(matches!(watchdog.create_endpoint(bad_url).await, Err(Error::Validation(_))));
}

#[tokio::test]
async fn schedule_validation_rejects_bad_inputs() {
    let (watchdog, _store) = engine(Arc::new(ScriptedProber::always_ok()));
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();

    assert!(matches!(
        watchdog.create_schedule(Uuid::new_v4(), 30).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        watchdog.create_schedule(endpoint.id, 0).await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn editing_an_endpoint_resets_probe_state() {
    let (watchdog, _store) = engine(Arc::new(ScriptedProber::always_ok()));
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    watchdog.test_endpoint(endpoint.id).await.unwrap();
    assert_eq!(watchdog.list_endpoints().await[0].status, EndpointStatus::Success);

    let mut edited = draft("api renamed");
    edited.url = "https://example.com/v2/health".to_string();
    let updated = watchdog.update_endpoint(endpoint.id, edited).await.unwrap();

    assert_eq!(updated.id, endpoint.id);
    assert_eq!(updated.status, EndpointStatus::Active);
    assert!(updated.last_checked.is_none());
    assert!(updated.response_time_ms.is_none());
    assert_eq!(updated.created_at, endpoint.created_at);
}

#[tokio::test(start_paused = true)]
async fn summary_rolls_up_current_state() {
    let prober = Arc::new(ScriptedProber::new([failed("boom")]));
    let (watchdog, _store) = engine(prober);
    let healthy = watchdog.create_endpoint(draft("healthy")).await.unwrap();
    let flaky = watchdog.create_endpoint(draft("flaky")).await.unwrap();
    watchdog.create_schedule(flaky.id, 1).await.unwrap();

    time::sleep(Duration::from_millis(1500)).await;
    watchdog.test_endpoint(healthy.id).await.unwrap();

    let summary = watchdog.summary().await;
    assert_eq!(summary.total_endpoints, 2);
    // "healthy" probed fine, "flaky" failed; neither is still Active.
    assert_eq!(summary.active_endpoints, 0);
    assert_eq!(summary.scheduled_jobs, 1);
    assert_eq!(summary.failed_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn export_renders_schedule_logs_as_csv() {
    let prober = Arc::new(ScriptedProber::new([completed(200, 42), failed("timed out")]));
    let (watchdog, _store) = engine(prober);
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();

    time::sleep(Duration::from_millis(2500)).await;

    let csv = watchdog.export_schedule_logs(schedule.id).await.unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Request Number,Timestamp,Status Code,Response Time (ms),Level,Message");
    assert!(lines[1].starts_with("2,"), "newest first: {}", lines[1]);
    assert!(lines[1].contains(",ERROR,,error,"));
    assert!(lines[2].starts_with("1,"));
    assert!(lines[2].contains(",200,42,success,"));

    assert!(watchdog.export_schedule_logs(Uuid::new_v4()).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn clearing_activity_log_leaves_schedule_logs_alone() {
    let (watchdog, _store) = engine(Arc::new(ScriptedProber::always_ok()));
    let endpoint = watchdog.create_endpoint(draft("api")).await.unwrap();
    let schedule = watchdog.create_schedule(endpoint.id, 1).await.unwrap();
    time::sleep(Duration::from_millis(2500)).await;

    watchdog.clear_activity_log().await.unwrap();

    assert!(watchdog.get_activity_log().await.is_empty());
    let stats = watchdog.get_schedule_stats(schedule.id).await.unwrap();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.logs.len(), 2);
}
