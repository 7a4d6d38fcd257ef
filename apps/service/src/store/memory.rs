use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::EntityStore;
use crate::history::BoundedLog;
use crate::models::{
    ACTIVITY_LOG_CAPACITY, ActivityLogEntry, Endpoint, HISTORY_CAPACITY, ResponseTimeSample,
    Schedule, ScheduleStats, StatusCodeSample,
};

/// In-memory store. Backs the engine in tests and in storeless runs;
/// contents live as long as the store itself.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    endpoints: Vec<Endpoint>,
    schedules: Vec<Schedule>,
    schedule_stats: HashMap<Uuid, ScheduleStats>,
    activity_log: Option<BoundedLog<ActivityLogEntry>>,
    response_times: Option<BoundedLog<ResponseTimeSample>>,
    status_codes: Option<BoundedLog<StatusCodeSample>>,
    global_counter: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn load_endpoints(&self) -> Result<Vec<Endpoint>> {
        Ok(self.inner.lock().unwrap().endpoints.clone())
    }

    async fn save_endpoints(&self, endpoints: &[Endpoint]) -> Result<()> {
        self.inner.lock().unwrap().endpoints = endpoints.to_vec();
        Ok(())
    }

    async fn load_schedules(&self) -> Result<Vec<Schedule>> {
        Ok(self.inner.lock().unwrap().schedules.clone())
    }

    async fn save_schedules(&self, schedules: &[Schedule]) -> Result<()> {
        self.inner.lock().unwrap().schedules = schedules.to_vec();
        Ok(())
    }

    async fn load_schedule_stats(&self) -> Result<HashMap<Uuid, ScheduleStats>> {
        Ok(self.inner.lock().unwrap().schedule_stats.clone())
    }

    async fn save_schedule_stats(&self, stats: &HashMap<Uuid, ScheduleStats>) -> Result<()> {
        self.inner.lock().unwrap().schedule_stats = stats.clone();
        Ok(())
    }

    async fn load_activity_log(&self) -> Result<BoundedLog<ActivityLogEntry>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .activity_log
            .clone()
            .unwrap_or_else(|| BoundedLog::new(ACTIVITY_LOG_CAPACITY)))
    }

    async fn save_activity_log(&self, log: &BoundedLog<ActivityLogEntry>) -> Result<()> {
        self.inner.lock().unwrap().activity_log = Some(log.clone());
        Ok(())
    }

    async fn load_response_times(&self) -> Result<BoundedLog<ResponseTimeSample>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .response_times
            .clone()
            .unwrap_or_else(|| BoundedLog::new(HISTORY_CAPACITY)))
    }

    async fn save_response_times(&self, history: &BoundedLog<ResponseTimeSample>) -> Result<()> {
        self.inner.lock().unwrap().response_times = Some(history.clone());
        Ok(())
    }

    async fn load_status_codes(&self) -> Result<BoundedLog<StatusCodeSample>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .status_codes
            .clone()
            .unwrap_or_else(|| BoundedLog::new(HISTORY_CAPACITY)))
    }

    async fn save_status_codes(&self, history: &BoundedLog<StatusCodeSample>) -> Result<()> {
        self.inner.lock().unwrap().status_codes = Some(history.clone());
        Ok(())
    }

    async fn load_global_counter(&self) -> Result<u64> {
        Ok(self.inner.lock().unwrap().global_counter)
    }

    async fn save_global_counter(&self, value: u64) -> Result<()> {
        self.inner.lock().unwrap().global_counter = value;
        Ok(())
    }
}
