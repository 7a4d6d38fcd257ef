use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

use super::EntityStore;
use crate::history::BoundedLog;
use crate::models::{
    ACTIVITY_LOG_CAPACITY, ActivityLogEntry, Endpoint, HISTORY_CAPACITY, ResponseTimeSample,
    Schedule, ScheduleStats, StatusCodeSample,
};

/// JSON snapshot store: one file per persisted collection under a data
/// directory. Each save rewrites the collection's file whole.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn read<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let path = self.path(key);
        tokio::task::spawn_blocking(move || -> Result<Option<T>> {
            let raw = match std::fs::read(&path) {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            let value = serde_json::from_slice(&raw)
                .with_context(|| format!("malformed snapshot {}", path.display()))?;
            Ok(Some(value))
        })
        .await?
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path(key);
        let raw = serde_json::to_vec_pretty(value)?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, raw)
                .with_context(|| format!("failed to write snapshot {}", path.display()))
        })
        .await?
    }
}

#[async_trait]
impl EntityStore for JsonFileStore {
    async fn load_endpoints(&self) -> Result<Vec<Endpoint>> {
        Ok(self.read("endpoints").await?.unwrap_or_default())
    }

    async fn save_endpoints(&self, endpoints: &[Endpoint]) -> Result<()> {
        self.write("endpoints", &endpoints).await
    }

    async fn load_schedules(&self) -> Result<Vec<Schedule>> {
        Ok(self.read("schedules").await?.unwrap_or_default())
    }

    async fn save_schedules(&self, schedules: &[Schedule]) -> Result<()> {
        self.write("schedules", &schedules).await
    }

    async fn load_schedule_stats(&self) -> Result<HashMap<Uuid, ScheduleStats>> {
        Ok(self.read("schedule_stats").await?.unwrap_or_default())
    }

    async fn save_schedule_stats(&self, stats: &HashMap<Uuid, ScheduleStats>) -> Result<()> {
        self.write("schedule_stats", stats).await
    }

    async fn load_activity_log(&self) -> Result<BoundedLog<ActivityLogEntry>> {
        Ok(self
            .read("activity_log")
            .await?
            .unwrap_or_else(|| BoundedLog::new(ACTIVITY_LOG_CAPACITY)))
    }

    async fn save_activity_log(&self, log: &BoundedLog<ActivityLogEntry>) -> Result<()> {
        self.write("activity_log", log).await
    }

    async fn load_response_times(&self) -> Result<BoundedLog<ResponseTimeSample>> {
        Ok(self
            .read("response_time_history")
            .await?
            .unwrap_or_else(|| BoundedLog::new(HISTORY_CAPACITY)))
    }

    async fn save_response_times(&self, history: &BoundedLog<ResponseTimeSample>) -> Result<()> {
        self.write("response_time_history", history).await
    }

    async fn load_status_codes(&self) -> Result<BoundedLog<StatusCodeSample>> {
        Ok(self
            .read("status_code_history")
            .await?
            .unwrap_or_else(|| BoundedLog::new(HISTORY_CAPACITY)))
    }

    async fn save_status_codes(&self, history: &BoundedLog<StatusCodeSample>) -> Result<()> {
        self.write("status_code_history", history).await
    }

    async fn load_global_counter(&self) -> Result<u64> {
        Ok(self.read("global_request_counter").await?.unwrap_or(0))
    }

    async fn save_global_counter(&self, value: u64) -> Result<()> {
        self.write("global_request_counter", &value).await
    }
}
