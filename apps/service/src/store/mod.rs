/// Persistence abstraction
///
/// The engine reads and writes its entities through the `EntityStore`
/// trait and never assumes a storage technology. Every save replaces a
/// whole collection; there are no partial writes.
pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::history::BoundedLog;
use crate::models::{
    ActivityLogEntry, Endpoint, ResponseTimeSample, Schedule, ScheduleStats, StatusCodeSample,
};

/// Storage surface for everything the engine persists, one load/save
/// pair per collection. Loading a collection that was never saved
/// returns its empty default.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn load_endpoints(&self) -> Result<Vec<Endpoint>>;
    async fn save_endpoints(&self, endpoints: &[Endpoint]) -> Result<()>;

    async fn load_schedules(&self) -> Result<Vec<Schedule>>;
    async fn save_schedules(&self, schedules: &[Schedule]) -> Result<()>;

    async fn load_schedule_stats(&self) -> Result<HashMap<Uuid, ScheduleStats>>;
    async fn save_schedule_stats(&self, stats: &HashMap<Uuid, ScheduleStats>) -> Result<()>;

    async fn load_activity_log(&self) -> Result<BoundedLog<ActivityLogEntry>>;
    async fn save_activity_log(&self, log: &BoundedLog<ActivityLogEntry>) -> Result<()>;

    async fn load_response_times(&self) -> Result<BoundedLog<ResponseTimeSample>>;
    async fn save_response_times(&self, history: &BoundedLog<ResponseTimeSample>) -> Result<()>;

    async fn load_status_codes(&self) -> Result<BoundedLog<StatusCodeSample>>;
    async fn save_status_codes(&self, history: &BoundedLog<StatusCodeSample>) -> Result<()>;

    async fn load_global_counter(&self) -> Result<u64>;
    async fn save_global_counter(&self, value: u64) -> Result<()>;
}
