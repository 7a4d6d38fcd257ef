use std::collections::HashMap;
use uuid::Uuid;

use crate::history::BoundedLog;
use crate::models::{
    ACTIVITY_LOG_CAPACITY, ActivityLogEntry, Endpoint, HISTORY_CAPACITY, ResponseTimeSample,
    Schedule, ScheduleStats, StatusCodeSample,
};

/// The engine-owned state container.
///
/// Every mutation runs under the engine's single state lock; readers
/// never observe a partially applied probe outcome.
pub(crate) struct EngineState {
    pub endpoints: Vec<Endpoint>,
    pub schedules: Vec<Schedule>,
    pub schedule_stats: HashMap<Uuid, ScheduleStats>,
    pub activity_log: BoundedLog<ActivityLogEntry>,
    pub response_times: BoundedLog<ResponseTimeSample>,
    pub status_codes: BoundedLog<StatusCodeSample>,
    pub global_request_counter: u64,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            endpoints: Vec::new(),
            schedules: Vec::new(),
            schedule_stats: HashMap::new(),
            activity_log: BoundedLog::new(ACTIVITY_LOG_CAPACITY),
            response_times: BoundedLog::new(HISTORY_CAPACITY),
            status_codes: BoundedLog::new(HISTORY_CAPACITY),
            global_request_counter: 0,
        }
    }

    pub fn endpoint(&self, id: Uuid) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    pub fn endpoint_mut(&mut self, id: Uuid) -> Option<&mut Endpoint> {
        self.endpoints.iter_mut().find(|e| e.id == id)
    }

    pub fn schedule(&self, id: Uuid) -> Option<&Schedule> {
        self.schedules.iter().find(|s| s.id == id)
    }

    pub fn schedule_mut(&mut self, id: Uuid) -> Option<&mut Schedule> {
        self.schedules.iter_mut().find(|s| s.id == id)
    }
}
