use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::history::BoundedLog;

/// Per-schedule log capacity; oldest entries are evicted first.
pub const SCHEDULE_LOG_CAPACITY: usize = 100;
/// Global activity log capacity.
pub const ACTIVITY_LOG_CAPACITY: usize = 1000;
/// Capacity of the global response-time and status-code histories.
pub const HISTORY_CAPACITY: usize = 100;

/// Health of an endpoint as reported by its most recent probe.
///
/// `Active` means the endpoint has been created but never probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Active,
    Success,
    Error,
}

impl std::fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointStatus::Active => write!(f, "active"),
            EndpointStatus::Success => write!(f, "success"),
            EndpointStatus::Error => write!(f, "error"),
        }
    }
}

/// Kind of payload an endpoint expects in its request body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    None,
    Text,
    Image,
    Video,
}

/// A user-defined HTTP endpoint under observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub input_type: InputType,
    pub status: EndpointStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub response_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl Endpoint {
    pub fn new(name: String, url: String, method: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            url,
            method,
            headers: HashMap::new(),
            body: None,
            input_type: InputType::None,
            status: EndpointStatus::Active,
            last_checked: None,
            response_time_ms: None,
            created_at: Utc::now(),
        }
    }
}

/// A recurring probe configuration bound to one endpoint.
///
/// `last_run` and the running driver are engine-owned; everything else
/// is user-edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub interval_seconds: u64,
    pub is_active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(endpoint_id: Uuid, interval_seconds: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            interval_seconds,
            is_active: true,
            last_run: None,
            created_at: Utc::now(),
        }
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_seconds)
    }
}

/// Severity of a recorded probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Success,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Success => write!(f, "success"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One probe outcome in a schedule's own log.
///
/// `status` is 0 when the request never produced an HTTP response.
/// `request_number` is the 1-based position in the schedule's own
/// counter; it keeps increasing even after older entries are evicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub response_time_ms: u64,
    pub level: LogLevel,
    pub message: String,
    pub request_number: u64,
}

/// Per-schedule counters and bounded probe log.
///
/// Created lazily on a schedule's first run, reset in place by the
/// clear operation, deleted together with its schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleStats {
    pub total_requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub logs: BoundedLog<LogEntry>,
    /// Bumped by every clear. A probe dispatched before a clear carries
    /// the old generation, so its completion is recognisable as stale
    /// even after the counters grow back to its request number.
    #[serde(default)]
    pub generation: u64,
}

impl Default for ScheduleStats {
    fn default() -> Self {
        Self {
            total_requests: 0,
            success_count: 0,
            error_count: 0,
            last_success: None,
            last_error: None,
            logs: BoundedLog::new(SCHEDULE_LOG_CAPACITY),
            generation: 0,
        }
    }
}

impl ScheduleStats {
    /// Zeroes every counter and empties the log; the schedule itself
    /// and its running driver are untouched.
    pub fn clear(&mut self) {
        self.total_requests = 0;
        self.success_count = 0;
        self.error_count = 0;
        self.last_success = None;
        self.last_error = None;
        self.logs.clear();
        self.generation += 1;
    }
}

/// One entry in the global activity log, joining a probe outcome with
/// its job metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub endpoint: String,
    pub message: String,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub request_number: u64,
    pub schedule_id: Option<Uuid>,
    pub is_scheduled: bool,
}

/// Latency sample for the global trend history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTimeSample {
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: u64,
    pub endpoint_name: String,
}

/// Status-code sample for the global trend history; 0 marks a
/// transport-level failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCodeSample {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub endpoint_name: String,
}

/// Renders an interval the way activity messages spell it, e.g.
/// `45 seconds`, `5 minutes`, `2 hours`.
pub fn format_interval(seconds: u64) -> String {
    if seconds < 60 {
        format!("{seconds} seconds")
    } else if seconds < 3600 {
        format!("{} minutes", seconds / 60)
    } else {
        format!("{} hours", seconds / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_formatting() {
        assert_eq!(format_interval(45), "45 seconds");
        assert_eq!(format_interval(60), "1 minutes");
        assert_eq!(format_interval(300), "5 minutes");
        assert_eq!(format_interval(7200), "2 hours");
    }

    #[test]
    fn clear_resets_every_counter() {
        let mut stats = ScheduleStats::default();
        stats.total_requests = 7;
        stats.success_count = 5;
        stats.error_count = 2;
        stats.last_success = Some(Utc::now());
        stats.last_error = Some(Utc::now());
        stats.logs.push(LogEntry {
            timestamp: Utc::now(),
            status: 200,
            response_time_ms: 12,
            level: LogLevel::Success,
            message: "200 - 12ms".to_string(),
            request_number: 7,
        });

        stats.clear();

        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.success_count, 0);
        assert_eq!(stats.error_count, 0);
        assert!(stats.last_success.is_none());
        assert!(stats.last_error.is_none());
        assert_eq!(stats.generation, 1);
        assert!(stats.logs.is_empty());
    }

    #[test]
    fn status_enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&EndpointStatus::Success).unwrap(), "\"success\"");
        assert_eq!(serde_json::to_string(&LogLevel::Error).unwrap(), "\"error\"");
        assert_eq!(serde_json::to_string(&InputType::None).unwrap(), "\"none\"");
    }
}
