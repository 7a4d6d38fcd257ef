use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the engine's public operations.
///
/// Probe failures are never represented here; a failed probe is
/// recorded as data by the result path.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no endpoint with id {0}")]
    EndpointNotFound(Uuid),
    #[error("no schedule with id {0}")]
    ScheduleNotFound(Uuid),
    #[error("a driver is already running for schedule {0}")]
    AlreadyRunning(Uuid),
    #[error("store error: {0:#}")]
    Store(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
