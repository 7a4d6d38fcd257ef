//! Watchdog service library.
//!
//! A schedule and probe execution engine: endpoints describe HTTP
//! targets, schedules probe them on fixed intervals, and every outcome
//! flows into bounded per-schedule logs, global trend histories, and a
//! global activity log.

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod history;
pub mod models;
pub mod monitoring;
pub mod notify;
pub mod store;

pub use engine::{EndpointDraft, GlobalHistories, Summary, Watchdog};
pub use error::{Error, Result};
