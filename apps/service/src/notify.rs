//! Failure notification seam.
//!
//! Scheduled probe failures are handed to a [`Notifier`] when
//! notifications are enabled in the settings. Manual tests never
//! notify.

use async_trait::async_trait;
use tracing::warn;

use crate::models::Endpoint;
use crate::monitoring::ProbeOutcome;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn probe_failed(&self, endpoint: &Endpoint, outcome: &ProbeOutcome);
}

/// Default notifier: a structured warning on the service log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn probe_failed(&self, endpoint: &Endpoint, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Completed { status_code, response_time_ms, .. } => {
                warn!(
                    endpoint = %endpoint.name,
                    status_code,
                    response_time_ms,
                    "endpoint check failed"
                );
            }
            ProbeOutcome::Failed { error, response_time_ms } => {
                warn!(
                    endpoint = %endpoint.name,
                    response_time_ms,
                    "endpoint unreachable: {error}"
                );
            }
        }
    }
}
