use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use std::time::{Duration, Instant};

use crate::models::{Endpoint, LogLevel};

/// Outcome of a single probe.
///
/// A probe that never produced an HTTP response is `Failed`; that is
/// recorded data, not an error of the engine. Elapsed wall-clock time
/// is populated on both variants.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Completed { status_code: u16, ok: bool, response_time_ms: u64 },
    Failed { error: String, response_time_ms: u64 },
}

impl ProbeOutcome {
    /// True only for an HTTP 2xx response.
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeOutcome::Completed { ok: true, .. })
    }

    pub fn response_time_ms(&self) -> u64 {
        match self {
            ProbeOutcome::Completed { response_time_ms, .. }
            | ProbeOutcome::Failed { response_time_ms, .. } => *response_time_ms,
        }
    }

    /// Status code of the response; 0 for a transport-level failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ProbeOutcome::Completed { status_code, .. } => *status_code,
            ProbeOutcome::Failed { .. } => 0,
        }
    }

    pub fn level(&self) -> LogLevel {
        if self.is_ok() { LogLevel::Success } else { LogLevel::Error }
    }
}

/// Executes one probe against an endpoint definition.
///
/// Implementations measure, never retry; retry policy belongs to the
/// caller.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn execute(&self, endpoint: &Endpoint) -> ProbeOutcome;
}

/// HTTP prober over a shared client with one per-request timeout.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Builds and sends the request verbatim from the endpoint
    /// definition. The body is skipped for GET.
    async fn send(&self, endpoint: &Endpoint) -> Result<reqwest::Response> {
        let method = Method::from_bytes(endpoint.method.as_bytes())?;
        let mut request = self.client.request(method.clone(), &endpoint.url);

        for (name, value) in &endpoint.headers {
            request = request.header(name, value);
        }

        if let Some(body) = &endpoint.body {
            if method != Method::GET {
                request = request.body(body.clone());
            }
        }

        Ok(request.send().await?)
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn execute(&self, endpoint: &Endpoint) -> ProbeOutcome {
        let started = Instant::now();

        match self.send(endpoint).await {
            Ok(response) => {
                let response_time_ms = started.elapsed().as_millis() as u64;
                let status = response.status();
                ProbeOutcome::Completed {
                    status_code: status.as_u16(),
                    ok: status.is_success(),
                    response_time_ms,
                }
            }
            Err(error) => {
                let response_time_ms = started.elapsed().as_millis() as u64;
                ProbeOutcome::Failed { error: format!("{error:#}"), response_time_ms }
            }
        }
    }
}
