//! Bounded polling for backends that answer a submission with a job handle.
//!
//! A job moves `submitted -> succeeded | failed | timed-out`. Running out of
//! poll attempts is reported as [`ProviderError::Timeout`], never as a
//! failure: the remote job may still finish on its own.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobHandle {
    pub status_url: String,
    pub cancel_url: Option<String>,
    pub created_at: Instant,
}

impl JobHandle {
    pub fn new(status_url: impl Into<String>) -> Self {
        Self {
            status_url: status_url.into(),
            cancel_url: None,
            created_at: Instant::now(),
        }
    }

    pub fn with_cancel_url(mut self, cancel_url: Option<String>) -> Self {
        self.cancel_url = cancel_url;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Succeeded(Value),
    Failed(String),
}

/// Backend-specific half of polling: how to read a job's state and how to
/// ask the backend to abandon it.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn poll(&self, handle: &JobHandle) -> Result<JobState, ProviderError>;

    async fn cancel(&self, _handle: &JobHandle) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJob {
    pub payload: Value,
    pub polls: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobPoller {
    policy: PollPolicy,
}

impl JobPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub async fn wait<S>(&self, source: &S, handle: &JobHandle) -> Result<CompletedJob, ProviderError>
    where
        S: JobStatusSource + ?Sized,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match source.poll(handle).await? {
                JobState::Succeeded(payload) => {
                    debug!(polls = attempt, url = %handle.status_url, "job succeeded");
                    return Ok(CompletedJob {
                        payload,
                        polls: attempt,
                    });
                }
                JobState::Failed(detail) => return Err(ProviderError::JobFailed(detail)),
                JobState::Pending => {
                    debug!(poll = attempt, url = %handle.status_url, "job still pending");
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        let elapsed = handle.created_at.elapsed();
        if handle.cancel_url.is_some() {
            if let Err(err) = source.cancel(handle).await {
                warn!(url = %handle.status_url, error = %err, "best-effort job cancel failed");
            }
        }
        Err(ProviderError::Timeout(format!(
            "job still pending after {max_attempts} polls ({:.1}s)",
            elapsed.as_secs_f64()
        )))
    }
}
