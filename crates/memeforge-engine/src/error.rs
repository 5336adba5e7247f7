use std::time::Duration;

use memeforge_contracts::request::AttemptErrorKind;
use thiserror::Error;

/// Failure of a single adapter call. The orchestrator never lets one of these
/// escape to its caller; it records them and moves on.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("request failed ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("non-image response: {content_type}")]
    NotAnImage { content_type: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("job failed: {0}")]
    JobFailed(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("artifact store: {0}")]
    Store(#[from] StoreError),
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }

    pub fn kind(&self) -> AttemptErrorKind {
        if self.is_timeout() {
            AttemptErrorKind::Timeout
        } else {
            AttemptErrorKind::Backend
        }
    }

    pub fn call_timeout(limit: Duration) -> Self {
        ProviderError::Timeout(format!(
            "provider call exceeded {:.1}s",
            limit.as_secs_f64()
        ))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ProviderError::Timeout(err.to_string());
        }
        ProviderError::Transport(err)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed writing artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("payload is not a decodable image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("could not allocate a fresh artifact name after {0} attempts")]
    NameExhausted(usize),
}
