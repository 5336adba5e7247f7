use std::path::PathBuf;

use async_trait::async_trait;
use memeforge_contracts::prompt::style_suffix;
use memeforge_contracts::providers::ProviderIdentity;
use memeforge_contracts::request::GenerationRequest;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::ReplicateConfig;
use crate::error::ProviderError;
use crate::http::{expect_success, json_body};
use crate::poller::{JobHandle, JobPoller, JobState, JobStatusSource, PollPolicy};
use crate::provider::{Availability, ImageProvider};
use crate::store::{store_png, ArtifactStore};

/// Hosted FLUX.1-schnell through the predictions API. Submissions ask the
/// server to hold the connection (`Prefer: wait`); predictions that are
/// still running afterwards are handed to the job poller.
pub struct ReplicateProvider {
    config: ReplicateConfig,
    poller: JobPoller,
    http: Client,
}

impl ReplicateProvider {
    pub fn new(config: ReplicateConfig, poll: PollPolicy, http: Client) -> Self {
        Self {
            config,
            poller: JobPoller::new(poll),
            http,
        }
    }

    fn predictions_endpoint(&self) -> String {
        format!("{}/predictions", self.config.api_base)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = expect_success(self.http.get(url).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

struct Prediction<'a> {
    http: &'a Client,
    token: &'a str,
}

#[async_trait]
impl JobStatusSource for Prediction<'_> {
    async fn poll(&self, handle: &JobHandle) -> Result<JobState, ProviderError> {
        let response = self
            .http
            .get(&handle.status_url)
            .bearer_auth(self.token)
            .send()
            .await?;
        Ok(prediction_state(json_body(response).await?))
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<(), ProviderError> {
        let Some(cancel_url) = handle.cancel_url.as_deref() else {
            return Ok(());
        };
        let response = self
            .http
            .post(cancel_url)
            .bearer_auth(self.token)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }
}

fn prediction_state(payload: Value) -> JobState {
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match status.as_str() {
        "succeeded" => JobState::Succeeded(payload),
        "failed" | "canceled" => {
            let detail = payload
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("prediction {status}"));
            JobState::Failed(detail)
        }
        _ => JobState::Pending,
    }
}

fn output_url(payload: &Value) -> Option<String> {
    match payload.get("output")? {
        Value::String(url) => Some(url.trim().to_string()),
        Value::Array(rows) => rows
            .iter()
            .find_map(Value::as_str)
            .map(|url| url.trim().to_string()),
        _ => None,
    }
    .filter(|url| url.starts_with("http"))
}

fn url_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get("urls")
        .and_then(|urls| urls.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ImageProvider for ReplicateProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Replicate
    }

    fn availability(&self) -> Availability {
        match self.config.api_token {
            Some(_) => Availability::Ready("Token configured".to_string()),
            None => Availability::Missing("Missing REPLICATE_API_TOKEN".to_string()),
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        store: &dyn ArtifactStore,
    ) -> Result<PathBuf, ProviderError> {
        let token = self.config.api_token.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured("REPLICATE_API_TOKEN not set".to_string())
        })?;
        let payload = json!({
            "version": self.config.version,
            "input": {
                "prompt": style_suffix(&request.prompt, &request.style),
                "width": request.width,
                "height": request.height,
                "num_inference_steps": 4,
                "guidance_scale": 7.5,
            }
        });

        let response = self
            .http
            .post(self.predictions_endpoint())
            .bearer_auth(token)
            .header("Prefer", "wait")
            .json(&payload)
            .send()
            .await?;
        let created = json_body(response).await?;

        let finished = match prediction_state(created.clone()) {
            JobState::Succeeded(payload) => payload,
            JobState::Failed(detail) => return Err(ProviderError::JobFailed(detail)),
            JobState::Pending => {
                let status_url = url_field(&created, "get").ok_or_else(|| {
                    ProviderError::Malformed("prediction has no status URL".to_string())
                })?;
                debug!(status_url = %status_url, "prediction pending, polling");
                let handle = JobHandle::new(status_url).with_cancel_url(url_field(&created, "cancel"));
                let source = Prediction {
                    http: &self.http,
                    token,
                };
                let completed = self.poller.wait(&source, &handle).await?;
                info!(polls = completed.polls, "prediction finished");
                completed.payload
            }
        };

        let url = output_url(&finished)
            .ok_or_else(|| ProviderError::Malformed("prediction has no output URL".to_string()))?;
        let bytes = self.download(&url).await?;
        Ok(store_png(store, &bytes).await?)
    }
}
