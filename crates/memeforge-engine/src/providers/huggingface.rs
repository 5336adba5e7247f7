use std::path::PathBuf;

use async_trait::async_trait;
use memeforge_contracts::prompt::style_suffix;
use memeforge_contracts::providers::ProviderIdentity;
use memeforge_contracts::request::GenerationRequest;
use reqwest::Client;
use serde_json::json;

use crate::config::HuggingFaceConfig;
use crate::error::ProviderError;
use crate::http::expect_success;
use crate::provider::{Availability, ImageProvider};
use crate::store::{store_png, ArtifactStore};

pub struct HuggingFaceProvider {
    config: HuggingFaceConfig,
    http: Client,
}

impl HuggingFaceProvider {
    pub fn new(config: HuggingFaceConfig, http: Client) -> Self {
        Self { config, http }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.config.api_base, self.config.model)
    }
}

#[async_trait]
impl ImageProvider for HuggingFaceProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Huggingface
    }

    fn availability(&self) -> Availability {
        match self.config.api_token {
            Some(_) => Availability::Ready("Token configured".to_string()),
            None => Availability::Missing("Missing HUGGINGFACE_API_TOKEN".to_string()),
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        store: &dyn ArtifactStore,
    ) -> Result<PathBuf, ProviderError> {
        let token = self.config.api_token.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured("HUGGINGFACE_API_TOKEN not set".to_string())
        })?;
        let payload = json!({
            "inputs": style_suffix(&request.prompt, &request.style),
            "parameters": {
                "width": request.width,
                "height": request.height,
                "num_inference_steps": 4,
            }
        });
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;
        // The router answers with raw image bytes; decoding is the content check.
        let bytes = expect_success(response).await?.bytes().await?;
        Ok(store_png(store, &bytes).await?)
    }
}
