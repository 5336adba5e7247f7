use std::path::PathBuf;

use async_trait::async_trait;
use memeforge_contracts::prompt::style_suffix;
use memeforge_contracts::providers::ProviderIdentity;
use memeforge_contracts::request::GenerationRequest;
use reqwest::multipart::Form;
use reqwest::Client;
use tracing::debug;

use crate::config::ClipdropConfig;
use crate::error::ProviderError;
use crate::http::image_body;
use crate::provider::{Availability, ImageProvider};
use crate::store::{store_png, ArtifactStore};

pub struct ClipdropProvider {
    config: ClipdropConfig,
    http: Client,
}

impl ClipdropProvider {
    pub fn new(config: ClipdropConfig, http: Client) -> Self {
        Self { config, http }
    }

    fn endpoint(&self) -> String {
        format!("{}/text-to-image/v1", self.config.api_base)
    }
}

#[async_trait]
impl ImageProvider for ClipdropProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Clipdrop
    }

    fn availability(&self) -> Availability {
        match self.config.api_key {
            Some(_) => Availability::Ready("API key configured".to_string()),
            None => Availability::Missing("Missing CLIPDROP_API_KEY".to_string()),
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        store: &dyn ArtifactStore,
    ) -> Result<PathBuf, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("CLIPDROP_API_KEY not set".to_string()))?;
        let prompt = style_suffix(&request.prompt, &request.style);
        debug!(endpoint = %self.endpoint(), "clipdrop text-to-image");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("accept", "image/png")
            .multipart(Form::new().text("prompt", prompt))
            .send()
            .await?;
        let bytes = image_body(response).await?;
        Ok(store_png(store, &bytes).await?)
    }
}

#[cfg(test)]
mod tests {
    use memeforge_contracts::request::{GenerationRequest, Style};
    use mockito::Matcher;

    use super::ClipdropProvider;
    use crate::config::ClipdropConfig;
    use crate::error::ProviderError;
    use crate::provider::ImageProvider;
    use crate::store::tests::tiny_png;
    use crate::store::{ArtifactStore, LocalArtifactStore};

    fn provider(api_base: String, api_key: Option<&str>) -> ClipdropProvider {
        ClipdropProvider::new(
            ClipdropConfig {
                api_key: api_key.map(str::to_string),
                api_base,
            },
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn posts_multipart_prompt_and_stores_png() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/text-to-image/v1")
            .match_header("x-api-key", "secret")
            .match_body(Matcher::Regex(
                "cat in a hat, cartoon style, bold outlines, meme format".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(tiny_png([1, 2, 3]))
            .create_async()
            .await;

        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path())?;
        let request = GenerationRequest::new("cat in a hat", Style::Cartoon);
        let path = provider(server.url(), Some("secret"))
            .generate(&request, &store)
            .await?;

        mock.assert_async().await;
        assert!(store.exists(&path));
        Ok(())
    }

    #[tokio::test]
    async fn non_image_content_is_a_backend_error() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/text-to-image/v1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"quota"}"#)
            .create_async()
            .await;

        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path())?;
        let err = provider(server.url(), Some("secret"))
            .generate(&GenerationRequest::new("x", Style::Cartoon), &store)
            .await
            .err();
        assert!(matches!(err, Some(ProviderError::NotAnImage { .. })));
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn http_errors_carry_status_and_body() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/text-to-image/v1")
            .with_status(402)
            .with_body("out of credits")
            .create_async()
            .await;

        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path())?;
        let err = provider(server.url(), Some("secret"))
            .generate(&GenerationRequest::new("x", Style::Cartoon), &store)
            .await
            .err();
        assert!(
            matches!(err, Some(ProviderError::Status { status: 402, ref body }) if body == "out of credits")
        );
        Ok(())
    }

    #[test]
    fn missing_key_is_reported() {
        let provider = provider("http://unused".to_string(), None);
        assert!(!provider.is_available());
        assert_eq!(provider.availability().detail(), "Missing CLIPDROP_API_KEY");
    }
}
