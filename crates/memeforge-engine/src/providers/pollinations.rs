use std::path::PathBuf;

use async_trait::async_trait;
use memeforge_contracts::prompt::style_suffix;
use memeforge_contracts::providers::ProviderIdentity;
use memeforge_contracts::request::GenerationRequest;
use reqwest::Client;

use crate::config::PollinationsConfig;
use crate::error::ProviderError;
use crate::http::image_body;
use crate::provider::{Availability, ImageProvider};
use crate::store::{store_png, ArtifactStore};

/// Free hosted endpoint. Needs no credentials; only a kill switch.
pub struct PollinationsProvider {
    config: PollinationsConfig,
    http: Client,
}

impl PollinationsProvider {
    pub fn new(config: PollinationsConfig, http: Client) -> Self {
        Self { config, http }
    }

    fn request_url(&self, prompt: &str, width: u32, height: u32, seed: u32) -> String {
        format!(
            "{}/{}?width={width}&height={height}&nologo=true&seed={seed}",
            self.config.api_base,
            urlencoding::encode(prompt)
        )
    }
}

fn random_seed() -> u32 {
    (uuid::Uuid::new_v4().as_u128() & 0xFFFF_FFFF) as u32
}

#[async_trait]
impl ImageProvider for PollinationsProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Pollinations
    }

    fn availability(&self) -> Availability {
        if self.config.enabled {
            Availability::Ready("Enabled".to_string())
        } else {
            Availability::Disabled("Disabled by POLLINATIONS_ENABLED".to_string())
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        store: &dyn ArtifactStore,
    ) -> Result<PathBuf, ProviderError> {
        if !self.config.enabled {
            return Err(ProviderError::NotConfigured(
                "disabled by POLLINATIONS_ENABLED".to_string(),
            ));
        }
        let url = self.request_url(
            &style_suffix(&request.prompt, &request.style),
            request.width,
            request.height,
            random_seed(),
        );
        let response = self.http.get(url).send().await?;
        let bytes = image_body(response).await?;
        Ok(store_png(store, &bytes).await?)
    }
}

#[cfg(test)]
mod tests {
    use memeforge_contracts::request::{GenerationRequest, Style};
    use mockito::Matcher;

    use super::PollinationsProvider;
    use crate::config::PollinationsConfig;
    use crate::error::ProviderError;
    use crate::provider::ImageProvider;
    use crate::store::tests::tiny_png;
    use crate::store::{ArtifactStore, LocalArtifactStore};

    fn provider(api_base: String, enabled: bool) -> PollinationsProvider {
        PollinationsProvider::new(PollinationsConfig { enabled, api_base }, reqwest::Client::new())
    }

    #[test]
    fn prompt_is_url_encoded_into_the_path() {
        let url = provider("https://image.pollinations.ai/prompt".to_string(), true)
            .request_url("cat & dog, meme format", 512, 256, 42);
        assert_eq!(
            url,
            "https://image.pollinations.ai/prompt/cat%20%26%20dog%2C%20meme%20format?width=512&height=256&nologo=true&seed=42"
        );
    }

    #[tokio::test]
    async fn fetches_image_with_query_parameters() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/prompt/bird".to_string()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("width".into(), "512".into()),
                Matcher::UrlEncoded("height".into(), "512".into()),
                Matcher::UrlEncoded("nologo".into(), "true".into()),
                Matcher::Regex("seed=[0-9]+".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_body(tiny_png([2, 2, 2]))
            .create_async()
            .await;

        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path())?;
        let path = provider(format!("{}/prompt", server.url()), true)
            .generate(&GenerationRequest::new("bird", Style::Cartoon), &store)
            .await?;
        mock.assert_async().await;
        assert!(store.exists(&path));
        Ok(())
    }

    #[tokio::test]
    async fn bad_gateway_is_a_backend_error() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Any)
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path())?;
        let err = provider(format!("{}/prompt", server.url()), true)
            .generate(&GenerationRequest::new("bird", Style::Cartoon), &store)
            .await
            .err();
        assert!(matches!(err, Some(ProviderError::Status { status: 502, .. })));
        Ok(())
    }

    #[test]
    fn kill_switch_disables() {
        let provider = provider("http://unused".to_string(), false);
        assert!(!provider.is_available());
        assert_eq!(provider.availability().detail(), "Disabled by POLLINATIONS_ENABLED");
    }
}
