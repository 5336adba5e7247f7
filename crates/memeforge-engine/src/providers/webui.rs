use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use memeforge_contracts::prompt::style_suffix;
use memeforge_contracts::providers::ProviderIdentity;
use memeforge_contracts::request::GenerationRequest;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::WebuiConfig;
use crate::error::{ProviderError, StoreError};
use crate::http::{decode_base64_image, json_body};
use crate::provider::{Availability, ImageConditioning, ImageProvider};
use crate::store::{store_png, ArtifactStore};

/// Local Stable Diffusion WebUI. The only backend that accepts a source
/// image.
pub struct WebuiProvider {
    config: WebuiConfig,
    http: Client,
}

impl WebuiProvider {
    pub fn new(config: WebuiConfig, http: Client) -> Self {
        Self { config, http }
    }

    fn base_url(&self) -> Result<&str, ProviderError> {
        self.config
            .base_url
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("SD_WEBUI_URL not set".to_string()))
    }

    fn base_payload(&self, prompt: String, width: u32, height: u32) -> Value {
        json!({
            "prompt": prompt,
            "negative_prompt": self.config.negative_prompt,
            "width": width,
            "height": height,
            "steps": self.config.steps,
            "cfg_scale": self.config.cfg_scale,
            "sampler_name": self.config.sampler,
        })
    }

    async fn submit(
        &self,
        route: &str,
        payload: &Value,
        store: &dyn ArtifactStore,
    ) -> Result<PathBuf, ProviderError> {
        let endpoint = format!("{}/sdapi/v1/{route}", self.base_url()?);
        debug!(endpoint = %endpoint, "webui request");
        let response = self.http.post(&endpoint).json(payload).send().await?;
        let body = json_body(response).await?;
        let first = body
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Malformed(format!("no images in {route} response")))?;
        let bytes = decode_base64_image(first)?;
        Ok(store_png(store, &bytes).await?)
    }
}

#[async_trait]
impl ImageProvider for WebuiProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Webui
    }

    fn availability(&self) -> Availability {
        match self.config.base_url {
            Some(_) => Availability::Ready("SD_WEBUI_URL configured".to_string()),
            None => Availability::Missing("Missing SD_WEBUI_URL".to_string()),
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        store: &dyn ArtifactStore,
    ) -> Result<PathBuf, ProviderError> {
        let payload = self.base_payload(
            style_suffix(&request.prompt, &request.style),
            request.width,
            request.height,
        );
        self.submit("txt2img", &payload, store).await
    }

    fn image_conditioning(&self) -> Option<&dyn ImageConditioning> {
        Some(self)
    }
}

#[async_trait]
impl ImageConditioning for WebuiProvider {
    async fn img2img(
        &self,
        request: &GenerationRequest,
        source_image: &Path,
        store: &dyn ArtifactStore,
    ) -> Result<PathBuf, ProviderError> {
        self.base_url()?;
        let raw = tokio::fs::read(source_image)
            .await
            .map_err(StoreError::from)?;
        let source = image::load_from_memory(&raw).map_err(StoreError::from)?;
        let mut png = Vec::new();
        source
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(StoreError::from)?;

        // Output keeps the template's own dimensions.
        let mut payload = self.base_payload(
            style_suffix(&request.prompt, &request.style),
            source.width(),
            source.height(),
        );
        if let Some(fields) = payload.as_object_mut() {
            fields.insert(
                "denoising_strength".to_string(),
                json!(self.config.denoise_strength),
            );
            fields.insert("init_images".to_string(), json!([BASE64.encode(&png)]));
        }
        self.submit("img2img", &payload, store).await
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use memeforge_contracts::request::{GenerationRequest, Style};
    use mockito::Matcher;
    use serde_json::json;

    use super::WebuiProvider;
    use crate::config::WebuiConfig;
    use crate::error::ProviderError;
    use crate::provider::ImageProvider;
    use crate::store::tests::tiny_png;
    use crate::store::{ArtifactStore, LocalArtifactStore};

    fn provider(base_url: Option<String>) -> WebuiProvider {
        WebuiProvider::new(
            WebuiConfig {
                base_url,
                negative_prompt: "blurry".to_string(),
                steps: 20,
                cfg_scale: 7.0,
                sampler: "Euler a".to_string(),
                denoise_strength: 0.55,
            },
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn txt2img_decodes_data_url_images() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let encoded = format!("data:image/png;base64,{}", BASE64.encode(tiny_png([9, 9, 9])));
        let mock = server
            .mock("POST", "/sdapi/v1/txt2img")
            .match_body(Matcher::PartialJson(json!({
                "prompt": "doge, anime art, manga style, meme format",
                "negative_prompt": "blurry",
                "width": 640,
                "height": 480,
                "steps": 20,
                "sampler_name": "Euler a",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "images": [encoded] }).to_string())
            .create_async()
            .await;

        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path())?;
        let request = GenerationRequest::new("doge", Style::Anime).with_dimensions(640, 480);
        let path = provider(Some(server.url())).generate(&request, &store).await?;

        mock.assert_async().await;
        assert!(store.exists(&path));
        Ok(())
    }

    #[tokio::test]
    async fn empty_image_list_is_malformed() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sdapi/v1/txt2img")
            .with_status(200)
            .with_body(r#"{"images":[]}"#)
            .create_async()
            .await;

        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path())?;
        let err = provider(Some(server.url()))
            .generate(&GenerationRequest::new("x", Style::Cartoon), &store)
            .await
            .err();
        assert!(matches!(err, Some(ProviderError::Malformed(_))));
        Ok(())
    }

    #[tokio::test]
    async fn img2img_sends_template_with_its_dimensions() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sdapi/v1/img2img")
            .match_body(Matcher::PartialJson(json!({
                "width": 4,
                "height": 4,
                "denoising_strength": 0.55,
            })))
            .with_status(200)
            .with_body(json!({ "images": [BASE64.encode(tiny_png([5, 5, 5]))] }).to_string())
            .create_async()
            .await;

        let temp = tempfile::tempdir()?;
        let template = temp.path().join("dog.png");
        std::fs::write(&template, tiny_png([100, 100, 100]))?;
        let store = LocalArtifactStore::new(temp.path().join("uploads"))?;

        let webui = provider(Some(server.url()));
        let Some(conditioning) = webui.image_conditioning() else {
            panic!("webui supports img2img");
        };
        let request = GenerationRequest::new("dog", Style::Cartoon);
        let path = conditioning.img2img(&request, &template, &store).await?;

        mock.assert_async().await;
        assert!(store.exists(&path));
        Ok(())
    }

    #[tokio::test]
    async fn unconfigured_webui_refuses_without_network() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path())?;
        let webui = provider(None);
        assert!(!webui.is_available());
        let err = webui
            .generate(&GenerationRequest::new("x", Style::Cartoon), &store)
            .await
            .err();
        assert!(matches!(err, Some(ProviderError::NotConfigured(_))));
        Ok(())
    }
}
