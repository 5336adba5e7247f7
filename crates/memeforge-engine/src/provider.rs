use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use memeforge_contracts::providers::{NamedProvider, ProviderIdentity, ProviderRegistry};
use memeforge_contracts::request::GenerationRequest;

use crate::config::EngineConfig;
use crate::error::ProviderError;
use crate::providers::{
    ClipdropProvider, HuggingFaceProvider, PollinationsProvider, ReplicateProvider,
    WebuiProvider,
};
use crate::store::ArtifactStore;

/// Whether an adapter can be attempted, decided from configuration alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Ready(String),
    Missing(String),
    Disabled(String),
}

impl Availability {
    pub fn is_ready(&self) -> bool {
        matches!(self, Availability::Ready(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            Availability::Ready(detail)
            | Availability::Missing(detail)
            | Availability::Disabled(detail) => detail.as_str(),
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.detail())
    }
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn identity(&self) -> ProviderIdentity;

    /// Must not touch the network.
    fn availability(&self) -> Availability;

    fn is_available(&self) -> bool {
        self.availability().is_ready()
    }

    /// Produces exactly one new artifact in `store` on success.
    async fn generate(
        &self,
        request: &GenerationRequest,
        store: &dyn ArtifactStore,
    ) -> Result<PathBuf, ProviderError>;

    fn image_conditioning(&self) -> Option<&dyn ImageConditioning> {
        None
    }
}

/// Optional capability: generation conditioned on a source image.
#[async_trait]
pub trait ImageConditioning: Send + Sync {
    async fn img2img(
        &self,
        request: &GenerationRequest,
        source_image: &Path,
        store: &dyn ArtifactStore,
    ) -> Result<PathBuf, ProviderError>;
}

impl NamedProvider for Box<dyn ImageProvider> {
    fn identity(&self) -> ProviderIdentity {
        self.as_ref().identity()
    }
}

pub type ImageProviderRegistry = ProviderRegistry<Box<dyn ImageProvider>>;

/// One adapter per real backend. The mock identity is handled by the
/// orchestrator itself and is never registered.
pub fn default_provider_registry(config: &EngineConfig) -> ImageProviderRegistry {
    let client = reqwest::Client::new();
    let mut providers = ImageProviderRegistry::default();
    providers.register(Box::new(ClipdropProvider::new(
        config.clipdrop.clone(),
        client.clone(),
    )));
    providers.register(Box::new(WebuiProvider::new(config.webui.clone(), client.clone())));
    providers.register(Box::new(ReplicateProvider::new(
        config.replicate.clone(),
        config.poll,
        client.clone(),
    )));
    providers.register(Box::new(HuggingFaceProvider::new(
        config.huggingface.clone(),
        client.clone(),
    )));
    providers.register(Box::new(PollinationsProvider::new(
        config.pollinations.clone(),
        client,
    )));
    providers
}
