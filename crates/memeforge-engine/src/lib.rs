//! Provider adapters, job polling, placeholder rendering and the fallback
//! orchestrator that ties them together.

pub mod config;
pub mod error;
mod http;
pub mod mock;
pub mod orchestrator;
pub mod poller;
pub mod provider;
pub mod providers;
pub mod store;

pub use config::{ConfigSource, EngineConfig, EnvSource, MapSource};
pub use error::{ProviderError, StoreError};
pub use mock::MockRenderer;
pub use orchestrator::Orchestrator;
pub use poller::{JobHandle, JobPoller, JobState, JobStatusSource, PollPolicy};
pub use provider::{
    default_provider_registry, Availability, ImageConditioning, ImageProvider,
    ImageProviderRegistry,
};
pub use store::{ArtifactStore, LocalArtifactStore};
