//! Ordered fallback over the registered adapters.
//!
//! A request walks the effective provider order one slot at a time. The first
//! adapter that produces an artifact wins; every failure is recorded and the
//! walk continues. When nothing is left the mock renderer answers, so
//! [`Orchestrator::generate`] has no error path.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use memeforge_contracts::events::{EventWriter, GenerationEvent};
use memeforge_contracts::providers::{
    ProviderIdentity, ProviderOrder, ProviderSlot, ProviderStatusEntry,
};
use memeforge_contracts::request::{
    AttemptError, GenerationReport, GenerationRequest, GenerationResult,
};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::ProviderError;
use crate::mock::MockRenderer;
use crate::provider::{default_provider_registry, ImageProvider, ImageProviderRegistry};
use crate::store::{ArtifactStore, LocalArtifactStore};

const UNREACHABLE_AFTER_MOCK: &str = "Unreachable after mock";

pub struct Orchestrator {
    order: ProviderOrder,
    registry: ImageProviderRegistry,
    store: Arc<dyn ArtifactStore>,
    mock: MockRenderer,
    call_timeout: Duration,
    events: Option<EventWriter>,
}

impl Orchestrator {
    pub fn new(
        config: &EngineConfig,
        registry: ImageProviderRegistry,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            order: config.effective_order(),
            registry,
            store,
            mock: MockRenderer::new(),
            call_timeout: config.call_timeout,
            events: None,
        }
    }

    /// Real adapters writing into `config.upload_dir`.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let store = LocalArtifactStore::new(&config.upload_dir).with_context(|| {
            format!("failed to create upload dir {}", config.upload_dir.display())
        })?;
        Ok(Self::new(
            config,
            default_provider_registry(config),
            Arc::new(store),
        ))
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn order(&self) -> &ProviderOrder {
        &self.order
    }

    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        self.generate_with_report(request).await.result
    }

    pub async fn generate_with_report(&self, request: &GenerationRequest) -> GenerationReport {
        let request_id = new_request_id();
        self.emit(GenerationEvent::GenerationStarted {
            request_id: request_id.clone(),
            prompt: request.prompt.clone(),
            style: request.style.label().to_string(),
            order: self.order.names(),
        });

        let mut attempted = Vec::new();
        let mut errors = Vec::new();
        for slot in self.order.slots() {
            let identity = match slot {
                ProviderSlot::Unknown(name) => {
                    self.skip(&request_id, name, "Unknown provider");
                    continue;
                }
                ProviderSlot::Known(ProviderIdentity::Mock) => {
                    debug!("mock listed in order, stopping");
                    break;
                }
                ProviderSlot::Known(identity) => *identity,
            };
            let Some(provider) = self.registry.get(identity) else {
                self.skip(&request_id, identity.as_str(), "Not registered");
                continue;
            };
            let provider: &dyn ImageProvider = provider.as_ref();
            let availability = provider.availability();
            if !availability.is_ready() {
                self.skip(&request_id, identity.as_str(), availability.detail());
                continue;
            }

            attempted.push(identity);
            let started = Instant::now();
            match self
                .bounded(provider.generate(request, self.store.as_ref()))
                .await
            {
                Ok(path) => {
                    info!(
                        provider = %identity,
                        path = %path.display(),
                        failed_attempts = errors.len(),
                        "generation succeeded"
                    );
                    let result = GenerationResult::from_provider(path, identity);
                    self.complete(&request_id, &result, errors.len());
                    return GenerationReport {
                        result,
                        attempted,
                        errors,
                    };
                }
                Err(err) => {
                    let attempt = AttemptError {
                        provider: identity,
                        kind: err.kind(),
                        message: err.to_string(),
                    };
                    warn!(
                        provider = %identity,
                        kind = %attempt.kind,
                        error = %attempt.message,
                        "provider attempt failed"
                    );
                    self.emit(GenerationEvent::ProviderFailed {
                        request_id: request_id.clone(),
                        provider: identity,
                        kind: attempt.kind,
                        error: attempt.message.clone(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                    errors.push(attempt);
                }
            }
        }

        let result = self.render_mock(request).await;
        self.complete(&request_id, &result, errors.len());
        GenerationReport {
            result,
            attempted,
            errors,
        }
    }

    /// Conditions generation on `template_path` when an available adapter
    /// supports it. Otherwise the template itself is the result.
    pub async fn generate_from_template(
        &self,
        request: &GenerationRequest,
        template_path: &Path,
    ) -> GenerationResult {
        let request_id = new_request_id();
        // Any registered adapter may condition on a template, whatever the
        // generation order says; default priority breaks ties.
        let candidate = ProviderIdentity::ALL
            .iter()
            .filter_map(|identity| self.registry.get(*identity))
            .map(|provider| provider.as_ref())
            .filter(|provider| provider.is_available())
            .find_map(|provider| {
                provider
                    .image_conditioning()
                    .map(|conditioning| (provider.identity(), conditioning))
            });

        let reason = match candidate {
            Some((identity, conditioning)) => {
                match self
                    .bounded(conditioning.img2img(request, template_path, self.store.as_ref()))
                    .await
                {
                    Ok(path) => {
                        info!(provider = %identity, path = %path.display(), "img2img succeeded");
                        let result = GenerationResult::img2img(path, identity);
                        self.complete(&request_id, &result, 0);
                        return result;
                    }
                    Err(err) => {
                        warn!(provider = %identity, kind = %err.kind(), error = %err, "img2img failed");
                        format!("{identity}: {err}")
                    }
                }
            }
            None => "no image-conditioning provider available".to_string(),
        };

        info!(template = %template_path.display(), reason = %reason, "returning template unchanged");
        self.emit(GenerationEvent::TemplateFallback {
            request_id,
            template_path: template_path.display().to_string(),
            reason,
        });
        GenerationResult::template(template_path)
    }

    /// One row per slot of the effective order, using the same availability
    /// check the dispatch loop uses. Slots after a `mock` entry are never
    /// dispatched, so they report as disabled.
    pub fn provider_status(&self) -> Vec<ProviderStatusEntry> {
        let mut rows = Vec::with_capacity(self.order.slots().len());
        let mut past_mock = false;
        for slot in self.order.slots() {
            let row = match slot {
                ProviderSlot::Unknown(name) => status_row(name, false, "Unknown provider"),
                ProviderSlot::Known(identity) if past_mock => {
                    status_row(identity.as_str(), false, UNREACHABLE_AFTER_MOCK)
                }
                ProviderSlot::Known(ProviderIdentity::Mock) => {
                    past_mock = true;
                    status_row("mock", true, "Development fallback")
                }
                ProviderSlot::Known(identity) => match self.registry.get(*identity) {
                    Some(provider) => {
                        let availability = provider.as_ref().availability();
                        status_row(
                            identity.as_str(),
                            availability.is_ready(),
                            availability.detail(),
                        )
                    }
                    None => status_row(identity.as_str(), false, "Not registered"),
                },
            };
            rows.push(row);
        }
        rows
    }

    async fn bounded<F>(&self, call: F) -> Result<PathBuf, ProviderError>
    where
        F: Future<Output = Result<PathBuf, ProviderError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::call_timeout(self.call_timeout)),
        }
    }

    async fn render_mock(&self, request: &GenerationRequest) -> GenerationResult {
        match self.mock.render(request, self.store.as_ref()).await {
            Ok(path) => {
                info!(path = %path.display(), "serving mock placeholder");
                GenerationResult::mock(path)
            }
            Err(err) => {
                error!(error = %err, "mock placeholder could not be written");
                GenerationResult::mock(PathBuf::new())
            }
        }
    }

    fn skip(&self, request_id: &str, provider: &str, reason: &str) {
        debug!(provider, reason, "skipping provider");
        self.emit(GenerationEvent::ProviderSkipped {
            request_id: request_id.to_string(),
            provider: provider.to_string(),
            reason: reason.to_string(),
        });
    }

    fn complete(&self, request_id: &str, result: &GenerationResult, failed_attempts: usize) {
        self.emit(GenerationEvent::GenerationCompleted {
            request_id: request_id.to_string(),
            provider: result.provider.to_string(),
            is_mock: result.is_mock,
            image_path: result.image_path.display().to_string(),
            failed_attempts,
        });
    }

    fn emit(&self, event: GenerationEvent) {
        let Some(events) = &self.events else {
            return;
        };
        if let Err(err) = events.emit(&event) {
            warn!(path = %events.path().display(), error = %err, "failed to append event");
        }
    }
}

fn status_row(name: &str, enabled: bool, detail: &str) -> ProviderStatusEntry {
    ProviderStatusEntry {
        name: name.to_string(),
        enabled,
        detail: detail.to_string(),
    }
}

fn new_request_id() -> String {
    hex::encode(&uuid::Uuid::new_v4().as_bytes()[..6])
}
