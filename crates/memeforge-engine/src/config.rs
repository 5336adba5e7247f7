use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use memeforge_contracts::providers::{ProviderOrder, ProviderSlot};

use crate::poller::PollPolicy;

pub const DEFAULT_UPLOAD_DIR: &str = "static/uploads";
pub const DEFAULT_TEMPLATE_DIR: &str = "static/templates";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 180;

/// Key-value lookup the engine reads once at construction.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: BTreeMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Blank values count as absent.
pub fn non_empty(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn first_non_empty(source: &dyn ConfigSource, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_empty(source, key))
}

fn api_base(source: &dyn ConfigSource, key: &str, default: &str) -> String {
    non_empty(source, key)
        .map(|value| value.trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn read_flag(source: &dyn ConfigSource, key: &str, default: bool) -> bool {
    source
        .get(key)
        .map(|value| parse_flag(&value))
        .unwrap_or(default)
}

fn read_positive_u64(source: &dyn ConfigSource, key: &str, default: u64) -> Result<u64> {
    let Some(raw) = non_empty(source, key) else {
        return Ok(default);
    };
    let parsed = raw
        .parse::<u64>()
        .with_context(|| format!("{key} must be a positive integer (got '{raw}')"))?;
    if parsed == 0 {
        bail!("{key} must be greater than 0");
    }
    Ok(parsed)
}

fn read_f64(source: &dyn ConfigSource, key: &str, default: f64) -> Result<f64> {
    let Some(raw) = non_empty(source, key) else {
        return Ok(default);
    };
    raw.parse::<f64>()
        .with_context(|| format!("{key} must be a number (got '{raw}')"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipdropConfig {
    pub api_key: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebuiConfig {
    pub base_url: Option<String>,
    pub negative_prompt: String,
    pub steps: u64,
    pub cfg_scale: f64,
    pub sampler: String,
    pub denoise_strength: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateConfig {
    pub api_token: Option<String>,
    pub api_base: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HuggingFaceConfig {
    pub api_token: Option<String>,
    pub api_base: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollinationsConfig {
    pub enabled: bool,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub upload_dir: PathBuf,
    pub template_dir: PathBuf,
    pub provider_order: ProviderOrder,
    pub forced_provider: Option<ProviderSlot>,
    pub call_timeout: Duration,
    pub poll: PollPolicy,
    pub clipdrop: ClipdropConfig,
    pub webui: WebuiConfig,
    pub replicate: ReplicateConfig,
    pub huggingface: HuggingFaceConfig,
    pub pollinations: PollinationsConfig,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let forced_provider =
            first_non_empty(source, &["IMAGE_GENERATION_PROVIDER", "IMAGE_PROVIDER"])
                .map(|value| ProviderSlot::parse(&value));
        let order_override = first_non_empty(
            source,
            &["IMAGE_GENERATION_PROVIDER_ORDER", "IMAGE_PROVIDER_ORDER"],
        );

        let call_timeout = Duration::from_secs(read_positive_u64(
            source,
            "MEMEFORGE_PROVIDER_TIMEOUT",
            DEFAULT_PROVIDER_TIMEOUT_SECS,
        )?);
        let poll = PollPolicy {
            interval: Duration::from_millis(read_positive_u64(
                source,
                "MEMEFORGE_POLL_INTERVAL_MS",
                1000,
            )?),
            max_attempts: u32::try_from(read_positive_u64(source, "MEMEFORGE_POLL_ATTEMPTS", 60)?)
                .context("MEMEFORGE_POLL_ATTEMPTS is too large")?,
        };

        Ok(Self {
            upload_dir: non_empty(source, "MEMEFORGE_UPLOAD_DIR")
                .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string())
                .into(),
            template_dir: non_empty(source, "MEMEFORGE_TEMPLATE_DIR")
                .unwrap_or_else(|| DEFAULT_TEMPLATE_DIR.to_string())
                .into(),
            provider_order: ProviderOrder::from_override(order_override.as_deref()),
            forced_provider,
            call_timeout,
            poll,
            clipdrop: ClipdropConfig {
                api_key: non_empty(source, "CLIPDROP_API_KEY"),
                api_base: api_base(source, "CLIPDROP_API_BASE", "https://clipdrop-api.co"),
            },
            webui: WebuiConfig {
                base_url: non_empty(source, "SD_WEBUI_URL")
                    .map(|value| value.trim_end_matches('/').to_string())
                    .filter(|value| !value.is_empty()),
                negative_prompt: source.get("SD_WEBUI_NEGATIVE").unwrap_or_default(),
                steps: read_positive_u64(source, "SD_WEBUI_STEPS", 20)?,
                cfg_scale: read_f64(source, "SD_WEBUI_CFG", 7.0)?,
                sampler: non_empty(source, "SD_WEBUI_SAMPLER")
                    .unwrap_or_else(|| "Euler a".to_string()),
                denoise_strength: read_f64(source, "SD_WEBUI_DENOISE", 0.55)?.clamp(0.0, 1.0),
            },
            replicate: ReplicateConfig {
                api_token: non_empty(source, "REPLICATE_API_TOKEN"),
                api_base: api_base(
                    source,
                    "REPLICATE_API_BASE",
                    "https://api.replicate.com/v1",
                ),
                version: non_empty(source, "REPLICATE_MODEL_VERSION").unwrap_or_else(|| {
                    "black-forest-labs/FLUX.1-schnell:91aed44c916a5e4701ed83c1d4b84d097a76c07e8f1c7e9c6f85c8b3c0a73f1c"
                        .to_string()
                }),
            },
            huggingface: HuggingFaceConfig {
                api_token: non_empty(source, "HUGGINGFACE_API_TOKEN"),
                api_base: api_base(
                    source,
                    "HUGGINGFACE_API_BASE",
                    "https://router.huggingface.co",
                ),
                model: non_empty(source, "HUGGINGFACE_MODEL")
                    .unwrap_or_else(|| "black-forest-labs/FLUX.1-schnell".to_string()),
            },
            pollinations: PollinationsConfig {
                enabled: read_flag(source, "POLLINATIONS_ENABLED", true),
                api_base: api_base(
                    source,
                    "POLLINATIONS_API_BASE",
                    "https://image.pollinations.ai/prompt",
                ),
            },
        })
    }

    pub fn effective_order(&self) -> ProviderOrder {
        self.provider_order.effective(self.forced_provider.as_ref())
    }
}
