use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, Serializer};

use crate::providers::ProviderIdentity;

pub const DEFAULT_WIDTH: u32 = 512;
pub const DEFAULT_HEIGHT: u32 = 512;
pub const DEFAULT_STRENGTH: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Style {
    #[default]
    Cartoon,
    HandDrawn,
    Anime,
    Realistic,
    Retro,
    Minimalist,
    /// Unrecognized label, kept so placeholders can echo what was asked for.
    Custom(String),
}

impl Style {
    pub const KNOWN: [Style; 6] = [
        Style::Cartoon,
        Style::HandDrawn,
        Style::Anime,
        Style::Realistic,
        Style::Retro,
        Style::Minimalist,
    ];

    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "cartoon" => Style::Cartoon,
            "hand-drawn" | "hand_drawn" | "handdrawn" => Style::HandDrawn,
            "anime" => Style::Anime,
            "realistic" => Style::Realistic,
            "retro" => Style::Retro,
            "minimalist" => Style::Minimalist,
            _ => Style::Custom(normalized),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Style::Cartoon => "cartoon",
            Style::HandDrawn => "hand-drawn",
            Style::Anime => "anime",
            Style::Realistic => "realistic",
            Style::Retro => "retro",
            Style::Minimalist => "minimalist",
            Style::Custom(label) => label.as_str(),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Style {
    fn from(value: String) -> Self {
        Style::parse(&value)
    }
}

impl From<Style> for String {
    fn from(value: Style) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub style: Style,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_strength")]
    pub strength: u8,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, style: Style) -> Self {
        Self {
            prompt: prompt.into(),
            style,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            strength: DEFAULT_STRENGTH,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_strength(mut self, strength: u8) -> Self {
        self.strength = strength.clamp(1, 3);
        self
    }
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn default_strength() -> u8 {
    DEFAULT_STRENGTH
}

/// Where a result came from. Renders as `clipdrop`, `webui_img2img`,
/// `template`, `mock`, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultSource {
    Provider(ProviderIdentity),
    Img2Img(ProviderIdentity),
    Template,
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultSource::Provider(identity) => f.write_str(identity.as_str()),
            ResultSource::Img2Img(identity) => write!(f, "{}_img2img", identity.as_str()),
            ResultSource::Template => f.write_str("template"),
        }
    }
}

impl Serialize for ResultSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `is_mock` is true exactly when `provider` is the mock identity; use the
/// constructors rather than building this by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub image_path: PathBuf,
    pub provider: ResultSource,
    pub is_mock: bool,
}

impl GenerationResult {
    pub fn from_provider(image_path: impl Into<PathBuf>, identity: ProviderIdentity) -> Self {
        Self {
            image_path: image_path.into(),
            provider: ResultSource::Provider(identity),
            is_mock: identity == ProviderIdentity::Mock,
        }
    }

    pub fn mock(image_path: impl Into<PathBuf>) -> Self {
        Self::from_provider(image_path, ProviderIdentity::Mock)
    }

    pub fn img2img(image_path: impl Into<PathBuf>, identity: ProviderIdentity) -> Self {
        Self {
            image_path: image_path.into(),
            provider: ResultSource::Img2Img(identity),
            is_mock: false,
        }
    }

    pub fn template(template_path: &Path) -> Self {
        Self {
            image_path: template_path.to_path_buf(),
            provider: ResultSource::Template,
            is_mock: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptErrorKind {
    Backend,
    Timeout,
}

impl fmt::Display for AttemptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptErrorKind::Backend => f.write_str("backend"),
            AttemptErrorKind::Timeout => f.write_str("timeout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptError {
    pub provider: ProviderIdentity,
    pub kind: AttemptErrorKind,
    pub message: String,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.provider, self.kind, self.message)
    }
}

/// Result of one orchestrated call plus the per-attempt diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub result: GenerationResult,
    pub attempted: Vec<ProviderIdentity>,
    pub errors: Vec<AttemptError>,
}
