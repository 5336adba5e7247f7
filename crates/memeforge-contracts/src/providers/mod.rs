use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of backends the orchestrator knows how to route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderIdentity {
    Clipdrop,
    Webui,
    Replicate,
    Huggingface,
    Pollinations,
    Mock,
}

impl ProviderIdentity {
    pub const ALL: [ProviderIdentity; 6] = [
        ProviderIdentity::Clipdrop,
        ProviderIdentity::Webui,
        ProviderIdentity::Replicate,
        ProviderIdentity::Huggingface,
        ProviderIdentity::Pollinations,
        ProviderIdentity::Mock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderIdentity::Clipdrop => "clipdrop",
            ProviderIdentity::Webui => "webui",
            ProviderIdentity::Replicate => "replicate",
            ProviderIdentity::Huggingface => "huggingface",
            ProviderIdentity::Pollinations => "pollinations",
            ProviderIdentity::Mock => "mock",
        }
    }

    /// Accepts canonical names plus the role aliases used in operator configs
    /// (`local-webui`, `hosted-flux`, `hosted-router`, `free-hosted`).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        let identity = match normalized.as_str() {
            "clipdrop" => ProviderIdentity::Clipdrop,
            "webui" | "local-webui" | "sd-webui" => ProviderIdentity::Webui,
            "replicate" | "hosted-flux" => ProviderIdentity::Replicate,
            "huggingface" | "hf" | "hosted-router" => ProviderIdentity::Huggingface,
            "pollinations" | "free-hosted" => ProviderIdentity::Pollinations,
            "mock" => ProviderIdentity::Mock,
            _ => return None,
        };
        Some(identity)
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderIdentity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| format!("unknown provider '{}'", value.trim()))
    }
}

/// One entry of a configured order. Unknown tags are kept verbatim so status
/// reporting can surface them; dispatch ignores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSlot {
    Known(ProviderIdentity),
    Unknown(String),
}

impl ProviderSlot {
    pub fn parse(raw: &str) -> Self {
        match ProviderIdentity::parse(raw) {
            Some(identity) => ProviderSlot::Known(identity),
            None => ProviderSlot::Unknown(raw.trim().to_ascii_lowercase()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ProviderSlot::Known(identity) => identity.as_str(),
            ProviderSlot::Unknown(name) => name.as_str(),
        }
    }

    pub fn identity(&self) -> Option<ProviderIdentity> {
        match self {
            ProviderSlot::Known(identity) => Some(*identity),
            ProviderSlot::Unknown(_) => None,
        }
    }
}

impl From<ProviderIdentity> for ProviderSlot {
    fn from(identity: ProviderIdentity) -> Self {
        ProviderSlot::Known(identity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOrder {
    slots: Vec<ProviderSlot>,
}

impl Default for ProviderOrder {
    fn default() -> Self {
        Self::default_priority()
    }
}

impl ProviderOrder {
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        Self { slots }
    }

    /// Cheapest and most reliable first, free-but-flaky last, mock as the net.
    pub fn default_priority() -> Self {
        Self::new(
            ProviderIdentity::ALL
                .iter()
                .copied()
                .map(ProviderSlot::Known)
                .collect(),
        )
    }

    /// Parses a comma-separated override. Blank items are dropped, so `","`
    /// yields an empty order (which routes straight to mock).
    pub fn parse(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(ProviderSlot::parse)
                .collect(),
        )
    }

    pub fn from_override(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Self::parse(value),
            None => Self::default_priority(),
        }
    }

    pub fn forced(slot: ProviderSlot) -> Self {
        Self::new(vec![slot])
    }

    /// A forced provider collapses the order to that single slot.
    pub fn effective(&self, forced: Option<&ProviderSlot>) -> ProviderOrder {
        match forced {
            Some(slot) => Self::forced(slot.clone()),
            None => self.clone(),
        }
    }

    pub fn slots(&self) -> &[ProviderSlot] {
        self.slots.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.name().to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatusEntry {
    pub name: String,
    pub enabled: bool,
    pub detail: String,
}

pub trait NamedProvider {
    fn identity(&self) -> ProviderIdentity;
}

/// Owns one adapter per identity, in registration order.
#[derive(Debug, Clone)]
pub struct ProviderRegistry<T: NamedProvider> {
    providers: Vec<T>,
}

impl<T: NamedProvider> Default for ProviderRegistry<T> {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
        }
    }
}

impl<T: NamedProvider> ProviderRegistry<T> {
    pub fn new(providers: Vec<T>) -> Self {
        let mut registry = Self::default();
        for provider in providers {
            registry.register(provider);
        }
        registry
    }

    /// Registering an identity twice replaces the earlier adapter in place.
    pub fn register(&mut self, provider: T) {
        let identity = provider.identity();
        if let Some(existing) = self
            .providers
            .iter_mut()
            .find(|candidate| candidate.identity() == identity)
        {
            *existing = provider;
            return;
        }
        self.providers.push(provider);
    }

    pub fn get(&self, identity: ProviderIdentity) -> Option<&T> {
        self.providers
            .iter()
            .find(|provider| provider.identity() == identity)
    }

    pub fn list(&self) -> Vec<String> {
        let mut names = self
            .providers
            .iter()
            .map(|provider| provider.identity().to_string())
            .collect::<Vec<String>>();
        names.sort();
        names
    }

    pub fn providers(&self) -> &[T] {
        self.providers.as_slice()
    }
}
