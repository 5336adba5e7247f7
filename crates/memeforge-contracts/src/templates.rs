use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const REMOTE_INDEX_FILE: &str = "remote_index.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEntry {
    pub id: String,
    pub name: String,
    pub filename: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default = "default_license")]
    pub license: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTemplate {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
}

/// Read-only view over the template directory: bundled entries first, then
/// whatever a previous sync recorded in `remote_index.json`. Entries whose
/// file is missing on disk are invisible.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    template_dir: PathBuf,
    builtins: Vec<TemplateEntry>,
    remote: Vec<TemplateEntry>,
}

impl TemplateCatalog {
    /// Built-ins plus the remote index. A missing index is an empty one; an
    /// unreadable or malformed index is an error.
    pub fn open(template_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut catalog = Self::builtin(template_dir);
        catalog.remote = read_remote_index(&catalog.template_dir.join(REMOTE_INDEX_FILE))?;
        Ok(catalog)
    }

    pub fn builtin(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            builtins: builtin_templates(),
            remote: Vec::new(),
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    pub fn list(&self) -> Vec<ResolvedTemplate> {
        self.entries()
            .filter_map(|entry| self.materialize(entry))
            .collect()
    }

    pub fn resolve(&self, template_id: &str) -> Option<ResolvedTemplate> {
        let wanted = template_id.trim();
        // First match wins, even if its file is gone.
        let entry = self.entries().find(|entry| entry.id == wanted)?;
        self.materialize(entry)
    }

    fn entries(&self) -> impl Iterator<Item = &TemplateEntry> {
        self.builtins.iter().chain(self.remote.iter())
    }

    fn materialize(&self, entry: &TemplateEntry) -> Option<ResolvedTemplate> {
        if entry.filename.trim().is_empty() {
            return None;
        }
        let path = self.template_dir.join(&entry.filename);
        if !path.is_file() {
            return None;
        }
        Some(ResolvedTemplate {
            id: entry.id.clone(),
            name: entry.name.clone(),
            path,
        })
    }
}

fn read_remote_index(path: &Path) -> Result<Vec<TemplateEntry>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()))
        }
    };
    serde_json::from_str(&raw)
        .with_context(|| format!("malformed template index {}", path.display()))
}

fn default_license() -> String {
    "Demo Only".to_string()
}

fn builtin_templates() -> Vec<TemplateEntry> {
    let entry = |id: &str, name: &str, filename: &str, source_url: &str, license: &str| {
        TemplateEntry {
            id: id.to_string(),
            name: name.to_string(),
            filename: filename.to_string(),
            source_url: source_url.to_string(),
            license: license.to_string(),
        }
    };
    vec![
        entry("dog", "狗头", "dog.png", "local", "Demo Only"),
        entry("cat", "猫猫", "cat.png", "local", "Demo Only"),
        entry("panda", "熊猫头", "panda.png", "local", "Demo Only"),
        entry("shock", "震惊", "shock.png", "local", "Demo Only"),
        entry(
            "ingenuity_15",
            "NASA 梗图 15",
            "ingenuity_meme_15.jpg",
            "https://commons.wikimedia.org/wiki/File:Ingenuity_memes_15.jpg",
            "Public Domain (US Government)",
        ),
        entry(
            "ingenuity_07",
            "NASA 梗图 07",
            "ingenuity_meme_07.jpg",
            "https://commons.wikimedia.org/wiki/File:Ingenuity_memes_07.jpg",
            "Public Domain (US Government)",
        ),
    ]
}
