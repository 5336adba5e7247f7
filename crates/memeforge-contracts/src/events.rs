use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::providers::ProviderIdentity;
use crate::request::AttemptErrorKind;

/// Diagnostics emitted while a request walks the provider chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    GenerationStarted {
        request_id: String,
        prompt: String,
        style: String,
        order: Vec<String>,
    },
    ProviderSkipped {
        request_id: String,
        provider: String,
        reason: String,
    },
    ProviderFailed {
        request_id: String,
        provider: ProviderIdentity,
        kind: AttemptErrorKind,
        error: String,
        elapsed_ms: u64,
    },
    GenerationCompleted {
        request_id: String,
        provider: String,
        is_mock: bool,
        image_path: String,
        failed_attempts: usize,
    },
    TemplateFallback {
        request_id: String,
        template_path: String,
        reason: String,
    },
}

/// Append-only JSONL writer for generation diagnostics.
///
/// Each line carries `type`, `session_id` and `ts` next to the event's own
/// fields. Clones share one file lock, so concurrent requests interleave
/// whole lines.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event: &GenerationEvent) -> anyhow::Result<Value> {
        let mut line_object = match serde_json::to_value(event)? {
            Value::Object(fields) => fields,
            other => anyhow::bail!("event did not serialize to an object: {other}"),
        };
        line_object.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        line_object.insert("ts".to_string(), Value::String(now_utc_iso()));

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&line_object)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(line_object))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
