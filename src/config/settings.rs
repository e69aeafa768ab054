// src/config/settings.rs
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const ENV_BACKEND_URL: &str = "SENTINEL_BACKEND_URL";
pub const ENV_MODEL: &str = "SENTINEL_MODEL";
pub const ENV_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";

/// Runtime-tunable pipeline parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// OpenAI-compatible chat completions endpoint.
    pub backend_url: String,
    pub model: String,
    /// Webhook receiving `{"text": ...}`; empty disables notifications.
    pub notify_webhook_url: String,
    /// Reply budget per chunk; `max_tokens * 4` also caps the cycle text.
    pub max_tokens: u32,
    pub max_tokens_bulk: u32,
    pub fetch_interval_secs: u64,
    pub items_per_feed: usize,
    pub use_chunked_mode: bool,
    pub chunk_size_chars: usize,
    pub write_rolling_file: bool,
    pub analysis_window_secs: u64,
    pub bulk_analysis_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:1234/v1/chat/completions".to_string(),
            model: "local-model".to_string(),
            notify_webhook_url: String::new(),
            max_tokens: 3000,
            max_tokens_bulk: 4000,
            fetch_interval_secs: 600,
            items_per_feed: 50,
            use_chunked_mode: true,
            chunk_size_chars: 4000,
            write_rolling_file: true,
            analysis_window_secs: 3600,
            bulk_analysis_enabled: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.backend_url.trim().is_empty() {
            bail!("backend_url must not be empty");
        }
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            bail!("backend_url must be an http(s) URL, got {:?}", self.backend_url);
        }
        let hook = self.notify_webhook_url.trim();
        if !hook.is_empty() && !(hook.starts_with("http://") || hook.starts_with("https://")) {
            bail!("notify_webhook_url must be empty or an http(s) URL");
        }
        if self.max_tokens == 0 || self.max_tokens_bulk == 0 {
            bail!("max_tokens and max_tokens_bulk must be > 0");
        }
        if self.fetch_interval_secs == 0 {
            bail!("fetch_interval_secs must be > 0");
        }
        if self.analysis_window_secs == 0 {
            bail!("analysis_window_secs must be > 0");
        }
        if self.items_per_feed == 0 {
            bail!("items_per_feed must be > 0");
        }
        if self.chunk_size_chars == 0 {
            bail!("chunk_size_chars must be > 0");
        }
        Ok(())
    }

    /// Environment overrides for deployment secrets and endpoints.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(ENV_BACKEND_URL) {
            if !v.trim().is_empty() {
                self.backend_url = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var(ENV_MODEL) {
            if !v.trim().is_empty() {
                self.model = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var(ENV_WEBHOOK_URL) {
            self.notify_webhook_url = v.trim().to_string();
        }
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs.max(1))
    }

    pub fn analysis_window(&self) -> Duration {
        Duration::from_secs(self.analysis_window_secs.max(1))
    }
}

/// Shared, swappable settings. Readers take a snapshot per operation.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Settings>>,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Validate and replace the whole settings record.
    pub fn apply(&self, next: Settings) -> Result<()> {
        next.validate()?;
        *self.inner.write().unwrap_or_else(|p| p.into_inner()) = next;
        Ok(())
    }
}
