//! Shared settings for the Image Chat CLI and GUI.
//! Persisted in the platform-specific config directory via `directories::ProjectDirs`.
//! The API key is read from the environment only and never written to disk.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::attachment::DEFAULT_MAX_DIMENSION;
use crate::chat::DEFAULT_EXPORT_FILE;
use crate::model::{ModelConfig, DEFAULT_BASE_URL, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS};

/// Environment variables holding the API key, in lookup order.
pub const API_KEY_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "moderras";
const APPLICATION: &str = "image-chat";

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Model API base URL
    pub base_url: String,
    /// Model to use when the catalog offers it (empty for automatic selection)
    pub preferred_model: String,
    /// Total attempts per reply when throttled
    pub max_attempts: u32,
    /// Delay between throttled attempts, in seconds
    pub retry_delay: u64,
    /// Longest side of an uploaded image, in pixels
    pub max_image_dim: u32,
    /// Send earlier turns along with each prompt
    pub include_history: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            preferred_model: String::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            max_image_dim: DEFAULT_MAX_DIMENSION,
            include_history: false,
        }
    }
}

impl AppSettings {
    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings from the config file.
    pub fn load() -> Self {
        let mut loaded: Self = Self::settings_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        loaded.backfill();
        loaded
    }

    /// Load settings, then apply overrides from the process environment.
    pub fn load_with_env() -> Self {
        let mut settings = Self::load();
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    /// Replace zero or blank values left by older or hand-edited files.
    fn backfill(&mut self) {
        let defaults = Self::default();

        if self.base_url.trim().is_empty() {
            self.base_url = defaults.base_url;
        }
        if self.max_image_dim == 0 {
            self.max_image_dim = defaults.max_image_dim;
        }
        if self.max_attempts == 0 {
            self.max_attempts = defaults.max_attempts;
        }
    }

    /// Apply overrides from environment-style variables.
    ///
    /// Unparseable values are ignored and the current setting is kept.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = var("GEMINI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = var("IMAGE_CHAT_MODEL") {
            self.preferred_model = model;
        }
        if let Some(attempts) = var("IMAGE_CHAT_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.max_attempts = attempts;
        }
        if let Some(delay) = var("IMAGE_CHAT_RETRY_DELAY").and_then(|v| v.parse().ok()) {
            self.retry_delay = delay;
        }
        if let Some(dim) = var("IMAGE_CHAT_MAX_IMAGE_DIM")
            .and_then(|v| v.parse().ok())
            .filter(|d: &u32| *d > 0)
        {
            self.max_image_dim = dim;
        }
        if let Some(history) = var("IMAGE_CHAT_INCLUDE_HISTORY").and_then(|v| parse_flag(&v)) {
            self.include_history = history;
        }
    }

    /// Build the model client configuration, attaching `api_key` if present.
    pub fn model_config(&self, api_key: Option<String>) -> ModelConfig {
        let mut config = ModelConfig::default()
            .with_base_url(self.base_url.clone())
            .with_max_attempts(self.max_attempts)
            .with_retry_delay(self.retry_delay)
            .with_max_image_dim(self.max_image_dim)
            .with_history(self.include_history);

        if !self.preferred_model.trim().is_empty() {
            config = config.with_preferred_model(self.preferred_model.trim());
        }
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }

        config
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir().ok_or("Cannot determine config directory")?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        let path = dir.join("settings.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        fs::write(&path, content)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }

    /// Get logs directory path.
    pub fn logs_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join("logs"))
    }

    /// Default location for exported chats.
    pub fn default_export_path() -> PathBuf {
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join("exports").join(DEFAULT_EXPORT_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE))
    }
}

/// Read the API key from the process environment.
pub fn api_key_from_env() -> Option<String> {
    api_key_from(|key| std::env::var(key).ok())
}

/// First non-blank value among [`API_KEY_VARS`].
pub fn api_key_from<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    API_KEY_VARS
        .iter()
        .filter_map(|key| lookup(key))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
