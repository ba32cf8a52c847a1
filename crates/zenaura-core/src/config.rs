//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: which
//! API to talk to, how long to wait for it, and where the session token is
//! persisted.
//!
//! Configuration is stored at `~/.config/zenaura/config.json`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, DEFAULT_API_BASE_URL, REQUEST_TIMEOUT_SECS};
use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, TokenStorage};

/// Application name used for config directory paths
const APP_NAME: &str = "zenaura";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Session file name used by the file storage backend
const SESSION_FILE: &str = "session.json";

/// Environment variable that overrides the configured API base URL
pub const API_URL_ENV: &str = "ZENAURA_API_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub storage: StorageBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            storage: StorageBackend::default(),
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn session_path(&self) -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(SESSION_FILE))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::with_timeout(&self.api_base_url, self.request_timeout())
            .context("Failed to build HTTP client")
    }

    /// Token storage for the configured backend
    pub fn token_storage(&self) -> Result<Arc<dyn TokenStorage>> {
        Ok(match self.storage {
            StorageBackend::File => Arc::new(FileStorage::new(self.session_path()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        })
    }
}
