//! Client configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, timeouts, the token monitor cadence and where the session is
//! stored.
//!
//! Configuration is stored at `~/.config/taskdesk/config.json`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, DEFAULT_TIMEOUT_SECS};
use crate::auth::lifecycle::{TOKEN_CHECK_INTERVAL_SECS, TOKEN_REFRESH_HORIZON_SECS};
use crate::auth::{FileStore, KeyringStore, MemoryStore, Session, SessionManager, SessionStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "taskdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default backend location
const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

/// Environment variable overriding `api_base_url`
pub const ENV_API_URL: &str = "TASKDESK_API_URL";

/// Environment variable overriding `store`
pub const ENV_STORE: &str = "TASKDESK_STORE";

/// Where the session tokens live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "keyring" | "keychain" => Ok(StoreBackend::Keyring),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown session store: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub token_check_interval_secs: u64,
    pub refresh_horizon_secs: i64,
    pub store: StoreBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            token_check_interval_secs: TOKEN_CHECK_INTERVAL_SECS,
            refresh_horizon_secs: TOKEN_REFRESH_HORIZON_SECS,
            store: StoreBackend::File,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
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

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply `TASKDESK_API_URL` / `TASKDESK_STORE` from the given lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(store) = lookup(ENV_STORE) {
            self.store = store.parse()?;
        }
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn open_session(&self) -> Result<Session> {
        let store: Arc<dyn SessionStore> = match self.store {
            StoreBackend::File => Arc::new(FileStore::new(&self.cache_dir()?)),
            StoreBackend::Keyring => Arc::new(KeyringStore::new()),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(Session::new(store))
    }

    pub fn build_client(&self, session: Session) -> Result<ApiClient> {
        ApiClient::with_timeout(&self.api_base_url, session, self.request_timeout())
    }

    /// Client plus lifecycle manager wired to the configured store.
    pub fn build_manager(&self) -> Result<SessionManager> {
        let client = self.build_client(self.open_session()?)?;
        Ok(SessionManager::with_intervals(
            client,
            Duration::from_secs(self.token_check_interval_secs),
            chrono::Duration::seconds(self.refresh_horizon_secs),
        ))
    }
}
