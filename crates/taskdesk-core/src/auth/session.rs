use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::models::User;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key for the cached user profile (JSON).
pub const USER_KEY: &str = "user";

/// Persistent key-value storage backing a session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

/// Stores all session keys as one JSON object on disk.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(SESSION_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read session file")?;
        serde_json::from_str(&contents).context("Failed to parse session file")
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if values.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove session file")?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}

// ============================================================================
// Session
// ============================================================================

/// Typed view over a [`SessionStore`], shared by the client and the
/// session lifecycle. Clone is cheap.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Read a key, treating storage failures as absence.
    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key, error = %format!("{:#}", e), "Failed to read session key");
                None
            }
        }
    }

    fn storage_error(e: anyhow::Error) -> ApiError {
        ApiError::Storage(format!("{:#}", e))
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn credential(&self) -> Option<Credential> {
        self.access_token()
            .map(|access| Credential::new(access, self.refresh_token()))
    }

    /// Cached user profile. A corrupt entry reads as no profile.
    pub fn user(&self) -> Option<User> {
        let raw = self.read(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Cached user profile is not valid JSON");
                None
            }
        }
    }

    /// Persist both tokens. A credential without a refresh token leaves the
    /// stored refresh token untouched.
    pub fn save_credential(&self, credential: &Credential) -> Result<(), ApiError> {
        self.store
            .set(ACCESS_TOKEN_KEY, &credential.access_token)
            .map_err(Self::storage_error)?;
        if let Some(ref refresh) = credential.refresh_token {
            self.store
                .set(REFRESH_TOKEN_KEY, refresh)
                .map_err(Self::storage_error)?;
        }
        debug!("Stored session credential");
        Ok(())
    }

    pub fn save_user(&self, user: &User) -> Result<(), ApiError> {
        let raw = serde_json::to_string(user)
            .map_err(|e| ApiError::Storage(format!("Failed to serialize user: {}", e)))?;
        self.store.set(USER_KEY, &raw).map_err(Self::storage_error)
    }

    /// Remove credential and profile. Attempts every key even if one fails.
    pub fn clear(&self) -> Result<(), ApiError> {
        let mut first_error = None;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key = key, error = %format!("{:#}", e), "Failed to clear session key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(Self::storage_error(e)),
            None => {
                debug!("Cleared session");
                Ok(())
            }
        }
    }

    /// Access token and profile are present. The refresh token is optional:
    /// the login endpoint may not issue one.
    pub fn is_complete(&self) -> bool {
        self.access_token().is_some() && self.user().is_some()
    }
}
