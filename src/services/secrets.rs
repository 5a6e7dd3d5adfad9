//! Secret storage for provider access tokens
//!
//! Tokens live apart from config, cache and profile data. They are stored
//! when a provider is linked and cleared on disconnect or when the provider
//! reports the token as expired or revoked.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::types::{AccessToken, ContribError, ProviderKind, Result};

/// Storage backend for provider tokens
pub trait SecretStore: Send + Sync {
    fn load(&self, kind: ProviderKind) -> Result<Option<AccessToken>>;

    fn store(&self, kind: ProviderKind, token: &AccessToken) -> Result<()>;

    /// Removing a token that is not stored is not an error
    fn clear(&self, kind: ProviderKind) -> Result<()>;
}

/// In-process store; nothing survives the process
#[derive(Default)]
pub struct MemorySecretStore {
    tokens: Mutex<HashMap<ProviderKind, AccessToken>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn load(&self, kind: ProviderKind) -> Result<Option<AccessToken>> {
        let tokens = self
            .tokens
            .lock()
            .map_err(|_| ContribError::Secret("secret store lock poisoned".into()))?;
        Ok(tokens.get(&kind).cloned())
    }

    fn store(&self, kind: ProviderKind, token: &AccessToken) -> Result<()> {
        let mut tokens = self
            .tokens
            .lock()
            .map_err(|_| ContribError::Secret("secret store lock poisoned".into()))?;
        tokens.insert(kind, token.clone());
        Ok(())
    }

    fn clear(&self, kind: ProviderKind) -> Result<()> {
        let mut tokens = self
            .tokens
            .lock()
            .map_err(|_| ContribError::Secret("secret store lock poisoned".into()))?;
        tokens.remove(&kind);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    tokens: BTreeMap<ProviderKind, String>,
}

/// JSON file store (`~/.contribgrid/secrets.json`, mode 0600 on unix).
///
/// Reads take a shared lock and read-modify-write cycles an exclusive lock
/// on a sibling `.lock` file; writes go through temp file + rename.
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(config::data_dir()?.join("secrets.json")))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_path = self.path.with_extension("json.lock");
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| ContribError::Secret(format!("Failed to open lock file: {}", e)))
    }

    fn read_file(&self) -> Result<SecretsFile> {
        if !self.path.exists() {
            return Ok(SecretsFile::default());
        }
        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .map_err(|e| ContribError::Secret(format!("Corrupted secrets file: {}", e)))
    }

    fn write_file(&self, secrets: &SecretsFile) -> Result<()> {
        let content = serde_json::to_string_pretty(secrets)
            .map_err(|e| ContribError::Secret(format!("Serialization failed: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut file = create_private(&temp_path)
                .map_err(|e| ContribError::Secret(format!("Failed to create temp file: {}", e)))?;
            file.write_all(content.as_bytes())
                .map_err(|e| ContribError::Secret(format!("Failed to write temp file: {}", e)))?;
            file.sync_all()
                .map_err(|e| ContribError::Secret(format!("Failed to sync temp file: {}", e)))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| ContribError::Secret(format!("Failed to rename temp file: {}", e)))
    }

    fn update(&self, edit: impl FnOnce(&mut SecretsFile)) -> Result<()> {
        let lock = self.lock_file()?;
        lock.lock_exclusive()
            .map_err(|e| ContribError::Secret(format!("Failed to acquire write lock: {}", e)))?;

        let result = self.read_file().and_then(|mut secrets| {
            edit(&mut secrets);
            self.write_file(&secrets)
        });

        let _ = lock.unlock();
        result
    }
}

impl SecretStore for FileSecretStore {
    fn load(&self, kind: ProviderKind) -> Result<Option<AccessToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let lock = self.lock_file()?;
        lock.lock_shared()
            .map_err(|e| ContribError::Secret(format!("Failed to acquire read lock: {}", e)))?;
        let result = self.read_file();
        let _ = lock.unlock();

        Ok(result?.tokens.get(&kind).map(AccessToken::new))
    }

    fn store(&self, kind: ProviderKind, token: &AccessToken) -> Result<()> {
        if token.is_empty() {
            return Err(ContribError::Secret(format!(
                "refusing to store an empty {} token",
                kind
            )));
        }
        self.update(|secrets| {
            secrets.tokens.insert(kind, token.expose().to_string());
        })?;
        tracing::debug!(provider = %kind, "stored access token");
        Ok(())
    }

    fn clear(&self, kind: ProviderKind) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|secrets| {
            secrets.tokens.remove(&kind);
        })?;
        tracing::debug!(provider = %kind, "cleared access token");
        Ok(())
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<File> {
    File::create(path)
}
