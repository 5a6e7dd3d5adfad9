//! Contributions API client
//!
//! Fetches `{ total, contributions }` for a GitHub username from the public
//! contributions API and keeps a per-user TTL cache on disk. A failed fetch
//! is always reported as `FetchFailed`; it is never turned into an empty
//! response.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use fs2::FileExt;
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::http::{self, HttpFailure};
use crate::config::{self, Config};
use crate::types::{CacheWarning, ContribError, ContributionsResponse, Result};

/// GitHub's username limit
const MAX_USERNAME_LEN: usize = 39;

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+(-[A-Za-z0-9]+)*$").expect("valid regex"))
}

fn profile_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:https?://)?(?:www\.)?github\.com/([^/?#]+)/?(?:[?#].*)?$")
            .expect("valid regex")
    })
}

/// Accept `octocat`, `@octocat` or a GitHub profile URL and return the bare
/// username, rejecting anything GitHub would not allow.
pub fn normalize_username(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let candidate = match profile_url_re().captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
        None => trimmed.trim_start_matches('@'),
    };

    if candidate.is_empty()
        || candidate.len() > MAX_USERNAME_LEN
        || !username_re().is_match(candidate)
    {
        return Err(ContribError::InvalidInput(format!(
            "{:?} is not a valid GitHub username",
            input
        )));
    }
    Ok(candidate.to_string())
}

/// Where a loaded response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Network,
    /// Cache younger than the TTL
    Cache,
    /// Expired cache used because the network fetch failed
    StaleCache,
}

/// A response plus its provenance
#[derive(Debug, Clone)]
pub struct FetchedContributions {
    pub username: String,
    pub data: ContributionsResponse,
    pub source: DataSource,
    /// Unix timestamp of the underlying network fetch
    pub fetched_at: i64,
}

/// On-disk cache entry for one user
#[derive(Debug, Serialize, Deserialize)]
pub struct ContributionsCache {
    pub username: String,
    /// Unix timestamp when the data was fetched
    pub fetched_at: i64,
    pub data: ContributionsResponse,
}

impl ContributionsCache {
    pub fn is_expired(&self, ttl_secs: i64) -> bool {
        chrono::Utc::now().timestamp() - self.fetched_at > ttl_secs
    }
}

/// Contributions API client with a per-user file cache
pub struct ContributionsService {
    client: Client,
    api_base_url: String,
    retries: u32,
    backoff: Duration,
    cache_ttl_secs: i64,
    cache_dir: PathBuf,
}

impl ContributionsService {
    /// Client using `~/.contribgrid/cache`
    pub fn new(config: &Config) -> Result<Self> {
        let cache_dir = config::data_dir()?.join("cache");
        Self::with_cache_dir(config, cache_dir)
    }

    pub fn with_cache_dir(config: &Config, cache_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config.request_timeout())?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            retries: config.retries,
            backoff: http::RETRY_BACKOFF,
            cache_ttl_secs: config.cache_ttl_secs,
            cache_dir,
        })
    }

    /// Disable the pause between retries
    pub fn without_backoff(mut self) -> Self {
        self.backoff = Duration::ZERO;
        self
    }

    pub fn cache_path(&self, username: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", username.to_ascii_lowercase()))
    }

    /// Fresh cache, else network, else stale cache, else `FetchFailed`
    pub fn load(&self, username: &str) -> Result<FetchedContributions> {
        let username = normalize_username(username)?;
        let path = self.cache_path(&username);

        let cached = match Self::load_cache(&path) {
            Ok(cache) => cache,
            Err(warning) => {
                if let Some(warning) = warning {
                    tracing::warn!(%warning, "ignoring contributions cache");
                }
                return self.fetch_and_store(&username, &path);
            }
        };

        if !cached.is_expired(self.cache_ttl_secs) {
            tracing::debug!(%username, "contributions served from cache");
            return Ok(FetchedContributions {
                username,
                data: cached.data,
                source: DataSource::Cache,
                fetched_at: cached.fetched_at,
            });
        }

        match self.fetch_and_store(&username, &path) {
            Ok(fresh) => Ok(fresh),
            Err(e) => {
                tracing::warn!(%username, error = %e, "fetch failed, falling back to expired cache");
                Ok(FetchedContributions {
                    username,
                    data: cached.data,
                    source: DataSource::StaleCache,
                    fetched_at: cached.fetched_at,
                })
            }
        }
    }

    /// Always hit the network; the cache is updated on success only
    pub fn refresh(&self, username: &str) -> Result<FetchedContributions> {
        let username = normalize_username(username)?;
        let path = self.cache_path(&username);
        self.fetch_and_store(&username, &path)
    }

    /// Network fetch without touching the cache
    pub fn fetch(&self, username: &str) -> Result<ContributionsResponse> {
        let username = normalize_username(username)?;
        let url = format!("{}/{}", self.api_base_url, username);

        http::with_retry(self.retries, self.backoff, |attempt| {
            tracing::debug!(%url, attempt, "fetching contributions");
            http::get_json::<ContributionsResponse>(self.client.get(&url))
        })
        .map_err(|failure: HttpFailure| {
            failure.into_fetch_error(&format!("contributions for {}", username))
        })
    }

    pub fn clear_cache(&self, username: &str) -> Result<()> {
        let path = self.cache_path(username);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn fetch_and_store(&self, username: &str, path: &Path) -> Result<FetchedContributions> {
        let data = self.fetch(username)?;
        let cache = ContributionsCache {
            username: username.to_string(),
            fetched_at: chrono::Utc::now().timestamp(),
            data,
        };
        if let Err(e) = Self::save_cache(path, &cache) {
            tracing::warn!(error = %e, "failed to write contributions cache");
        }
        Ok(FetchedContributions {
            username: cache.username,
            data: cache.data,
            source: DataSource::Network,
            fetched_at: cache.fetched_at,
        })
    }

    /// Read a cache file under a shared lock. `Err(None)` means no cache.
    fn load_cache(path: &Path) -> std::result::Result<ContributionsCache, Option<CacheWarning>> {
        if !path.exists() {
            return Err(None);
        }

        let file = File::open(path)
            .map_err(|e| Some(CacheWarning::LoadFailed(format!("Failed to open cache: {}", e))))?;
        file.lock_shared().map_err(|e| {
            Some(CacheWarning::LoadFailed(format!(
                "Failed to acquire read lock: {}",
                e
            )))
        })?;

        let mut content = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut content);
        let _ = file.unlock();
        read.map_err(|e| Some(CacheWarning::LoadFailed(format!("Failed to read cache: {}", e))))?;

        serde_json::from_str(&content)
            .map_err(|e| Some(CacheWarning::Corrupted(format!("Corrupted cache file: {}", e))))
    }

    /// Atomic write (temp file + rename) under an exclusive lock
    fn save_cache(path: &Path, cache: &ContributionsCache) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(cache)
            .map_err(|e| ContribError::Cache(format!("Serialization failed: {}", e)))?;

        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = File::create(&temp_path)
                .map_err(|e| ContribError::Cache(format!("Failed to create temp file: {}", e)))?;
            file.write_all(content.as_bytes())
                .map_err(|e| ContribError::Cache(format!("Failed to write temp file: {}", e)))?;
            file.sync_all()
                .map_err(|e| ContribError::Cache(format!("Failed to sync temp file: {}", e)))?;
        }

        let target = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        target
            .lock_exclusive()
            .map_err(|e| ContribError::Cache(format!("Failed to acquire write lock: {}", e)))?;

        fs::rename(&temp_path, path)
            .map_err(|e| ContribError::Cache(format!("Failed to rename temp file: {}", e)))?;

        let _ = target.unlock();
        Ok(())
    }
}
