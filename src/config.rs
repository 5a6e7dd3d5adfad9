//! User configuration (~/.contribgrid/config.json)
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! A file that exists but is not valid JSON is a hard error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ContribError, Result};

/// Overrides the data directory (config, cache, secrets, log)
pub const HOME_ENV: &str = "CONTRIBGRID_HOME";

const DEFAULT_API_BASE_URL: &str = "https://github-contributions-api.jogruber.de/v4";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Contributions API base; the username is appended as a path segment
    pub api_base_url: String,
    /// Settings backend endpoint (profile updates)
    pub backend_url: Option<String>,
    pub request_timeout_secs: u64,
    /// Extra attempts after a transient failure
    pub retries: u32,
    pub cache_ttl_secs: i64,
    pub default_username: Option<String>,
    /// Repositories fetched after linking GitHub
    pub repo_page_size: u32,
    pub github_client_id: Option<String>,
    pub google_client_id: Option<String>,
    pub freelancer_client_id: Option<String>,
    /// Backend endpoints that perform the server-side code exchange
    pub github_callback_url: Option<String>,
    pub drive_callback_url: Option<String>,
    pub freelancer_callback_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            backend_url: None,
            request_timeout_secs: 10,
            retries: 1,
            cache_ttl_secs: 3600,
            default_username: None,
            repo_page_size: 30,
            github_client_id: None,
            google_client_id: None,
            freelancer_client_id: None,
            github_callback_url: None,
            drive_callback_url: None,
            freelancer_callback_url: None,
        }
    }
}

impl Config {
    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&data_dir()?.join("config.json"))
    }

    /// Load from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| ContribError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ContribError::Config(format!("Serialization failed: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(ContribError::Config(format!(
                "api_base_url must be an http(s) URL, got {:?}",
                self.api_base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ContribError::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Data directory: `$CONTRIBGRID_HOME` or `~/.contribgrid`
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home = directories::UserDirs::new()
        .ok_or_else(|| ContribError::Config("Failed to get home directory".into()))?
        .home_dir()
        .to_path_buf();
    Ok(home.join(".contribgrid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.retries, 1);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"retries": 3, "default_username": "octocat"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.retries, 3);
        assert_eq!(config.default_username.as_deref(), Some("octocat"));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.cache_ttl_secs, 3600);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{ retries: ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ContribError::Config(_)));
    }

    #[test]
    fn test_rejects_non_http_api_base() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"api_base_url": "ftp://example.com"}"#).unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"request_timeout_secs": 0}"#).unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.json");
        let config = Config {
            github_client_id: Some("Iv1.abc".into()),
            ..Config::default()
        };

        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
