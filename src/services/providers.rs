//! GitHub, Google Drive and Freelancer.com account links
//!
//! The authorization code is exchanged for a token by the settings backend;
//! the backend then redirects back with the token and the first account
//! snapshot. These providers only build authorize URLs, decode that payload,
//! and re-fetch account data with a stored token.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::http::{self, HttpFailure};
use crate::config::Config;
use crate::types::{
    AccessToken, ContribError, DriveAccount, DriveFile, DriveUser, FreelancerAccount,
    GitHubAccount, GitHubRepo, LinkedAccount, ProviderKind, Result,
};

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_API_URL: &str = "https://api.github.com";

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_API_URL: &str = "https://www.googleapis.com";

const FREELANCER_AUTHORIZE_URL: &str = "https://accounts.freelancer.com/oauth/authorize";
const FREELANCER_API_URL: &str = "https://www.freelancer.com/api";

/// Files listed after linking Drive
const DRIVE_FILE_PAGE_SIZE: u32 = 5;

/// One third-party service an account can be linked to
pub trait Provider: Send + Sync {
    type Account: LinkedAccount;

    fn kind(&self) -> ProviderKind;

    /// Authorization page; `state` comes back on the callback
    fn authorize_url(&self, state: &str) -> Result<String>;

    /// Decode the provider object from the backend's callback payload
    fn parse_callback(&self, payload: serde_json::Value) -> Result<(AccessToken, Self::Account)>;

    /// Re-fetch account data; `Unauthorized` when the token is no longer valid
    fn fetch_account(&self, token: &AccessToken) -> Result<Self::Account>;
}

/// OAuth app registration for one provider
#[derive(Debug, Clone, Default)]
struct AppRegistration {
    client_id: Option<String>,
    /// Backend endpoint performing the code exchange
    callback_url: Option<String>,
}

impl AppRegistration {
    fn authorize_url(
        &self,
        kind: ProviderKind,
        base: &str,
        state: &str,
        extra: &[(&str, &str)],
    ) -> Result<String> {
        let client_id = self.client_id.as_deref().ok_or_else(|| {
            ContribError::Config(format!("{}_client_id is not set", config_prefix(kind)))
        })?;
        let callback_url = self.callback_url.as_deref().ok_or_else(|| {
            ContribError::Config(format!("{}_callback_url is not set", callback_prefix(kind)))
        })?;

        let mut params = vec![
            ("client_id", client_id),
            ("redirect_uri", callback_url),
            ("state", state),
        ];
        params.extend_from_slice(extra);

        Url::parse_with_params(base, &params)
            .map(String::from)
            .map_err(|e| ContribError::Config(format!("invalid authorize URL: {}", e)))
    }
}

fn config_prefix(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::GitHub => "github",
        ProviderKind::GoogleDrive => "google",
        ProviderKind::Freelancer => "freelancer",
    }
}

fn callback_prefix(kind: ProviderKind) -> &'static str {
    kind.slug()
}

/// Shared request plumbing: retry transient failures, map 401/403 to `Unauthorized`
#[derive(Clone)]
struct ApiClient {
    kind: ProviderKind,
    client: Client,
    retries: u32,
}

impl ApiClient {
    fn new(kind: ProviderKind, config: &Config) -> Result<Self> {
        Ok(Self {
            kind,
            client: http::build_client(config.request_timeout())?,
            retries: config.retries,
        })
    }

    fn get<T: DeserializeOwned>(
        &self,
        what: &str,
        request: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<T> {
        http::with_retry(self.retries, http::RETRY_BACKOFF, |_| {
            http::get_json(request(&self.client))
        })
        .map_err(|failure| self.classify(what, failure))
    }

    fn classify(&self, what: &str, failure: HttpFailure) -> ContribError {
        if failure.is_unauthorized() {
            ContribError::Unauthorized(self.kind)
        } else {
            failure.into_fetch_error(what)
        }
    }
}

fn decode<T: DeserializeOwned>(kind: ProviderKind, payload: serde_json::Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| ContribError::Parse(format!("{} callback payload: {}", kind, e)))
}

fn require_token(kind: ProviderKind, token: AccessToken) -> Result<AccessToken> {
    if token.is_empty() {
        return Err(ContribError::Parse(format!(
            "{} callback carried an empty access token",
            kind
        )));
    }
    Ok(token)
}

// ========== GitHub ==========

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitHubCallback {
    access_token: AccessToken,
    user: GitHubAccount,
    #[serde(default)]
    repos: Vec<GitHubRepo>,
}

pub struct GitHubProvider {
    app: AppRegistration,
    api: ApiClient,
    api_base: String,
    repo_page_size: u32,
}

impl GitHubProvider {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            app: AppRegistration {
                client_id: config.github_client_id.clone(),
                callback_url: config.github_callback_url.clone(),
            },
            api: ApiClient::new(ProviderKind::GitHub, config)?,
            api_base: GITHUB_API_URL.to_string(),
            repo_page_size: config.repo_page_size,
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

impl Provider for GitHubProvider {
    type Account = GitHubAccount;

    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    fn authorize_url(&self, state: &str) -> Result<String> {
        self.app.authorize_url(
            self.kind(),
            GITHUB_AUTHORIZE_URL,
            state,
            &[("scope", "read:user repo")],
        )
    }

    fn parse_callback(&self, payload: serde_json::Value) -> Result<(AccessToken, GitHubAccount)> {
        let callback: GitHubCallback = decode(self.kind(), payload)?;
        let mut account = callback.user;
        account.repos = callback.repos;
        Ok((require_token(self.kind(), callback.access_token)?, account))
    }

    fn fetch_account(&self, token: &AccessToken) -> Result<GitHubAccount> {
        let user_url = format!("{}/user", self.api_base);
        let repos_url = format!(
            "{}/user/repos?per_page={}&sort=updated",
            self.api_base, self.repo_page_size
        );
        let authed = |url: &str| {
            let url = url.to_string();
            move |client: &Client| {
                client
                    .get(&url)
                    .bearer_auth(token.expose())
                    .header("Accept", "application/vnd.github+json")
            }
        };

        let mut account: GitHubAccount = self.api.get("GitHub user", authed(&user_url))?;
        account.repos = self.api.get("GitHub repositories", authed(&repos_url))?;
        Ok(account)
    }
}

// ========== Google Drive ==========

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveCallback {
    access_token: AccessToken,
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    user: DriveUser,
}

#[derive(Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

pub struct DriveProvider {
    app: AppRegistration,
    api: ApiClient,
    api_base: String,
}

impl DriveProvider {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            app: AppRegistration {
                client_id: config.google_client_id.clone(),
                callback_url: config.drive_callback_url.clone(),
            },
            api: ApiClient::new(ProviderKind::GoogleDrive, config)?,
            api_base: GOOGLE_API_URL.to_string(),
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

impl Provider for DriveProvider {
    type Account = DriveAccount;

    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
    }

    fn authorize_url(&self, state: &str) -> Result<String> {
        self.app.authorize_url(
            self.kind(),
            GOOGLE_AUTHORIZE_URL,
            state,
            &[
                ("response_type", "code"),
                (
                    "scope",
                    "https://www.googleapis.com/auth/drive.readonly openid email profile",
                ),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
    }

    fn parse_callback(&self, payload: serde_json::Value) -> Result<(AccessToken, DriveAccount)> {
        let callback: DriveCallback = decode(self.kind(), payload)?;
        let account = DriveAccount {
            user: callback.user,
            files: callback.files,
        };
        Ok((require_token(self.kind(), callback.access_token)?, account))
    }

    fn fetch_account(&self, token: &AccessToken) -> Result<DriveAccount> {
        let files_url = format!(
            "{}/drive/v3/files?pageSize={}&fields=files(id,name)",
            self.api_base, DRIVE_FILE_PAGE_SIZE
        );
        let userinfo_url = format!("{}/oauth2/v2/userinfo", self.api_base);

        let list: DriveFileList = self.api.get("Drive files", |client| {
            client.get(&files_url).bearer_auth(token.expose())
        })?;

        // Profile info is cosmetic; losing it must not fail the link
        let userinfo: Result<DriveUser> = self.api.get("Google user info", |client| {
            client.get(&userinfo_url).bearer_auth(token.expose())
        });
        let user = match userinfo {
            Ok(user) => user,
            Err(e @ ContribError::Unauthorized(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Google user info unavailable");
                DriveUser::default()
            }
        };

        Ok(DriveAccount {
            user,
            files: list.files,
        })
    }
}

// ========== Freelancer.com ==========

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreelancerCallback {
    access_token: AccessToken,
    user: FreelancerAccount,
}

#[derive(Deserialize)]
struct FreelancerEnvelope {
    status: String,
    #[serde(default)]
    result: Option<FreelancerAccount>,
    #[serde(default)]
    message: Option<String>,
}

pub struct FreelancerProvider {
    app: AppRegistration,
    api: ApiClient,
    api_base: String,
}

impl FreelancerProvider {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            app: AppRegistration {
                client_id: config.freelancer_client_id.clone(),
                callback_url: config.freelancer_callback_url.clone(),
            },
            api: ApiClient::new(ProviderKind::Freelancer, config)?,
            api_base: FREELANCER_API_URL.to_string(),
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

impl Provider for FreelancerProvider {
    type Account = FreelancerAccount;

    fn kind(&self) -> ProviderKind {
        ProviderKind::Freelancer
    }

    fn authorize_url(&self, state: &str) -> Result<String> {
        self.app.authorize_url(
            self.kind(),
            FREELANCER_AUTHORIZE_URL,
            state,
            &[("response_type", "code"), ("scope", "basic")],
        )
    }

    fn parse_callback(
        &self,
        payload: serde_json::Value,
    ) -> Result<(AccessToken, FreelancerAccount)> {
        let callback: FreelancerCallback = decode(self.kind(), payload)?;
        Ok((require_token(self.kind(), callback.access_token)?, callback.user))
    }

    fn fetch_account(&self, token: &AccessToken) -> Result<FreelancerAccount> {
        let url = format!("{}/users/0.1/self/", self.api_base);
        let envelope: FreelancerEnvelope = self.api.get("Freelancer profile", |client| {
            client
                .get(&url)
                .header("freelancer-oauth-v1", token.expose())
        })?;

        if envelope.status == "success" {
            if let Some(account) = envelope.result {
                return Ok(account);
            }
        }
        Err(ContribError::FetchFailed(format!(
            "Freelancer profile: status {}{}",
            envelope.status,
            envelope
                .message
                .map(|m| format!(" ({})", m))
                .unwrap_or_default()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn configured() -> Config {
        Config {
            github_client_id: Some("gh-client".into()),
            google_client_id: Some("google-client".into()),
            freelancer_client_id: Some("fl-client".into()),
            github_callback_url: Some("https://backend.example/github/callback".into()),
            drive_callback_url: Some("https://backend.example/drive/callback".into()),
            freelancer_callback_url: Some("https://backend.example/freelancer/callback".into()),
            request_timeout_secs: 2,
            retries: 0,
            ..Config::default()
        }
    }

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn param(url: &str, key: &str) -> Option<String> {
        query_pairs(url)
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    // ========== authorize_url tests ==========

    #[test]
    fn test_github_authorize_url() {
        let provider = GitHubProvider::from_config(&configured()).unwrap();
        let url = provider.authorize_url("nonce-1").unwrap();

        assert!(url.starts_with(GITHUB_AUTHORIZE_URL));
        assert_eq!(param(&url, "client_id").as_deref(), Some("gh-client"));
        assert_eq!(param(&url, "state").as_deref(), Some("nonce-1"));
        assert_eq!(
            param(&url, "redirect_uri").as_deref(),
            Some("https://backend.example/github/callback")
        );
        assert_eq!(param(&url, "scope").as_deref(), Some("read:user repo"));
    }

    #[test]
    fn test_drive_authorize_url_requests_offline_code() {
        let provider = DriveProvider::from_config(&configured()).unwrap();
        let url = provider.authorize_url("nonce-2").unwrap();

        assert!(url.starts_with(GOOGLE_AUTHORIZE_URL));
        assert_eq!(param(&url, "response_type").as_deref(), Some("code"));
        assert_eq!(param(&url, "access_type").as_deref(), Some("offline"));
        assert!(param(&url, "scope").unwrap().contains("drive.readonly"));
    }

    #[test]
    fn test_freelancer_authorize_url() {
        let provider = FreelancerProvider::from_config(&configured()).unwrap();
        let url = provider.authorize_url("nonce-3").unwrap();

        assert!(url.starts_with(FREELANCER_AUTHORIZE_URL));
        assert_eq!(param(&url, "client_id").as_deref(), Some("fl-client"));
        assert_eq!(param(&url, "scope").as_deref(), Some("basic"));
    }

    #[test]
    fn test_authorize_url_requires_registration() {
        let provider = DriveProvider::from_config(&Config::default()).unwrap();
        let err = provider.authorize_url("n").unwrap_err();
        assert!(matches!(err, ContribError::Config(ref m) if m.contains("google_client_id")));

        let config = Config {
            github_client_id: Some("id".into()),
            ..Config::default()
        };
        let provider = GitHubProvider::from_config(&config).unwrap();
        let err = provider.authorize_url("n").unwrap_err();
        assert!(matches!(err, ContribError::Config(ref m) if m.contains("github_callback_url")));
    }

    // ========== parse_callback tests ==========

    #[test]
    fn test_github_parse_callback() {
        let provider = GitHubProvider::from_config(&configured()).unwrap();
        let payload = json!({
            "accessToken": "gho_abc",
            "user": {"login": "octocat", "name": "The Octocat", "public_repos": 2},
            "repos": [
                {"name": "hello", "full_name": "octocat/hello",
                 "html_url": "https://github.com/octocat/hello", "stargazers_count": 3}
            ]
        });

        let (token, account) = provider.parse_callback(payload).unwrap();

        assert_eq!(token.expose(), "gho_abc");
        assert_eq!(account.login, "octocat");
        assert_eq!(account.repos.len(), 1);
        assert_eq!(account.repos[0].stargazers_count, 3);
    }

    #[test]
    fn test_drive_parse_callback_matches_backend_shape() {
        let provider = DriveProvider::from_config(&configured()).unwrap();
        let payload = json!({
            "accessToken": "ya29.xyz",
            "files": [{"id": "1", "name": "resume.pdf"}, {"id": "2", "name": "notes"}],
            "user": {"email": "dev@example.com", "name": null, "picture": null}
        });

        let (token, account) = provider.parse_callback(payload).unwrap();

        assert_eq!(token.expose(), "ya29.xyz");
        assert_eq!(account.files.len(), 2);
        assert_eq!(account.user.email.as_deref(), Some("dev@example.com"));
        assert_eq!(account.headline(), "dev@example.com (2 recent files)");
    }

    #[test]
    fn test_freelancer_parse_callback() {
        let provider = FreelancerProvider::from_config(&configured()).unwrap();
        let payload = json!({
            "accessToken": "fl-token",
            "user": {"id": 99, "username": "builder", "display_name": "Bob Builder"}
        });

        let (_, account) = provider.parse_callback(payload).unwrap();

        assert_eq!(account.id, 99);
        assert_eq!(account.headline(), "Bob Builder (@builder)");
    }

    #[test]
    fn test_parse_callback_rejects_missing_token() {
        let provider = FreelancerProvider::from_config(&configured()).unwrap();
        let payload = json!({"user": {"id": 1, "username": "x"}});
        assert!(matches!(
            provider.parse_callback(payload),
            Err(ContribError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_callback_rejects_empty_token() {
        let provider = GitHubProvider::from_config(&configured()).unwrap();
        let payload = json!({"accessToken": "", "user": {"login": "octocat"}});
        assert!(matches!(
            provider.parse_callback(payload),
            Err(ContribError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_callback_rejects_wrong_shape() {
        let provider = GitHubProvider::from_config(&configured()).unwrap();
        let payload = json!({"accessToken": "t", "user": "octocat"});
        assert!(provider.parse_callback(payload).is_err());
    }

    // ========== fetch_account tests ==========

    #[test]
    fn test_fetch_account_offline_is_fetch_failed() {
        let provider = GitHubProvider::from_config(&configured())
            .unwrap()
            .with_api_base("http://127.0.0.1:9");
        let err = provider
            .fetch_account(&AccessToken::new("gho_abc"))
            .unwrap_err();
        assert!(matches!(err, ContribError::FetchFailed(_)));
    }

    #[test]
    fn test_classify_unauthorized() {
        let api = ApiClient::new(ProviderKind::Freelancer, &configured()).unwrap();
        assert!(matches!(
            api.classify("x", HttpFailure::Status(401)),
            ContribError::Unauthorized(ProviderKind::Freelancer)
        ));
        assert!(matches!(
            api.classify("x", HttpFailure::Status(500)),
            ContribError::FetchFailed(_)
        ));
    }

    #[test]
    fn test_freelancer_envelope_decoding() {
        let envelope: FreelancerEnvelope = serde_json::from_value(json!({
            "status": "success",
            "result": {"id": 5, "username": "five", "email": "5@example.com"}
        }))
        .unwrap();
        assert_eq!(envelope.status, "success");
        assert_eq!(envelope.result.unwrap().username, "five");
    }
}
