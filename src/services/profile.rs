//! Profile settings sent to the settings backend
//!
//! Linked accounts are reduced to public summaries before they go into a
//! payload; access tokens never leave the secret store.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::http;
use crate::config::Config;
use crate::types::{
    ContribError, DriveAccount, FreelancerAccount, GitHubAccount, LinkedAccount, Result,
};

fn linkedin_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://(?:[a-z]{2,3}\.)?linkedin\.com/.+$").expect("valid regex")
    })
}

fn github_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://(?:www\.)?github\.com/[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?/?$")
            .expect("valid regex")
    })
}

/// Editable profile fields; `None` means "leave as is"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSettings {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub profile_picture_url: Option<String>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
}

impl ProfileSettings {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = self.linkedin_url.as_deref() {
            if !linkedin_url_re().is_match(url) {
                return Err(ContribError::InvalidInput(format!(
                    "{:?} is not a LinkedIn profile URL",
                    url
                )));
            }
        }
        if let Some(url) = self.github_url.as_deref() {
            if !github_url_re().is_match(url) {
                return Err(ContribError::InvalidInput(format!(
                    "{:?} is not a GitHub profile URL",
                    url
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubSummary {
    pub login: String,
    pub name: Option<String>,
    pub profile_url: Option<String>,
    pub public_repos: u32,
    pub repo_count: usize,
}

impl From<&GitHubAccount> for GitHubSummary {
    fn from(account: &GitHubAccount) -> Self {
        Self {
            login: account.login.clone(),
            name: account.name.clone(),
            profile_url: account.html_url.clone(),
            public_repos: account.public_repos,
            repo_count: account.repos.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveSummary {
    pub email: Option<String>,
    pub name: Option<String>,
    pub file_count: usize,
}

impl From<&DriveAccount> for DriveSummary {
    fn from(account: &DriveAccount) -> Self {
        Self {
            email: account.user.email.clone(),
            name: account.user.name.clone(),
            file_count: account.files.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreelancerSummary {
    pub id: u64,
    pub username: String,
    pub display_name: Option<String>,
}

impl From<&FreelancerAccount> for FreelancerSummary {
    fn from(account: &FreelancerAccount) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            display_name: account.display_name.clone(),
        }
    }
}

/// What to record about one integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkUpdate<T> {
    /// Not part of this update
    Unchanged,
    /// Sent as `null`; the backend removes the attribute
    Removed,
    Linked(T),
}

impl<T> Default for LinkUpdate<T> {
    fn default() -> Self {
        Self::Unchanged
    }
}

impl<T> LinkUpdate<T> {
    /// `Linked` when an account is present, `Removed` otherwise
    pub fn from_account<'a, A>(account: Option<&'a A>) -> Self
    where
        A: LinkedAccount,
        T: From<&'a A>,
    {
        match account {
            Some(account) => Self::Linked(T::from(account)),
            None => Self::Removed,
        }
    }

    fn into_field(self) -> Option<Option<T>> {
        match self {
            Self::Unchanged => None,
            Self::Removed => Some(None),
            Self::Linked(summary) => Some(Some(summary)),
        }
    }
}

/// Public integration data to store with the profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationSummary {
    pub github: LinkUpdate<GitHubSummary>,
    pub drive: LinkUpdate<DriveSummary>,
    pub freelancer: LinkUpdate<FreelancerSummary>,
}

/// `updateSettings` request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    action: &'static str,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    linkedin_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    github_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_picture_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    push_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    github_data: Option<Option<GitHubSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    drive_data: Option<Option<DriveSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    freelancer_data: Option<Option<FreelancerSummary>>,
}

impl SettingsUpdate {
    /// Validate and assemble an update; fails when nothing would change
    pub fn new(
        user_id: &str,
        settings: ProfileSettings,
        integrations: IntegrationSummary,
    ) -> Result<Self> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ContribError::InvalidInput("userId is required".into()));
        }
        settings.validate()?;
        if settings.is_empty() && integrations == IntegrationSummary::default() {
            return Err(ContribError::InvalidInput("no fields to update".into()));
        }

        Ok(Self {
            action: "updateSettings",
            user_id: user_id.to_string(),
            full_name: settings.full_name,
            phone_number: settings.phone_number,
            linkedin_url: settings.linkedin_url,
            github_url: settings.github_url,
            profile_picture_url: settings.profile_picture_url,
            email_notifications: settings.email_notifications,
            push_notifications: settings.push_notifications,
            github_data: integrations.github.into_field(),
            drive_data: integrations.drive.into_field(),
            freelancer_data: integrations.freelancer.into_field(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ContribError::Parse(format!("encoding settings update: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct BackendReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the settings backend
pub struct SettingsClient {
    client: Client,
    backend_url: String,
}

impl SettingsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let backend_url = config
            .backend_url
            .clone()
            .ok_or_else(|| ContribError::Config("backend_url is not set".into()))?;
        Ok(Self {
            client: http::build_client(config.request_timeout())?,
            backend_url,
        })
    }

    /// POST the update; a `{"success": false}` reply is an error
    pub fn update(&self, update: &SettingsUpdate) -> Result<String> {
        tracing::debug!(user_id = update.user_id(), "sending settings update");
        let response = self
            .client
            .post(&self.backend_url)
            .json(update)
            .send()
            .map_err(|e| ContribError::FetchFailed(format!("settings update: {}", e)))?;

        let status = response.status();
        let reply: Option<BackendReply> = response.json().ok();
        interpret_reply(status.as_u16(), reply)
    }
}

fn interpret_reply(status: u16, reply: Option<BackendReply>) -> Result<String> {
    match reply {
        Some(BackendReply {
            success: true,
            message,
        }) if (200..300).contains(&status) => {
            Ok(message.unwrap_or_else(|| "Settings updated".to_string()))
        }
        Some(BackendReply {
            message: Some(message),
            ..
        }) => Err(ContribError::FetchFailed(format!(
            "settings update rejected ({}): {}",
            status, message
        ))),
        _ => Err(ContribError::FetchFailed(format!(
            "settings update failed: HTTP status {}",
            status
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DriveFile, DriveUser};

    fn github_account() -> GitHubAccount {
        GitHubAccount {
            login: "octocat".into(),
            name: Some("The Octocat".into()),
            avatar_url: None,
            html_url: Some("https://github.com/octocat".into()),
            public_repos: 8,
            repos: Vec::new(),
        }
    }

    fn to_value(update: &SettingsUpdate) -> serde_json::Value {
        serde_json::to_value(update).unwrap()
    }

    // ========== validation tests ==========

    #[test]
    fn test_requires_user_id() {
        let settings = ProfileSettings {
            full_name: Some("Ada".into()),
            ..Default::default()
        };
        let err =
            SettingsUpdate::new("  ", settings, IntegrationSummary::default()).unwrap_err();
        assert!(matches!(err, ContribError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_empty_update() {
        let err = SettingsUpdate::new(
            "user-1",
            ProfileSettings::default(),
            IntegrationSummary::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no fields"));
    }

    #[test]
    fn test_profile_url_validation() {
        let ok = ProfileSettings {
            linkedin_url: Some("https://www.linkedin.com/in/ada".into()),
            github_url: Some("https://github.com/ada-l".into()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_linkedin = ProfileSettings {
            linkedin_url: Some("https://example.com/in/ada".into()),
            ..Default::default()
        };
        assert!(bad_linkedin.validate().is_err());

        let bad_github = ProfileSettings {
            github_url: Some("https://github.com/ada/repo".into()),
            ..Default::default()
        };
        assert!(bad_github.validate().is_err());
    }

    // ========== payload tests ==========

    #[test]
    fn test_payload_only_carries_set_fields() {
        let settings = ProfileSettings {
            full_name: Some("Ada Lovelace".into()),
            email_notifications: Some(false),
            ..Default::default()
        };
        let update =
            SettingsUpdate::new("user-1", settings, IntegrationSummary::default()).unwrap();

        let json = to_value(&update);
        let object = json.as_object().unwrap();

        assert_eq!(json["action"], "updateSettings");
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["fullName"], "Ada Lovelace");
        assert_eq!(json["emailNotifications"], false);
        assert!(!object.contains_key("phoneNumber"));
        assert!(!object.contains_key("githubData"));
        assert_eq!(object.len(), 4);
    }

    #[test]
    fn test_disconnected_integration_is_null() {
        let integrations = IntegrationSummary {
            github: LinkUpdate::from_account(Some(&github_account())),
            drive: LinkUpdate::from_account::<DriveAccount>(None),
            ..Default::default()
        };
        let update =
            SettingsUpdate::new("user-1", ProfileSettings::default(), integrations).unwrap();

        let json = to_value(&update);

        assert_eq!(json["githubData"]["login"], "octocat");
        assert_eq!(json["githubData"]["publicRepos"], 8);
        assert!(json["driveData"].is_null());
        assert!(json.as_object().unwrap().contains_key("driveData"));
        assert!(!json.as_object().unwrap().contains_key("freelancerData"));
    }

    #[test]
    fn test_payload_never_contains_token() {
        let drive = DriveAccount {
            user: DriveUser {
                email: Some("dev@example.com".into()),
                name: None,
                picture: None,
            },
            files: vec![DriveFile {
                id: "1".into(),
                name: "cv.pdf".into(),
            }],
        };
        let integrations = IntegrationSummary {
            github: LinkUpdate::from_account(Some(&github_account())),
            drive: LinkUpdate::from_account(Some(&drive)),
            freelancer: LinkUpdate::from_account(Some(&FreelancerAccount {
                id: 3,
                username: "builder".into(),
                display_name: None,
                email: None,
                avatar_url: None,
            })),
        };
        let update =
            SettingsUpdate::new("user-1", ProfileSettings::default(), integrations).unwrap();

        let text = update.to_json().unwrap();

        assert!(!text.contains("accessToken"));
        assert!(!text.to_lowercase().contains("token"));
        assert!(text.contains("dev@example.com"));
        assert!(text.contains("\"fileCount\": 1"));
    }

    // ========== backend reply tests ==========

    #[test]
    fn test_interpret_reply() {
        let ok = interpret_reply(
            200,
            Some(BackendReply {
                success: true,
                message: Some("Settings updated successfully".into()),
            }),
        )
        .unwrap();
        assert_eq!(ok, "Settings updated successfully");

        let rejected = interpret_reply(
            404,
            Some(BackendReply {
                success: false,
                message: Some("User not found".into()),
            }),
        )
        .unwrap_err();
        assert!(rejected.to_string().contains("User not found"));

        let opaque = interpret_reply(502, None).unwrap_err();
        assert!(matches!(opaque, ContribError::FetchFailed(_)));
    }

    #[test]
    fn test_client_requires_backend_url() {
        assert!(matches!(
            SettingsClient::new(&Config::default()),
            Err(ContribError::Config(_))
        ));
    }
}
