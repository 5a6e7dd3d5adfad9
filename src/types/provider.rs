use std::fmt;

use serde::{Deserialize, Serialize};

/// Third-party services an account can be linked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "drive")]
    GoogleDrive,
    #[serde(rename = "freelancer")]
    Freelancer,
}

impl ProviderKind {
    pub fn all() -> [Self; 3] {
        [Self::GitHub, Self::GoogleDrive, Self::Freelancer]
    }

    /// Short identifier used in callback parameters and on-disk keys
    pub fn slug(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GoogleDrive => "drive",
            Self::Freelancer => "freelancer",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::all().into_iter().find(|k| k.slug() == slug)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GitHub => "GitHub",
            Self::GoogleDrive => "Google Drive",
            Self::Freelancer => "Freelancer",
        };
        f.write_str(name)
    }
}

/// OAuth access token.
///
/// Not `Serialize`: a token can only reach disk through a `SecretStore`,
/// so it can never end up inside a profile payload.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Account data shown once a provider is linked
pub trait LinkedAccount: Clone + fmt::Debug + Send + 'static {
    /// One-line description, e.g. "octocat (8 repositories)"
    fn headline(&self) -> String;
}

/// GitHub user plus the repositories fetched after linking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubAccount {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub repos: Vec<GitHubRepo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub private: bool,
}

impl LinkedAccount for GitHubAccount {
    fn headline(&self) -> String {
        let n = self.repos.len();
        format!(
            "{} ({} repositor{})",
            self.login,
            n,
            if n == 1 { "y" } else { "ies" }
        )
    }
}

/// Google Drive user plus a short listing of recent files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveAccount {
    #[serde(default)]
    pub user: DriveUser,
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveUser {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
}

impl LinkedAccount for DriveAccount {
    fn headline(&self) -> String {
        let who = self
            .user
            .email
            .as_deref()
            .or(self.user.name.as_deref())
            .unwrap_or("unknown user");
        format!("{} ({} recent files)", who, self.files.len())
    }
}

/// Freelancer.com user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreelancerAccount {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "avatar_cdn")]
    pub avatar_url: Option<String>,
}

impl LinkedAccount for FreelancerAccount {
    fn headline(&self) -> String {
        match &self.display_name {
            Some(name) if !name.is_empty() => format!("{} (@{})", name, self.username),
            _ => format!("@{}", self.username),
        }
    }
}
