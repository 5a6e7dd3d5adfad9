//! The three provider links behind one handle

use std::sync::Arc;

use super::integration::{OAuthIntegration, ProviderStatus};
use super::profile::{IntegrationSummary, LinkUpdate};
use super::providers::{DriveProvider, FreelancerProvider, GitHubProvider, Provider};
use super::secrets::SecretStore;
use crate::config::Config;
use crate::types::{ContribError, ProviderKind, Result};

/// Object-safe view of an [`OAuthIntegration`], for picking a provider at runtime
pub trait Connection {
    fn kind(&self) -> ProviderKind;
    fn status(&self) -> ProviderStatus;
    fn restore(&mut self) -> Result<()>;
    fn begin_connect(&mut self, return_url: &str) -> Result<String>;
    fn complete_connect(&mut self, callback: &str) -> Result<()>;
    fn cancel_connect(&mut self) -> Result<()>;
    fn refresh(&mut self) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
    fn forget(&mut self) -> Result<()>;
    fn has_stored_token(&self) -> Result<bool>;
}

impl<P: Provider> Connection for OAuthIntegration<P> {
    fn kind(&self) -> ProviderKind {
        OAuthIntegration::kind(self)
    }

    fn status(&self) -> ProviderStatus {
        OAuthIntegration::status(self)
    }

    fn restore(&mut self) -> Result<()> {
        OAuthIntegration::restore(self)
    }

    fn begin_connect(&mut self, return_url: &str) -> Result<String> {
        OAuthIntegration::begin_connect(self, return_url)
    }

    fn complete_connect(&mut self, callback: &str) -> Result<()> {
        OAuthIntegration::complete_connect(self, callback)
    }

    fn cancel_connect(&mut self) -> Result<()> {
        OAuthIntegration::cancel_connect(self)
    }

    fn refresh(&mut self) -> Result<()> {
        OAuthIntegration::refresh(self)
    }

    fn disconnect(&mut self) -> Result<()> {
        OAuthIntegration::disconnect(self)
    }

    fn forget(&mut self) -> Result<()> {
        OAuthIntegration::forget(self)
    }

    fn has_stored_token(&self) -> Result<bool> {
        OAuthIntegration::has_stored_token(self)
    }
}

/// GitHub, Google Drive and Freelancer links sharing one secret store
pub struct LinkedAccounts {
    pub github: OAuthIntegration<GitHubProvider>,
    pub drive: OAuthIntegration<DriveProvider>,
    pub freelancer: OAuthIntegration<FreelancerProvider>,
    /// Providers whose stored token could not be checked
    unverified: Vec<ProviderKind>,
}

impl LinkedAccounts {
    pub fn new(config: &Config, secrets: Arc<dyn SecretStore>) -> Result<Self> {
        Ok(Self::with_integrations(
            OAuthIntegration::new(GitHubProvider::from_config(config)?, secrets.clone()),
            OAuthIntegration::new(DriveProvider::from_config(config)?, secrets.clone()),
            OAuthIntegration::new(FreelancerProvider::from_config(config)?, secrets),
        ))
    }

    pub fn with_integrations(
        github: OAuthIntegration<GitHubProvider>,
        drive: OAuthIntegration<DriveProvider>,
        freelancer: OAuthIntegration<FreelancerProvider>,
    ) -> Self {
        Self {
            github,
            drive,
            freelancer,
            unverified: Vec::new(),
        }
    }

    pub fn get(&self, kind: ProviderKind) -> &dyn Connection {
        match kind {
            ProviderKind::GitHub => &self.github,
            ProviderKind::GoogleDrive => &self.drive,
            ProviderKind::Freelancer => &self.freelancer,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut dyn Connection {
        match kind {
            ProviderKind::GitHub => &mut self.github,
            ProviderKind::GoogleDrive => &mut self.drive,
            ProviderKind::Freelancer => &mut self.freelancer,
        }
    }

    /// Restore every link from stored tokens; failures are returned, not fatal
    pub fn restore_all(&mut self) -> Vec<(ProviderKind, ContribError)> {
        let mut failures = Vec::new();
        self.unverified.clear();
        for kind in ProviderKind::all() {
            if let Err(e) = self.get_mut(kind).restore() {
                tracing::warn!(provider = %kind, error = %e, "could not restore link");
                self.unverified.push(kind);
                failures.push((kind, e));
            }
        }
        failures
    }

    pub fn statuses(&self) -> Vec<ProviderStatus> {
        ProviderKind::all()
            .into_iter()
            .map(|kind| self.get(kind).status())
            .collect()
    }

    /// Integration data for a profile update.
    ///
    /// Links that could not be verified are left out rather than sent as
    /// removed, so a network failure never erases stored profile data.
    pub fn summary(&self) -> IntegrationSummary {
        IntegrationSummary {
            github: self.verified(
                ProviderKind::GitHub,
                LinkUpdate::from_account(self.github.account()),
            ),
            drive: self.verified(
                ProviderKind::GoogleDrive,
                LinkUpdate::from_account(self.drive.account()),
            ),
            freelancer: self.verified(
                ProviderKind::Freelancer,
                LinkUpdate::from_account(self.freelancer.account()),
            ),
        }
    }

    fn verified<T>(&self, kind: ProviderKind, update: LinkUpdate<T>) -> LinkUpdate<T> {
        if self.unverified.contains(&kind) {
            LinkUpdate::Unchanged
        } else {
            update
        }
    }
}
