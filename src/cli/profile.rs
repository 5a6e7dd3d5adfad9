//! `contribgrid profile` subcommand for sending settings updates

use clap::Args;

use crate::config::Config;
use crate::services::{
    FileSecretStore, IntegrationSummary, LinkedAccounts, ProfileSettings, SettingsClient,
    SettingsUpdate,
};
use crate::types::Result;

/// Update profile settings
#[derive(Args, Debug)]
pub struct ProfileArgs {
    /// Account whose settings are updated
    #[arg(long)]
    pub user_id: String,

    #[arg(long)]
    pub full_name: Option<String>,

    #[arg(long = "phone")]
    pub phone_number: Option<String>,

    /// LinkedIn profile URL
    #[arg(long = "linkedin")]
    pub linkedin_url: Option<String>,

    /// GitHub profile URL
    #[arg(long = "github")]
    pub github_url: Option<String>,

    /// Already-uploaded profile picture URL
    #[arg(long = "picture")]
    pub profile_picture_url: Option<String>,

    #[arg(long, value_name = "BOOL")]
    pub email_notifications: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub push_notifications: Option<bool>,

    /// Include linked account summaries
    #[arg(long)]
    pub with_accounts: bool,

    /// Print the payload instead of sending it
    #[arg(long)]
    pub dry_run: bool,
}

impl ProfileArgs {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let integrations = if self.with_accounts {
            linked_summary(config)?
        } else {
            IntegrationSummary::default()
        };
        let update = self.into_update(integrations)?;

        if self.dry_run {
            println!("{}", update.to_json()?);
            return Ok(());
        }

        let client = SettingsClient::new(config)?;
        let message = client.update(&update)?;
        println!("{}", message);
        Ok(())
    }

    fn settings(&self) -> ProfileSettings {
        ProfileSettings {
            full_name: self.full_name.clone(),
            phone_number: self.phone_number.clone(),
            linkedin_url: self.linkedin_url.clone(),
            github_url: self.github_url.clone(),
            profile_picture_url: self.profile_picture_url.clone(),
            email_notifications: self.email_notifications,
            push_notifications: self.push_notifications,
        }
    }

    fn into_update(&self, integrations: IntegrationSummary) -> Result<SettingsUpdate> {
        SettingsUpdate::new(&self.user_id, self.settings(), integrations)
    }
}

/// Current link summaries; unverifiable links are left untouched
fn linked_summary(config: &Config) -> Result<IntegrationSummary> {
    let mut accounts = LinkedAccounts::new(config, std::sync::Arc::new(FileSecretStore::new()?))?;
    for (kind, e) in accounts.restore_all() {
        eprintln!("[contribgrid] Warning: {} not verified, left unchanged: {}", kind, e);
    }
    Ok(accounts.summary())
}
