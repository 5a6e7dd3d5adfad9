//! Services: heatmap layout, API clients and account links

pub mod accounts;
pub mod contributions;
pub mod grid;
pub mod http;
pub mod integration;
pub mod profile;
pub mod providers;
pub mod secrets;

pub use accounts::{Connection, LinkedAccounts};
pub use contributions::{normalize_username, ContributionsService, DataSource, FetchedContributions};
pub use grid::{
    build_grid, color_for_level, contribution_label, month_labels, no_data_label, DaySlot,
    HeatmapLayout,
    MonthLabelPosition, WeekGrid, YearSpan,
};
pub use integration::{OAuthIntegration, Phase, ProviderStatus};
pub use profile::{IntegrationSummary, LinkUpdate, ProfileSettings, SettingsClient, SettingsUpdate};
pub use providers::{DriveProvider, FreelancerProvider, GitHubProvider, Provider};
pub use secrets::{FileSecretStore, MemorySecretStore, SecretStore};
