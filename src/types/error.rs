use thiserror::Error;

use super::ProviderKind;

/// contribgrid error types
#[derive(Error, Debug)]
pub enum ContribError {
    /// Network or API failure while fetching remote data
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// Failed to parse JSON or a callback payload
    #[error("parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache operation failed
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Secret store operation failed
    #[error("secret store error: {0}")]
    Secret(String),

    /// Invalid integration state transition or failed link flow
    #[error("integration error: {0}")]
    Integration(String),

    /// Provider rejected the stored token (expired or revoked)
    #[error("{0} access expired or was revoked")]
    Unauthorized(ProviderKind),

    /// User-supplied value rejected before any request was made
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for contribgrid
pub type Result<T> = std::result::Result<T, ContribError>;
