//! Blocking HTTP helpers shared by the API clients

use std::fmt;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::types::{ContribError, Result};

const USER_AGENT: &str = concat!("contribgrid/", env!("CARGO_PKG_VERSION"));

/// Pause between a transient failure and the next attempt
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Why a single HTTP exchange failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// Connection error or timeout
    Network(String),
    /// Non-2xx status code
    Status(u16),
    /// Body was not the expected JSON
    Decode(String),
}

impl HttpFailure {
    /// Worth another attempt: network errors, rate limiting, server errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status(code) => *code == 429 || (500..=599).contains(code),
            Self::Decode(_) => false,
        }
    }

    /// Token expired or access revoked
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status(401) | Self::Status(403))
    }

    /// Collapse into the crate's single fetch failure kind
    pub fn into_fetch_error(self, what: &str) -> ContribError {
        ContribError::FetchFailed(format!("{}: {}", what, self))
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "HTTP request failed: {}", msg),
            Self::Status(code) => write!(f, "HTTP status {}", code),
            Self::Decode(msg) => write!(f, "JSON parse error: {}", msg),
        }
    }
}

/// Blocking client with the configured timeout
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ContribError::FetchFailed(format!("HTTP client error: {}", e)))
}

/// Send a request and decode a 2xx JSON body
pub fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> std::result::Result<T, HttpFailure> {
    let response = request.send().map_err(|e| {
        if e.is_timeout() {
            HttpFailure::Network("request timed out".into())
        } else {
            HttpFailure::Network(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(HttpFailure::Status(status.as_u16()));
    }

    response
        .json::<T>()
        .map_err(|e| HttpFailure::Decode(e.to_string()))
}

/// Run `op` until it succeeds, fails permanently, or `retries` extra attempts
/// are used up. `op` receives the zero-based attempt number.
pub fn with_retry<T>(
    retries: u32,
    backoff: Duration,
    mut op: impl FnMut(u32) -> std::result::Result<T, HttpFailure>,
) -> std::result::Result<T, HttpFailure> {
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(failure) if failure.is_transient() && attempt < retries => {
                tracing::warn!(attempt, error = %failure, "transient HTTP failure, retrying");
                if !backoff.is_zero() {
                    thread::sleep(backoff);
                }
                attempt += 1;
            }
            Err(failure) => return Err(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(HttpFailure::Network("reset".into()).is_transient());
        assert!(HttpFailure::Status(500).is_transient());
        assert!(HttpFailure::Status(503).is_transient());
        assert!(HttpFailure::Status(429).is_transient());
        assert!(!HttpFailure::Status(404).is_transient());
        assert!(!HttpFailure::Status(401).is_transient());
        assert!(!HttpFailure::Decode("eof".into()).is_transient());
    }

    #[test]
    fn test_unauthorized_classification() {
        assert!(HttpFailure::Status(401).is_unauthorized());
        assert!(HttpFailure::Status(403).is_unauthorized());
        assert!(!HttpFailure::Status(404).is_unauthorized());
        assert!(!HttpFailure::Network("x".into()).is_unauthorized());
    }

    #[test]
    fn test_retry_succeeds_after_transient_failure() {
        let mut calls = 0;
        let result = with_retry(1, Duration::ZERO, |_| {
            calls += 1;
            if calls == 1 {
                Err(HttpFailure::Status(502))
            } else {
                Ok("ok")
            }
        });
        assert_eq!(result, Ok("ok"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_retry_gives_up_after_budget() {
        let mut attempts = Vec::new();
        let result: std::result::Result<(), _> = with_retry(1, Duration::ZERO, |attempt| {
            attempts.push(attempt);
            Err(HttpFailure::Network("down".into()))
        });
        assert_eq!(result, Err(HttpFailure::Network("down".into())));
        assert_eq!(attempts, vec![0, 1]);
    }

    #[test]
    fn test_no_retry_on_permanent_failure() {
        let mut calls = 0;
        let result: std::result::Result<(), _> = with_retry(3, Duration::ZERO, |_| {
            calls += 1;
            Err(HttpFailure::Status(404))
        });
        assert_eq!(result, Err(HttpFailure::Status(404)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let mut calls = 0;
        let _: std::result::Result<(), _> = with_retry(0, Duration::ZERO, |_| {
            calls += 1;
            Err(HttpFailure::Status(500))
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_into_fetch_error() {
        let err = HttpFailure::Status(404).into_fetch_error("contributions for ghost");
        assert!(matches!(err, ContribError::FetchFailed(_)));
        assert_eq!(
            err.to_string(),
            "fetch failed: contributions for ghost: HTTP status 404"
        );
    }
}
