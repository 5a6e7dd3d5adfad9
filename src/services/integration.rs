//! Connection lifecycle shared by every linked provider
//!
//! `Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected`.
//! An operation requested from the wrong state fails with
//! `ContribError::Integration` and leaves the state untouched.

use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::providers::Provider;
use super::secrets::SecretStore;
use crate::types::{ContribError, LinkedAccount, ProviderKind, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationState<A> {
    Disconnected,
    /// Waiting for the redirect carrying `nonce`
    Connecting { nonce: String },
    Connected { account: A },
    Disconnecting,
}

impl<A> IntegrationState<A> {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Disconnected => Phase::Disconnected,
            Self::Connecting { .. } => Phase::Connecting,
            Self::Connected { .. } => Phase::Connected,
            Self::Disconnecting => Phase::Disconnecting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(label)
    }
}

/// Display summary of one integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub kind: ProviderKind,
    pub phase: Phase,
    /// Account headline when connected
    pub detail: Option<String>,
}

/// `state` parameter sent with the authorize request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectState {
    nonce: String,
    return_url: String,
}

/// Decoded redirect from the settings backend
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Success {
        state: Option<String>,
        /// The provider object inside `<slug>_data`
        payload: serde_json::Value,
    },
    Failure {
        code: String,
        message: String,
    },
}

/// Decode a callback URL (or bare query string) for `kind`.
///
/// Success: `?<slug>_data=<json>` where the JSON is
/// `{"success": true, "<slug>": {...}}`. Failure: `?error=<code>&message=<text>`.
pub fn parse_callback_url(kind: ProviderKind, callback: &str) -> Result<CallbackOutcome> {
    let callback = callback.trim();
    let url = Url::parse(callback)
        .or_else(|_| {
            Url::parse(&format!(
                "http://localhost/?{}",
                callback.trim_start_matches('?')
            ))
        })
        .map_err(|e| ContribError::InvalidInput(format!("callback URL: {}", e)))?;

    let mut data = None;
    let mut state = None;
    let mut error = None;
    let mut message = None;
    let data_key = format!("{}_data", kind.slug());

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            k if k == data_key => data = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "message" => message = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(code) = error {
        return Ok(CallbackOutcome::Failure {
            message: message.unwrap_or_else(|| code.clone()),
            code,
        });
    }

    let data = data.ok_or_else(|| {
        ContribError::InvalidInput(format!("callback has no {} parameter", data_key))
    })?;
    let mut envelope: serde_json::Value = serde_json::from_str(&data)
        .map_err(|e| ContribError::Parse(format!("{}: {}", data_key, e)))?;

    if envelope.get("success").and_then(|v| v.as_bool()) != Some(true) {
        let message = envelope
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("backend reported failure")
            .to_string();
        return Ok(CallbackOutcome::Failure {
            code: "unsuccessful".into(),
            message,
        });
    }

    let payload = envelope
        .get_mut(kind.slug())
        .map(serde_json::Value::take)
        .filter(|v| v.is_object())
        .ok_or_else(|| {
            ContribError::Parse(format!("{} has no {} object", data_key, kind.slug()))
        })?;

    Ok(CallbackOutcome::Success { state, payload })
}

fn state_matches(returned: &str, nonce: &str) -> bool {
    if returned == nonce {
        return true;
    }
    serde_json::from_str::<ConnectState>(returned)
        .map(|state| state.nonce == nonce)
        .unwrap_or(false)
}

fn validate_return_url(return_url: &str) -> Result<()> {
    match Url::parse(return_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(ContribError::InvalidInput(format!(
            "return URL must be http(s), got {}",
            url.scheme()
        ))),
        Err(e) => Err(ContribError::InvalidInput(format!("return URL: {}", e))),
    }
}

/// One provider link: state machine, token storage and account data
pub struct OAuthIntegration<P: Provider> {
    provider: P,
    secrets: Arc<dyn SecretStore>,
    state: IntegrationState<P::Account>,
}

impl<P: Provider> OAuthIntegration<P> {
    pub fn new(provider: P, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            provider,
            secrets,
            state: IntegrationState::Disconnected,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn state(&self) -> &IntegrationState<P::Account> {
        &self.state
    }

    pub fn account(&self) -> Option<&P::Account> {
        match &self.state {
            IntegrationState::Connected { account } => Some(account),
            _ => None,
        }
    }

    pub fn status(&self) -> ProviderStatus {
        ProviderStatus {
            kind: self.kind(),
            phase: self.state.phase(),
            detail: self.account().map(|account| account.headline()),
        }
    }

    fn invalid(&self, action: &str) -> ContribError {
        ContribError::Integration(format!(
            "cannot {} while {} is {}",
            action,
            self.kind(),
            self.state.phase()
        ))
    }

    /// Reconnect from a stored token.
    ///
    /// A rejected token is cleared and the integration stays disconnected.
    /// Any other failure keeps the token for a later attempt.
    pub fn restore(&mut self) -> Result<()> {
        if !matches!(self.state, IntegrationState::Disconnected) {
            return Err(self.invalid("restore"));
        }
        let Some(token) = self.secrets.load(self.kind())? else {
            return Ok(());
        };

        match self.provider.fetch_account(&token) {
            Ok(account) => {
                tracing::debug!(provider = %self.kind(), "restored connection");
                self.state = IntegrationState::Connected { account };
                Ok(())
            }
            Err(ContribError::Unauthorized(kind)) => {
                tracing::warn!(provider = %kind, "stored token rejected, clearing");
                self.secrets.clear(kind)?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Start linking; returns the URL to open in a browser
    pub fn begin_connect(&mut self, return_url: &str) -> Result<String> {
        if !matches!(self.state, IntegrationState::Disconnected) {
            return Err(self.invalid("connect"));
        }
        validate_return_url(return_url)?;

        let nonce = Uuid::new_v4().to_string();
        let state = serde_json::to_string(&ConnectState {
            nonce: nonce.clone(),
            return_url: return_url.to_string(),
        })
        .map_err(|e| ContribError::Integration(format!("encoding state: {}", e)))?;
        let url = self.provider.authorize_url(&state)?;

        tracing::info!(provider = %self.kind(), "connection started");
        self.state = IntegrationState::Connecting { nonce };
        Ok(url)
    }

    /// Finish linking from the backend's redirect URL
    pub fn complete_connect(&mut self, callback: &str) -> Result<()> {
        let nonce = match &self.state {
            IntegrationState::Connecting { nonce } => nonce.clone(),
            _ => return Err(self.invalid("complete a connection")),
        };

        match self.accept_callback(&nonce, callback) {
            Ok(account) => {
                tracing::info!(provider = %self.kind(), account = %account.headline(), "connected");
                self.state = IntegrationState::Connected { account };
                Ok(())
            }
            Err(e) => {
                tracing::warn!(provider = %self.kind(), error = %e, "connection failed");
                self.state = IntegrationState::Disconnected;
                Err(e)
            }
        }
    }

    fn accept_callback(&self, nonce: &str, callback: &str) -> Result<P::Account> {
        let kind = self.kind();
        let (state, payload) = match parse_callback_url(kind, callback)? {
            CallbackOutcome::Success { state, payload } => (state, payload),
            CallbackOutcome::Failure { code, message } => {
                return Err(ContribError::Integration(format!(
                    "{} connection failed: {} ({})",
                    kind, message, code
                )));
            }
        };

        if let Some(returned) = state {
            if !state_matches(&returned, nonce) {
                return Err(ContribError::Integration(format!(
                    "{} callback state does not match this connection attempt",
                    kind
                )));
            }
        }

        let (token, account) = self.provider.parse_callback(payload)?;
        self.secrets.store(kind, &token)?;
        Ok(account)
    }

    pub fn cancel_connect(&mut self) -> Result<()> {
        if !matches!(self.state, IntegrationState::Connecting { .. }) {
            return Err(self.invalid("cancel"));
        }
        tracing::debug!(provider = %self.kind(), "connection cancelled");
        self.state = IntegrationState::Disconnected;
        Ok(())
    }

    /// Re-fetch account data with the stored token
    pub fn refresh(&mut self) -> Result<()> {
        if !matches!(self.state, IntegrationState::Connected { .. }) {
            return Err(self.invalid("refresh"));
        }
        let kind = self.kind();
        let Some(token) = self.secrets.load(kind)? else {
            self.state = IntegrationState::Disconnected;
            return Err(ContribError::Integration(format!(
                "{} token is missing from the secret store",
                kind
            )));
        };

        match self.provider.fetch_account(&token) {
            Ok(account) => {
                self.state = IntegrationState::Connected { account };
                Ok(())
            }
            Err(ContribError::Unauthorized(kind)) => {
                tracing::warn!(provider = %kind, "token expired or revoked");
                self.secrets.clear(kind)?;
                self.state = IntegrationState::Disconnected;
                Err(ContribError::Unauthorized(kind))
            }
            Err(e) => Err(e),
        }
    }

    pub fn disconnect(&mut self) -> Result<()> {
        if !matches!(self.state, IntegrationState::Connected { .. }) {
            return Err(self.invalid("disconnect"));
        }
        let previous = std::mem::replace(&mut self.state, IntegrationState::Disconnecting);

        if let Err(e) = self.secrets.clear(self.kind()) {
            self.state = previous;
            return Err(e);
        }
        tracing::info!(provider = %self.kind(), "disconnected");
        self.state = IntegrationState::Disconnected;
        Ok(())
    }

    /// Drop a stored token that could not be restored
    pub fn forget(&mut self) -> Result<()> {
        if !matches!(self.state, IntegrationState::Disconnected) {
            return Err(self.invalid("forget the stored token"));
        }
        self.secrets.clear(self.kind())
    }

    pub fn has_stored_token(&self) -> Result<bool> {
        Ok(self.secrets.load(self.kind())?.is_some())
    }
}
