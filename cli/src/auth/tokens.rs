//! Token and flow types for authentication.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::PatError;

/// Supported interactive authentication flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// OAuth device authorization grant (RFC 8628).
    #[serde(rename = "device_flow")]
    DeviceCode,
    /// Authorization code with PKCE through the system browser.
    #[default]
    Interactive,
    /// Resource owner password credentials. Legacy, kept for headless hosts.
    UsernamePassword,
}

impl FlowKind {
    /// All flows, in the order they are listed to users.
    pub const ALL: [Self; 3] = [Self::DeviceCode, Self::Interactive, Self::UsernamePassword];

    /// Wire name of the flow as accepted on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeviceCode => "device_flow",
            Self::Interactive => "interactive",
            Self::UsernamePassword => "username_password",
        }
    }

    /// Comma-separated list of supported flow names.
    #[must_use]
    pub fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(|flow| flow.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowKind {
    type Err = PatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flow| flow.as_str() == s)
            .ok_or_else(|| PatError::UnsupportedFlow {
                name: s.to_string(),
                supported: Self::supported_names(),
            })
    }
}

/// Structured failure returned by the identity provider.
///
/// Fields mirror the provider's error body so the values can be quoted
/// verbatim in support requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    /// OAuth error code, e.g. `invalid_grant`.
    pub error: Option<String>,
    /// Human-readable description from the provider.
    pub error_description: Option<String>,
    /// Correlation identifier for provider-side diagnostics.
    pub correlation_id: Option<String>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Identity provider returned {}",
            self.error.as_deref().unwrap_or("an error")
        )?;
        if let Some(description) = &self.error_description {
            write!(f, ": {description}")?;
        }
        if let Some(correlation_id) = &self.correlation_id {
            write!(f, " (correlation id: {correlation_id})")?;
        }
        Ok(())
    }
}

/// Claims read from an OIDC id token.
///
/// The signature is not verified: the token came straight from the token
/// endpoint over TLS and is used only to label the cached account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Object id of the user in the tenant.
    pub oid: Option<String>,
    /// Tenant id.
    pub tid: Option<String>,
    /// Subject, used when `oid` is absent.
    pub sub: Option<String>,
    /// Sign-in name.
    pub preferred_username: Option<String>,
    /// Display name.
    pub name: Option<String>,
}

impl IdTokenClaims {
    /// Decode the payload segment of a compact JWT.
    #[must_use]
    pub fn decode(id_token: &str) -> Option<Self> {
        let payload = id_token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Stable account identifier: `<oid>.<tid>`, falling back to `sub`.
    #[must_use]
    pub fn home_account_id(&self) -> Option<String> {
        match (&self.oid, &self.tid) {
            (Some(oid), Some(tid)) => Some(format!("{oid}.{tid}")),
            _ => self.sub.clone(),
        }
    }
}

/// Outcome of a single acquisition call against the identity provider.
///
/// Either `access_token` is set, or the error fields describe why not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthResult {
    /// Bearer token for downstream calls.
    pub access_token: Option<String>,
    /// Refresh material to keep in the token cache.
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: Option<u64>,
    /// Scopes granted by the provider.
    pub scopes: Vec<String>,
    /// Identity of the signed-in user, when an id token was returned.
    pub id_token_claims: Option<IdTokenClaims>,
    /// Failure details when no access token was issued.
    pub error: Option<ProviderError>,
}

impl AuthResult {
    /// A result carrying only a provider error.
    #[must_use]
    pub fn failed(error: ProviderError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Provider error for a result without an access token.
    #[must_use]
    pub fn provider_error(&self) -> ProviderError {
        self.error.clone().unwrap_or_else(|| ProviderError {
            error: Some("no_access_token".to_string()),
            error_description: Some("The provider did not return an access token.".to_string()),
            correlation_id: None,
        })
    }
}
