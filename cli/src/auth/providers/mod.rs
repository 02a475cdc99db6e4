//! Identity provider abstraction.
//!
//! [`IdentityProvider`] is the seam between the authenticator's state
//! machine and the OAuth protocol. [`entra::EntraProvider`] speaks to
//! Microsoft Entra ID.

pub mod entra;

use async_trait::async_trait;
use oauth2::{AuthUrl, DeviceAuthorizationUrl, Scope, TokenUrl};
use url::Url;

use crate::auth::cache::CachedAccount;
use crate::auth::device_flow::DeviceFlow;
use crate::auth::tokens::AuthResult;
use crate::error::{PatError, Result};

pub use entra::EntraProvider;

/// Scopes the provider always adds so an id token and a refresh token are issued.
const RESERVED_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// Token acquisition primitives offered by an identity provider.
///
/// Provider rejections come back as `Ok` with [`AuthResult::error`] set;
/// `Err` is reserved for transport and protocol failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Redeems the account's refresh token without user interaction.
    async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: &CachedAccount,
    ) -> Result<AuthResult>;

    /// Requests a device code and user instructions.
    async fn initiate_device_flow(&self, scopes: &[String]) -> Result<DeviceFlow>;

    /// Polls until the device flow completes or expires.
    async fn acquire_token_by_device_flow(&self, flow: &DeviceFlow) -> Result<AuthResult>;

    /// Runs the browser sign-in and waits for the redirect.
    async fn acquire_token_interactive(&self, scopes: &[String]) -> Result<AuthResult>;

    /// Resource owner password credentials grant.
    async fn acquire_token_by_username_password(
        &self,
        username: &str,
        password: &str,
        scopes: &[String],
    ) -> Result<AuthResult>;
}

/// OAuth endpoints derived from an authority URL.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    /// Authority host, e.g. `login.microsoftonline.com`.
    pub environment: String,
    /// Authorization URL.
    pub auth_url: AuthUrl,
    /// Token URL.
    pub token_url: TokenUrl,
    /// Device authorization URL for device flow.
    pub device_auth_url: DeviceAuthorizationUrl,
}

impl ProviderEndpoints {
    /// Endpoints of a v2.0 authority such as
    /// `https://login.microsoftonline.com/common`.
    ///
    /// # Errors
    ///
    /// Returns [`PatError::Config`] if the authority is not an absolute https URL.
    pub fn from_authority(authority: &str) -> Result<Self> {
        let parsed = Url::parse(authority)
            .map_err(|e| PatError::Config(format!("Invalid authority '{authority}': {e}")))?;
        // Loopback authorities may be plain http.
        if parsed.scheme() != "https" && parsed.host_str() != Some("127.0.0.1") {
            return Err(PatError::Config(format!(
                "Authority must use https: {authority}"
            )));
        }
        let environment = parsed
            .host_str()
            .ok_or_else(|| PatError::Config(format!("Authority has no host: {authority}")))?
            .to_string();

        let base = authority.trim_end_matches('/');
        Ok(Self {
            environment,
            auth_url: AuthUrl::new(format!("{base}/oauth2/v2.0/authorize"))
                .map_err(|e| PatError::Config(format!("Invalid auth URL: {e}")))?,
            token_url: TokenUrl::new(format!("{base}/oauth2/v2.0/token"))
                .map_err(|e| PatError::Config(format!("Invalid token URL: {e}")))?,
            device_auth_url: DeviceAuthorizationUrl::new(format!("{base}/oauth2/v2.0/devicecode"))
                .map_err(|e| PatError::Config(format!("Invalid device auth URL: {e}")))?,
        })
    }
}

/// Expands configured scope entries into OAuth scopes.
///
/// Entries may hold several space-separated scopes. Reserved OIDC scopes
/// are appended and duplicates dropped.
#[must_use]
pub fn request_scopes(scopes: &[String]) -> Vec<Scope> {
    let mut names: Vec<&str> = Vec::new();
    for name in scopes
        .iter()
        .flat_map(|entry| entry.split_whitespace())
        .chain(RESERVED_SCOPES)
    {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.into_iter().map(|s| Scope::new(s.to_string())).collect()
}
