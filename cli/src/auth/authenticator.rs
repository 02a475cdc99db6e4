//! Bearer token acquisition.
//!
//! Silent acquisition from the token cache is tried first; if it yields no
//! access token, exactly one interactive flow runs. There is no retry and no
//! fallback from one flow to another.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::cache::{CachedAccount, TokenCache};
use crate::auth::prompt::UserPrompt;
use crate::auth::providers::{IdentityProvider, ProviderEndpoints};
use crate::auth::tokens::{AuthResult, FlowKind};
use crate::config::AppConfig;
use crate::error::{PatError, Result};

/// Acquires access tokens through an [`IdentityProvider`], optionally
/// backed by a token cache.
pub struct Authenticator<'c, P> {
    provider: P,
    prompt: Arc<dyn UserPrompt>,
    scopes: Vec<String>,
    client_id: String,
    environment: String,
    cache: Option<&'c mut TokenCache>,
}

impl<'c, P: IdentityProvider> Authenticator<'c, P> {
    /// Authenticator without a cache: every call runs an interactive flow.
    ///
    /// # Errors
    ///
    /// Returns [`PatError::Config`] if the configured authority is invalid.
    pub fn new(provider: P, config: &AppConfig, prompt: Arc<dyn UserPrompt>) -> Result<Self> {
        let endpoints = ProviderEndpoints::from_authority(&config.authority)?;
        Ok(Self {
            provider,
            prompt,
            scopes: config.scope.clone(),
            client_id: config.client_id.clone(),
            environment: endpoints.environment,
            cache: None,
        })
    }

    /// Binds a token cache for silent acquisition and to record new accounts.
    #[must_use]
    pub fn with_cache(mut self, cache: &'c mut TokenCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Acquires a token with the flow named `flow`, or the default flow.
    ///
    /// The name is validated before anything else happens.
    pub async fn acquire_token_by_name(&mut self, flow: Option<&str>) -> Result<String> {
        let flow = flow.map(str::parse::<FlowKind>).transpose()?.unwrap_or_default();
        self.acquire_token(flow).await
    }

    /// Returns an access token, silently if the cache allows it.
    ///
    /// # Errors
    ///
    /// Returns [`PatError::Provider`] when the provider declines to issue a
    /// token, [`PatError::DeviceFlowInitiation`] when no device code could be
    /// obtained, and transport or prompt errors as they occur.
    pub async fn acquire_token(&mut self, flow: FlowKind) -> Result<String> {
        if let Some(token) = self.acquire_silent().await? {
            return Ok(token);
        }

        info!(%flow, "starting interactive authentication");
        let result = self.acquire_interactive(flow).await?;
        match result.access_token.clone() {
            Some(token) => {
                self.remember(&result, None);
                Ok(token)
            },
            None => Err(PatError::Provider(result.provider_error())),
        }
    }

    /// The first cached account for this client and authority, if any.
    #[must_use]
    pub fn account(&self) -> Option<&CachedAccount> {
        self.cache
            .as_deref()?
            .accounts_for(&self.client_id, &self.environment)
            .next()
    }

    async fn acquire_silent(&mut self) -> Result<Option<String>> {
        let Some(account) = self.account().cloned() else {
            debug!("no cached account, skipping silent acquisition");
            return Ok(None);
        };

        let result = self
            .provider
            .acquire_token_silent(&self.scopes, &account)
            .await?;

        match result.access_token.clone() {
            Some(token) => {
                debug!(account = %account.home_account_id, "acquired token silently");
                self.remember(&result, Some(&account));
                Ok(Some(token))
            },
            None => {
                debug!(error = %result.provider_error(), "silent acquisition failed");
                Ok(None)
            },
        }
    }

    async fn acquire_interactive(&self, flow: FlowKind) -> Result<AuthResult> {
        match flow {
            FlowKind::DeviceCode => {
                let device_flow = self.provider.initiate_device_flow(&self.scopes).await?;
                if !device_flow.has_user_code() {
                    return Err(PatError::DeviceFlowInitiation(device_flow.describe()));
                }
                self.prompt.show(&device_flow.instructions())?;
                self.provider.acquire_token_by_device_flow(&device_flow).await
            },
            FlowKind::Interactive => self.provider.acquire_token_interactive(&self.scopes).await,
            FlowKind::UsernamePassword => {
                let username = self.prompt.read_line("Enter your username: ")?;
                let password = self.prompt.read_secret("Enter your password: ")?;
                if username.is_empty() || password.is_empty() {
                    return Err(PatError::AuthenticationFailed(
                        "a username and password are required".to_string(),
                    ));
                }
                self.provider
                    .acquire_token_by_username_password(&username, &password, &self.scopes)
                    .await
            },
        }
    }

    fn remember(&mut self, result: &AuthResult, previous: Option<&CachedAccount>) {
        let Some(cache) = self.cache.as_deref_mut() else {
            return;
        };
        match CachedAccount::from_result(result, &self.client_id, &self.environment, previous) {
            Some(account) => cache.upsert_account(account),
            None => debug!("token response carried no cacheable account"),
        }
    }
}
