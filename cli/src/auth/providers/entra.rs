//! Microsoft Entra ID (v2.0 endpoints) provider.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oauth2::basic::{BasicRevocationErrorResponse, BasicTokenIntrospectionResponse, BasicTokenType};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthorizationCode, Client, ClientId, CsrfToken, ErrorResponse, ExtraTokenFields,
    PkceCodeChallenge, RedirectUrl, RefreshToken, RequestTokenError, ResourceOwnerPassword,
    ResourceOwnerUsername, StandardRevocableToken, StandardTokenResponse, TokenResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{request_scopes, IdentityProvider, ProviderEndpoints};
use crate::auth::cache::CachedAccount;
use crate::auth::device_flow::DeviceFlow;
use crate::auth::loopback::RedirectListener;
use crate::auth::prompt::UserPrompt;
use crate::auth::tokens::{AuthResult, IdTokenClaims, ProviderError};
use crate::config::AppConfig;
use crate::error::{PatError, Result};

/// Token response fields beyond RFC 6749 that Entra returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntraTokenFields {
    /// OIDC id token, present when `openid` was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for EntraTokenFields {}

/// Entra error body. Unlike the RFC shape it carries a correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntraErrorResponse {
    /// OAuth error code.
    pub error: String,
    /// `AADSTS…` description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// Correlation id for support requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ErrorResponse for EntraErrorResponse {}

impl fmt::Display for EntraErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(description) = &self.error_description {
            write!(f, ": {description}")?;
        }
        Ok(())
    }
}

impl From<EntraErrorResponse> for ProviderError {
    fn from(err: EntraErrorResponse) -> Self {
        Self {
            error: Some(err.error),
            error_description: err.error_description,
            correlation_id: err.correlation_id,
        }
    }
}

type EntraTokenResponse = StandardTokenResponse<EntraTokenFields, BasicTokenType>;

type EntraClient = Client<
    EntraErrorResponse,
    EntraTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Public client against an Entra authority.
pub struct EntraProvider {
    client: EntraClient,
    endpoints: ProviderEndpoints,
    client_id: String,
    http: reqwest::Client,
    prompt: Arc<dyn UserPrompt>,
    redirect_port: u16,
    open_browser: bool,
}

impl EntraProvider {
    /// Builds a provider for the configured authority and client id.
    ///
    /// # Errors
    ///
    /// Returns an error if the authority is invalid or the HTTP client cannot be built.
    pub fn new(config: &AppConfig, prompt: Arc<dyn UserPrompt>) -> Result<Self> {
        let endpoints = ProviderEndpoints::from_authority(&config.authority)?;
        let client = EntraClient::new(
            ClientId::new(config.client_id.clone()),
            None, // Public client, no secret
            endpoints.auth_url.clone(),
            Some(endpoints.token_url.clone()),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_device_authorization_url(endpoints.device_auth_url.clone());

        let http = reqwest::Client::builder()
            .user_agent(format!("azpat/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoints,
            client_id: config.client_id.clone(),
            http,
            prompt,
            redirect_port: config.redirect_port,
            open_browser: true,
        })
    }

    /// Whether the browser flow should launch a browser or only print the URL.
    #[must_use]
    pub const fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }
}

#[async_trait]
impl IdentityProvider for EntraProvider {
    async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: &CachedAccount,
    ) -> Result<AuthResult> {
        debug!(account = %account.home_account_id, "redeeming cached refresh token");
        let refresh_token = RefreshToken::new(account.refresh_token.clone());
        let response = self
            .client
            .exchange_refresh_token(&refresh_token)
            .add_scopes(request_scopes(scopes))
            .request_async(async_http_client)
            .await;
        token_outcome(response)
    }

    async fn initiate_device_flow(&self, scopes: &[String]) -> Result<DeviceFlow> {
        let scope = request_scopes(scopes)
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let response = self
            .http
            .post(self.endpoints.device_auth_url.as_str())
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| {
            PatError::DeviceFlowInitiation(format!("unreadable response ({status}): {e}"))
        })?;
        Ok(DeviceFlow::from_response(body))
    }

    async fn acquire_token_by_device_flow(&self, flow: &DeviceFlow) -> Result<AuthResult> {
        let details = flow.authorization()?;

        let response = self
            .client
            .exchange_device_access_token(&details)
            .request_async(async_http_client, tokio::time::sleep, None)
            .await;

        match response {
            Ok(token) => Ok(token_result(&token)),
            Err(RequestTokenError::ServerResponse(err)) => {
                Ok(AuthResult::failed(provider_error_from(&err)))
            },
            Err(e) => Err(protocol_error(e)),
        }
    }

    async fn acquire_token_interactive(&self, scopes: &[String]) -> Result<AuthResult> {
        let listener = RedirectListener::bind(self.redirect_port).await?;
        let redirect = RedirectUrl::new(listener.redirect_uri())?;
        let client = self.client.clone().set_redirect_uri(redirect);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(request_scopes(scopes))
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("prompt", "select_account")
            .url();

        self.prompt.show(&format!(
            "A browser window will open for sign-in. If it does not, visit:\n\n  {auth_url}\n"
        ))?;
        if self.open_browser {
            if let Err(e) = open::that(auth_url.as_str()) {
                warn!(error = %e, "could not open browser");
            }
        }

        let params = listener.wait().await?;
        if params.state.as_deref() != Some(csrf_state.secret().as_str()) {
            return Err(PatError::StateMismatch);
        }
        if let Some(error) = params.error {
            return Ok(AuthResult::failed(ProviderError {
                error: Some(error),
                error_description: params.error_description,
                correlation_id: None,
            }));
        }
        let code = params
            .code
            .ok_or_else(|| PatError::AuthenticationFailed("redirect carried no code".to_string()))?;

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(async_http_client)
            .await;
        token_outcome(response)
    }

    async fn acquire_token_by_username_password(
        &self,
        username: &str,
        password: &str,
        scopes: &[String],
    ) -> Result<AuthResult> {
        let username = ResourceOwnerUsername::new(username.to_string());
        let password = ResourceOwnerPassword::new(password.to_string());
        let response = self
            .client
            .exchange_password(&username, &password)
            .add_scopes(request_scopes(scopes))
            .request_async(async_http_client)
            .await;
        token_outcome(response)
    }
}

fn token_result(response: &EntraTokenResponse) -> AuthResult {
    AuthResult {
        access_token: Some(response.access_token().secret().clone()),
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        expires_in: response.expires_in().map(|d| d.as_secs()),
        scopes: response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default(),
        id_token_claims: response
            .extra_fields()
            .id_token
            .as_deref()
            .and_then(IdTokenClaims::decode),
        error: None,
    }
}

/// Maps a token endpoint outcome: provider rejections become data,
/// everything else an error.
fn token_outcome<RE>(
    response: std::result::Result<EntraTokenResponse, RequestTokenError<RE, EntraErrorResponse>>,
) -> Result<AuthResult>
where
    RE: std::error::Error + 'static,
{
    match response {
        Ok(token) => Ok(token_result(&token)),
        Err(RequestTokenError::ServerResponse(err)) => {
            debug!(error = %err, "token request rejected");
            Ok(AuthResult::failed(err.into()))
        },
        Err(e) => Err(protocol_error(e)),
    }
}

fn protocol_error<RE, T>(err: RequestTokenError<RE, T>) -> PatError
where
    RE: std::error::Error + 'static,
    T: ErrorResponse + 'static,
{
    match err {
        RequestTokenError::Request(e) => PatError::Network(e.to_string()),
        RequestTokenError::Parse(e, body) => PatError::AuthenticationFailed(format!(
            "unexpected token response: {e}: {}",
            String::from_utf8_lossy(&body)
        )),
        RequestTokenError::Other(message) => PatError::AuthenticationFailed(message),
        RequestTokenError::ServerResponse(_) => {
            PatError::AuthenticationFailed("token request rejected".to_string())
        },
    }
}

/// Reads the standard error fields out of any serializable error body.
fn provider_error_from<T: Serialize>(err: &T) -> ProviderError {
    serde_json::to_value(err)
        .ok()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}
