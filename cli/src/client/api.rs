//! PAT lifecycle API client.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::client::middleware::AuthMiddleware;
use crate::client::types::{
    PagedPatTokens, PatToken, PatTokenCreateRequest, PatTokenResult, PatTokenUpdateRequest,
};
use crate::config::AppConfig;
use crate::error::{PatError, Result};

/// Client for `/{organization}/_apis/tokens/pats`, authenticated with an
/// Entra access token.
pub struct PatClient {
    client: ClientWithMiddleware,
    base_url: Url,
    organization: String,
    api_version: String,
}

impl PatClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &AppConfig, access_token: &str) -> Result<Self> {
        let inner_client = Client::builder()
            .user_agent(format!("azpat/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()?;

        let client = ClientBuilder::new(inner_client)
            .with(AuthMiddleware::new(access_token))
            .build();

        Ok(Self {
            client,
            base_url: config.api.base_url.clone(),
            organization: config.organization.clone(),
            api_version: config.api_version.clone(),
        })
    }

    /// Creates a PAT. The secret is only ever returned here.
    pub async fn create(&self, request: &PatTokenCreateRequest) -> Result<PatToken> {
        let response = self.client.post(self.endpoint(&[])?).json(request).send().await?;
        let status = response.status();
        if status.is_success() && status != StatusCode::CREATED {
            debug!(%status, "create answered without 201");
        }
        let result: PatTokenResult = read_json(response).await?;
        into_token(result)
    }

    /// Lists PATs, one page at a time.
    pub async fn list(&self, continuation_token: Option<&str>) -> Result<PagedPatTokens> {
        let query: Vec<_> = continuation_token
            .map(|token| ("continuationToken", token))
            .into_iter()
            .collect();
        let response = self.client.get(self.endpoint(&query)?).send().await?;
        read_json(response).await
    }

    /// Fetches every page of the PAT list.
    pub async fn list_all(&self) -> Result<Vec<PatToken>> {
        let mut tokens = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self.list(continuation.as_deref()).await?;
            continuation = page.next_page().map(String::from);
            tokens.extend(page.pat_tokens);
            if continuation.is_none() {
                return Ok(tokens);
            }
        }
    }

    /// Gets one PAT by authorization id.
    pub async fn get(&self, authorization_id: &str) -> Result<PatToken> {
        let url = self.endpoint(&[("authorizationId", authorization_id)])?;
        let response = self.client.get(url).send().await?;
        into_token(read_json(response).await?)
    }

    /// Revokes a PAT. Returns `true` if the service confirmed with 204.
    pub async fn revoke(&self, authorization_id: &str) -> Result<bool> {
        let url = self.endpoint(&[("authorizationId", authorization_id)])?;
        let response = self.client.delete(url).send().await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(true),
            status if status.is_success() && status != StatusCode::NON_AUTHORITATIVE_INFORMATION => {
                debug!(%status, "revoke returned success without 204");
                Ok(false)
            },
            _ => Err(status_error(response).await),
        }
    }

    /// Updates a PAT; absent fields keep their current values.
    pub async fn update(&self, request: &PatTokenUpdateRequest) -> Result<PatToken> {
        let response = self.client.put(self.endpoint(&[])?).json(request).send().await?;
        into_token(read_json(response).await?)
    }

    fn endpoint(&self, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PatError::Config(format!("Invalid API base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend([self.organization.as_str(), "_apis", "tokens", "pats"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api-version", &self.api_version);
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Decodes a successful response, mapping failure statuses to errors.
///
/// 203 counts as a failure: the service answers with a sign-in page when it
/// does not accept the bearer token.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() || status == StatusCode::NON_AUTHORITATIVE_INFORMATION {
        return Err(status_error(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| PatError::Serialization(e.to_string()))
}

async fn status_error(response: Response) -> PatError {
    let status = response.status();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    match status {
        StatusCode::UNAUTHORIZED => PatError::Unauthorized,
        StatusCode::NON_AUTHORITATIVE_INFORMATION => PatError::NonAuthoritative(message),
        StatusCode::SERVICE_UNAVAILABLE => PatError::ApiUnavailable,
        _ => PatError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}

fn into_token(result: PatTokenResult) -> Result<PatToken> {
    match result.error() {
        Some(code) => Err(PatError::ApiError {
            status: StatusCode::OK.as_u16(),
            message: format!("PAT service reported '{code}'"),
        }),
        None => Ok(result.pat_token),
    }
}
