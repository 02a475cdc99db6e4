//! Wire types of the Azure DevOps PAT lifecycle API.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value of `patTokenError` when the operation succeeded.
const NO_ERROR: &str = "none";

/// A personal access token as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatToken {
    /// Identifier used by get, revoke and update.
    pub authorization_id: String,
    /// Token name.
    pub display_name: String,
    /// Space-separated scopes, e.g. `vso.code vso.build`.
    pub scope: String,
    /// Organizations the token is valid for; empty means all.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target_accounts: Vec<String>,
    /// Start of validity.
    pub valid_from: DateTime<Utc>,
    /// Expiry.
    pub valid_to: DateTime<Utc>,
    /// Secret value. Only present in the response to create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Envelope returned by create, get and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatTokenResult {
    /// The token, when the operation succeeded.
    pub pat_token: PatToken,
    /// `none` on success, otherwise an error code such as `displayNameRequired`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pat_token_error: Option<String>,
}

impl PatTokenResult {
    /// Error code reported by the service, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.pat_token_error
            .as_deref()
            .filter(|code| !code.eq_ignore_ascii_case(NO_ERROR))
    }
}

/// One page of a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PagedPatTokens {
    /// Token for the next page; absent or empty on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
    /// Tokens on this page.
    pub pat_tokens: Vec<PatToken>,
}

impl PagedPatTokens {
    /// Continuation token, if another page exists.
    #[must_use]
    pub fn next_page(&self) -> Option<&str> {
        self.continuation_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatTokenCreateRequest {
    /// Valid for every organization the user can access.
    pub all_orgs: bool,
    /// Token name.
    pub display_name: String,
    /// Space-separated scopes.
    pub scope: String,
    /// Expiry.
    pub valid_to: DateTime<Utc>,
}

/// Body of an update request. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatTokenUpdateRequest {
    /// Token to update.
    pub authorization_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_orgs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
}

/// `Authorization` header value that authenticates with a PAT.
///
/// Azure DevOps expects basic auth with an empty user name.
#[must_use]
pub fn basic_auth_header(pat: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!(":{pat}")))
}
