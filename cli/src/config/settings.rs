//! Application configuration settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::FlowKind;
use crate::config::paths;
use crate::error::{PatError, Result};

/// Main configuration for azpat.
///
/// The first five fields are required; they match the `config.json`
/// document the tool has always read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Issuer URL, e.g. `https://login.microsoftonline.com/common`.
    pub authority: String,
    /// Application (client) id registered with the authority.
    pub client_id: String,
    /// Scopes to request. An entry may hold several space-separated scopes.
    pub scope: Vec<String>,
    /// Azure DevOps organization the PATs belong to.
    pub organization: String,
    /// PAT REST API version.
    pub api_version: String,
    /// Flow used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowKind>,
    /// Store the token cache in a plain file when the Linux secret
    /// service is unavailable.
    #[serde(default)]
    pub allow_plaintext_fallback: bool,
    /// Token cache location override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
    /// Loopback port for the browser flow; `0` picks a free one.
    #[serde(default)]
    pub redirect_port: u16,
    /// PAT API client settings.
    #[serde(default)]
    pub api: ApiConfig,
}

/// PAT API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the token service.
    #[serde(with = "url_serde")]
    pub base_url: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://vssps.dev.azure.com").expect("valid default URL"),
            timeout_secs: 30,
        }
    }
}

/// Custom serde module for URL serialization.
mod url_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use url::Url;

    pub fn serialize<S>(url: &Url, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(url.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Url, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Url::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Environment variables that can override configuration.
pub mod env {
    pub const API_URL: &str = "AZPAT_API_URL";
    pub const ORGANIZATION: &str = "AZPAT_ORGANIZATION";
    pub const FLOW: &str = "AZPAT_FLOW";
    pub const LOG_LEVEL: &str = "AZPAT_LOG";
}

impl AppConfig {
    /// Apply environment variable overrides to the configuration.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(env::API_URL) {
            if let Ok(parsed) = Url::parse(&url) {
                self.api.base_url = parsed;
            }
        }

        if let Ok(organization) = std::env::var(env::ORGANIZATION) {
            if !organization.is_empty() {
                self.organization = organization;
            }
        }

        self
    }

    /// Rejects documents whose required fields are present but empty.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("authority", &self.authority),
            ("client_id", &self.client_id),
            ("organization", &self.organization),
            ("api_version", &self.api_version),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PatError::Config(format!("'{name}' must not be empty")));
            }
        }
        if self.scope.iter().all(|s| s.trim().is_empty()) {
            return Err(PatError::Config("'scope' must list at least one scope".to_string()));
        }
        Ok(())
    }

    /// Where the token cache lives.
    pub fn cache_location(&self) -> Result<PathBuf> {
        match &self.cache_path {
            Some(path) => Ok(path.clone()),
            None => paths::cache_file(),
        }
    }
}
