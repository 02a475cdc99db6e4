//! Error types and result aliases for azpat.
//!
//! Every variant carries a user-facing message; where the user can do
//! something about the failure the message says what.

use thiserror::Error;

use crate::auth::ProviderError;

/// Main error type for azpat operations.
///
/// Use [`requires_reauth`](Self::requires_reauth) to decide whether the
/// cached account should be discarded and a fresh interactive flow run.
#[derive(Error, Debug)]
pub enum PatError {
    /// The identity provider rejected or could not complete a flow.
    #[error("{0}")]
    Provider(ProviderError),

    /// Flow name not in the supported set. Raised before any network call.
    #[error("Unsupported authentication flow '{name}'. Supported flows are: {supported}")]
    UnsupportedFlow {
        /// The rejected flow name.
        name: String,
        /// Comma-separated list of valid flow names.
        supported: String,
    },

    /// Device authorization response did not contain a user code.
    #[error("Failed to create device flow. Provider response: {0}")]
    DeviceFlowInitiation(String),

    /// Browser sign-in returned a state value that does not match the request.
    #[error("Browser sign-in returned an unexpected state parameter. Please run the command again.")]
    StateMismatch,

    /// OAuth or token endpoint failure that is not a provider error response.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The user aborted a prompt, or input ended.
    #[error("Input cancelled.")]
    Cancelled,

    /// Hidden input was requested with no terminal attached.
    #[error("Password input requires an interactive terminal. Use '--flow device_flow' when running without one.")]
    TerminalRequired,

    /// Token lifetime that no expiry date can represent.
    #[error("A lifetime of {0} days is out of range. Use 1 to 365 days.")]
    InvalidDays(u32),

    /// PAT API returned 203: the bearer token was accepted but not authoritative.
    #[error("The PAT service did not authorize this request (203 Non-Authoritative Information): {0}")]
    NonAuthoritative(String),

    /// PAT API returned a non-success status code.
    #[error("API request failed ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// PAT API returned 401 Unauthorized.
    #[error("The PAT service returned unauthorized (401). Run 'azpat logout' and sign in again.")]
    Unauthorized,

    /// API server is unreachable (503 or connection failed).
    #[error("Service is unavailable. Check your network connection or try again later.")]
    ApiUnavailable,

    /// Request timed out.
    #[error("Request timed out. The server may be slow or unreachable. Try again later.")]
    Timeout,

    /// Network error during HTTP request.
    #[error("Network error: {0}. Check your internet connection.")]
    Network(String),

    /// Failed to access the OS secret store.
    #[error("Failed to access credential storage: {0}. Ensure your system keyring is unlocked, or enable the plaintext fallback.")]
    CredentialStorage(String),

    /// Stored token cache could not be deserialized.
    #[error("Token cache at {location} is corrupted: {reason}. Run 'azpat logout' to reset it.")]
    CorruptCache {
        /// Where the cache was read from.
        location: String,
        /// Parser message.
        reason: String,
    },

    /// General configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}. Check file permissions and format.")]
    ConfigRead(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("Data serialization error: {0}. This may indicate corrupted data.")]
    Serialization(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl PatError {
    /// Checks if this error can be resolved by signing in again.
    #[must_use]
    pub const fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::NonAuthoritative(_) | Self::Provider(_)
        )
    }

    /// Returns the provider error payload, if this is one.
    #[must_use]
    pub const fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias using [`PatError`].
pub type Result<T> = std::result::Result<T, PatError>;

impl From<ProviderError> for PatError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

impl From<serde_json::Error> for PatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {err}"))
    }
}

impl From<toml::de::Error> for PatError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigRead(format!("TOML parse error: {err}"))
    }
}

impl From<keyring::Error> for PatError {
    fn from(err: keyring::Error) -> Self {
        Self::CredentialStorage(err.to_string())
    }
}

impl From<reqwest::Error> for PatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::ApiUnavailable
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for PatError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => Self::Network(e.to_string()),
        }
    }
}
