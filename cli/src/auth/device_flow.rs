//! OAuth device authorization flow (RFC 8628) support types.
//!
//! The initiation response is kept as raw JSON: a provider that cannot
//! issue a code answers with an error body instead, and the caller needs
//! to see that body verbatim.

use oauth2::devicecode::StandardDeviceAuthorizationResponse;
use serde_json::Value;

use crate::error::{PatError, Result};

/// Response to a device authorization request.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFlow {
    /// Code the user enters at the verification URL.
    pub user_code: Option<String>,
    /// URL the user visits.
    pub verification_uri: Option<String>,
    /// Ready-made instructions, when the provider supplies them.
    pub message: Option<String>,
    /// Seconds until the code expires.
    pub expires_in: Option<u64>,
    raw: Value,
}

impl DeviceFlow {
    /// Wraps the JSON body returned by the device authorization endpoint.
    #[must_use]
    pub fn from_response(raw: Value) -> Self {
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(String::from);
        Self {
            user_code: text("user_code"),
            verification_uri: text("verification_uri").or_else(|| text("verification_url")),
            message: text("message"),
            expires_in: raw.get("expires_in").and_then(Value::as_u64),
            raw,
        }
    }

    /// Whether the provider actually issued a code.
    #[must_use]
    pub const fn has_user_code(&self) -> bool {
        self.user_code.is_some()
    }

    /// Text telling the user how to complete sign-in.
    #[must_use]
    pub fn instructions(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        format!(
            "To sign in, use a web browser to open {} and enter the code {} to authenticate.",
            self.verification_uri.as_deref().unwrap_or("the verification page"),
            self.user_code.as_deref().unwrap_or("shown by your administrator")
        )
    }

    /// The provider response, pretty-printed for error reports.
    #[must_use]
    pub fn describe(&self) -> String {
        serde_json::to_string_pretty(&self.raw).unwrap_or_else(|_| self.raw.to_string())
    }

    /// Converts to the `oauth2` crate's response type for polling.
    ///
    /// # Errors
    ///
    /// Returns [`PatError::DeviceFlowInitiation`] if required fields are missing.
    pub fn authorization(&self) -> Result<StandardDeviceAuthorizationResponse> {
        serde_json::from_value(self.raw.clone())
            .map_err(|e| PatError::DeviceFlowInitiation(format!("{e}: {}", self.describe())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entra_response() -> Value {
        json!({
            "user_code": "FQK5HW3UF",
            "device_code": "GAQABAAEAAAAm-06blBE1TpVMil8KPQ41",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 5,
            "message": "To sign in, use a web browser to open the page https://microsoft.com/devicelogin and enter the code FQK5HW3UF to authenticate."
        })
    }

    #[test]
    fn reads_entra_response() {
        let flow = DeviceFlow::from_response(entra_response());
        assert!(flow.has_user_code());
        assert_eq!(flow.user_code.as_deref(), Some("FQK5HW3UF"));
        assert_eq!(flow.expires_in, Some(900));
        assert!(flow.instructions().contains("FQK5HW3UF"));
        assert!(flow.authorization().is_ok());
    }

    #[test]
    fn error_body_has_no_user_code() {
        let flow = DeviceFlow::from_response(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000218",
        }));
        assert!(!flow.has_user_code());
        assert!(flow.describe().contains("invalid_client"));
        assert!(matches!(
            flow.authorization(),
            Err(PatError::DeviceFlowInitiation(_))
        ));
    }

    #[test]
    fn instructions_without_message_are_built() {
        let mut body = entra_response();
        body.as_object_mut().unwrap().remove("message");
        let flow = DeviceFlow::from_response(body);
        let text = flow.instructions();
        assert!(text.contains("https://microsoft.com/devicelogin"));
        assert!(text.contains("FQK5HW3UF"));
    }
}
