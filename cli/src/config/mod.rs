//! Configuration management for azpat.

pub mod paths;
pub mod settings;

pub use settings::{ApiConfig, AppConfig};

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PatError, Result};

/// Where to look for configuration when no path is given.
///
/// `config.json` in the working directory wins, then the user-wide
/// `config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    let local = PathBuf::from(paths::LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }
    paths::config_file()
}

/// Load configuration from the default location.
pub fn load_config() -> Result<AppConfig> {
    let path = default_config_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path.
///
/// `.toml` files are parsed as TOML, anything else as JSON. Unlike most
/// settings files there is no usable default: a missing file is an error.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(PatError::ConfigRead(format!(
            "{} not found",
            path.display()
        )));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| PatError::ConfigRead(format!("{}: {e}", path.display())))?;
    let config: AppConfig = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&contents)?
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| PatError::ConfigRead(format!("{}: {e}", path.display())))?
    };

    let config = config.with_env_overrides();
    config.validate()?;
    debug!(path = %path.display(), organization = %config.organization, "loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_json_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "authority": "https://login.microsoftonline.com/common",
                "client_id": "00000000-0000-0000-0000-000000000000",
                "scope": ["permission1 permission2 permission3"],
                "organization": "your_organization",
                "api_version": "7.1-preview.1",
                "flow": "device_flow"
            }"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.client_id, "00000000-0000-0000-0000-000000000000");
        assert_eq!(config.flow, Some(crate::auth::FlowKind::DeviceCode));
    }

    #[test]
    fn loads_toml_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
authority = "https://login.microsoftonline.com/contoso.onmicrosoft.com"
client_id = "00000000-0000-0000-0000-000000000000"
scope = ["499b84ac-1321-427f-aa17-267ca6975798/.default"]
organization = "contoso"
api_version = "7.1-preview.1"
allow_plaintext_fallback = true

[api]
timeout_secs = 10
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert!(config.allow_plaintext_fallback);
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.api.base_url.as_str(), "https://vssps.dev.azure.com/");
    }

    #[test]
    fn missing_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_config_from(&temp_dir.path().join("config.json"));
        assert!(matches!(result, Err(PatError::ConfigRead(_))));
    }

    #[test]
    fn malformed_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ \"authority\": ").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(PatError::ConfigRead(_))
        ));
    }
}
