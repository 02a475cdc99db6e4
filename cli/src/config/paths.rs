//! Platform-specific path utilities for azpat.

use std::path::PathBuf;

use crate::error::{PatError, Result};

/// File name of the configuration document in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "config.json";

/// File name of the token cache.
pub const CACHE_FILE: &str = "token.bin";

/// Get the configuration directory for azpat.
///
/// - Linux: `~/.config/azpat`
/// - macOS: `~/Library/Application Support/azpat`
/// - Windows: `%APPDATA%\azpat`
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| PatError::Config("Cannot determine config directory".to_string()))?;
    Ok(base.join("azpat"))
}

/// Get the data directory for azpat.
///
/// - Linux: `~/.local/share/azpat`
/// - macOS: `~/Library/Application Support/azpat`
/// - Windows: `%APPDATA%\azpat`
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| PatError::Config("Cannot determine data directory".to_string()))?;
    Ok(base.join("azpat"))
}

/// Get the user-wide configuration file path.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default location of the token cache.
pub fn cache_file() -> Result<PathBuf> {
    Ok(data_dir()?.join(CACHE_FILE))
}
