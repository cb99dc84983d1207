//! Configuration loading
//!
//! Resolution priority for every setting: environment variable, then the
//! TOML config file, then the compiled default. The geocoding section feeds
//! the external provider client; everything else is storage plumbing.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level TOML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    pub database_path: Option<String>,
    /// Geocoding provider settings
    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

/// Geocoding provider settings
///
/// The search endpoint takes a free-text address query; the postal endpoint
/// resolves a postal code to a structured address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Free-text geocoding search endpoint
    pub search_url: String,
    /// Postal-code lookup endpoint (the code is appended to the path)
    pub postal_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent header (required by the public providers)
    pub user_agent: String,
    /// Country appended to free-text queries
    pub country: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            search_url: "https://nominatim.openstreetmap.org/search".to_string(),
            postal_url: "https://viacep.com.br/ws".to_string(),
            timeout_secs: 10,
            user_agent: "imob-backend/0.1".to_string(),
            country: "Brazil".to_string(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            geocoding: GeocodingConfig::default(),
        }
    }
}

/// Load configuration from an explicit path, the platform config location,
/// or defaults when no file exists. Environment overrides applied last.
pub fn load_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match explicit_path {
        Some(path) => read_config_file(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => read_config_file(&path)?,
            _ => TomlConfig::default(),
        },
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))?;
    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Platform config file path (~/.config/imob/imob.toml on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("imob").join("imob.toml"))
}

/// Default database location (~/.local/share/imob/imob.db on Linux)
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("imob").join("imob.db"))
        .unwrap_or_else(|| PathBuf::from("./imob.db"))
}

fn apply_env_overrides(config: &mut TomlConfig) {
    if let Ok(path) = std::env::var("IMOB_DATABASE_PATH") {
        if !path.trim().is_empty() {
            if config.database_path.is_some() {
                warn!("IMOB_DATABASE_PATH overrides database_path from config file");
            }
            config.database_path = Some(path);
        }
    }

    if let Ok(url) = std::env::var("IMOB_GEOCODING_SEARCH_URL") {
        if !url.trim().is_empty() {
            config.geocoding.search_url = url;
        }
    }

    if let Ok(url) = std::env::var("IMOB_GEOCODING_POSTAL_URL") {
        if !url.trim().is_empty() {
            config.geocoding.postal_url = url;
        }
    }

    if let Ok(secs) = std::env::var("IMOB_GEOCODING_TIMEOUT_SECS") {
        match secs.parse::<u64>() {
            Ok(parsed) if parsed > 0 => config.geocoding.timeout_secs = parsed,
            _ => warn!("Ignoring invalid IMOB_GEOCODING_TIMEOUT_SECS value: {}", secs),
        }
    }
}

/// Resolved database path: config value or platform default
pub fn resolve_database_path(config: &TomlConfig) -> PathBuf {
    config
        .database_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_database_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_when_no_file() {
        std::env::remove_var("IMOB_DATABASE_PATH");
        std::env::remove_var("IMOB_GEOCODING_TIMEOUT_SECS");
        let config = TomlConfig::default();
        assert!(config.database_path.is_none());
        assert_eq!(config.geocoding.timeout_secs, 10);
    }

    #[test]
    #[serial]
    fn env_overrides_file_value() {
        std::env::set_var("IMOB_DATABASE_PATH", "/tmp/override.db");
        let mut config = TomlConfig {
            database_path: Some("/etc/imob/imob.db".to_string()),
            ..TomlConfig::default()
        };
        apply_env_overrides(&mut config);
        assert_eq!(config.database_path.as_deref(), Some("/tmp/override.db"));
        std::env::remove_var("IMOB_DATABASE_PATH");
    }

    #[test]
    #[serial]
    fn invalid_timeout_ignored() {
        std::env::set_var("IMOB_GEOCODING_TIMEOUT_SECS", "zero");
        let mut config = TomlConfig::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.geocoding.timeout_secs, 10);
        std::env::remove_var("IMOB_GEOCODING_TIMEOUT_SECS");
    }

    #[test]
    fn parses_toml_geocoding_section() {
        let raw = r#"
            database_path = "/var/lib/imob/imob.db"

            [geocoding]
            search_url = "http://localhost:8553/search"
            postal_url = "http://localhost:8554/ws"
            timeout_secs = 3
            user_agent = "imob-test"
            country = "Brazil"
        "#;
        let config: TomlConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.geocoding.timeout_secs, 3);
        assert_eq!(config.geocoding.search_url, "http://localhost:8553/search");
    }
}
