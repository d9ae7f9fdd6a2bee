//! Client configuration module.
//!
//! Handles loading, merging, and validating `config.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! `config.toml` is read from the config directory (`--config-dir`, default
//! the current directory). A missing file means "all defaults".
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! base_url = "http://localhost:5000"  # Detection backend
//! request_timeout_secs = 30           # Ordinary requests (status probe)
//! infer_timeout_secs = 300            # Upload + inference
//! download_timeout_secs = 300         # Result archive download
//!
//! [prepare]
//! require_standard_names = false      # Reject names outside [A-Za-z0-9_.-]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Name of the config file inside the config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Client configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Detection backend connection settings.
    pub server: ServerConfig,
    /// Folder preparation settings.
    pub prepare: PrepareConfig,
}

impl ClientConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.server.base_url).map_err(|e| {
            ConfigError::Validation(format!(
                "server.base_url is not a valid URL ({}): {e}",
                self.server.base_url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "server.base_url must use http or https, got {}",
                url.scheme()
            )));
        }
        for (key, value) in [
            ("request_timeout_secs", self.server.request_timeout_secs),
            ("infer_timeout_secs", self.server.infer_timeout_secs),
            ("download_timeout_secs", self.server.download_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "server.{key} must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

/// Detection backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Base URL of the backend; `/infer` and `/download/{id}` hang off it.
    pub base_url: String,
    /// Timeout for ordinary requests, in seconds.
    pub request_timeout_secs: u64,
    /// Timeout for the upload + inference request, in seconds.
    pub infer_timeout_secs: u64,
    /// Timeout for result archive downloads, in seconds.
    pub download_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
            infer_timeout_secs: 300,
            download_timeout_secs: 300,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn infer_timeout(&self) -> Duration {
        Duration::from_secs(self.infer_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Folder preparation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepareConfig {
    /// Fail preparation when an image name contains characters outside
    /// ASCII letters, digits, `_`, `-` and `.`.
    pub require_standard_names: bool,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ClientConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from `config.toml` in `dir`, merged over stock defaults and validated.
pub fn load_config(dir: &Path) -> Result<ClientConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(dir)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: ClientConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# change-detect configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Detection backend
# ---------------------------------------------------------------------------
[server]
# Base URL of the detection service. Uploads go to <base_url>/infer and
# result archives are fetched from <base_url>/download/<id>.
base_url = "http://localhost:5000"

# Timeout for ordinary requests such as the status probe (seconds).
request_timeout_secs = 30

# Timeout for the upload + inference request (seconds). Inference on large
# batches is slow, so keep this generous.
infer_timeout_secs = 300

# Timeout for downloading the result archive (seconds).
download_timeout_secs = 300

# ---------------------------------------------------------------------------
# Folder preparation
# ---------------------------------------------------------------------------
[prepare]
# Reject image names containing anything other than ASCII letters, digits,
# underscore, hyphen and dot before pairing.
require_standard_names = false
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_points_at_local_backend() {
        let config = ClientConfig::default();
        assert_eq!(config.server.base_url, "http://localhost:5000");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.server.infer_timeout_secs, 300);
        assert_eq!(config.server.download_timeout_secs, 300);
        assert!(!config.prepare.require_standard_names);
    }

    #[test]
    fn timeouts_convert_to_durations() {
        let server = ServerConfig::default();
        assert_eq!(server.infer_timeout(), Duration::from_secs(300));
        assert_eq!(server.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[server]
base_url = "https://detect.example.org"
"#;
        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.base_url, "https://detect.example.org");
        // Default values preserved
        assert_eq!(config.server.infer_timeout_secs, 300);
        assert!(!config.prepare.require_standard_names);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.server.base_url, "http://localhost:5000");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[server]
infer_timeout_secs = 900

[prepare]
require_standard_names = true
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.server.infer_timeout_secs, 900);
        assert!(config.prepare.require_standard_names);
        assert_eq!(config.server.download_timeout_secs, 300);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[server]\nbase_ulr = \"http://x\"\n",
        )
        .unwrap();

        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<ClientConfig, _> = toml::from_str("[auth]\ntoken = \"x\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        ClientConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_garbage_url() {
        let mut config = ClientConfig::default();
        config.server.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_non_http_scheme() {
        let mut config = ClientConfig::default();
        config.server.base_url = "ftp://files.example.org".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = ClientConfig::default();
        config.server.download_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("download_timeout_secs"));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[server]\ninfer_timeout_secs = 0\n",
        )
        .unwrap();

        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_nested_tables() {
        let base: toml::Value = toml::from_str("[server]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[server]\ny = 5\n[prepare]\nz = true").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["server"]["x"].as_integer(), Some(1));
        assert_eq!(merged["server"]["y"].as_integer(), Some(5));
        assert_eq!(merged["prepare"]["z"].as_bool(), Some(true));
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: ClientConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = ClientConfig::default();
        assert_eq!(config.server.base_url, defaults.server.base_url);
        assert_eq!(
            config.server.infer_timeout_secs,
            defaults.server.infer_timeout_secs
        );
        assert_eq!(
            config.prepare.require_standard_names,
            defaults.prepare.require_standard_names
        );
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        let table = value.as_table().unwrap();
        assert!(table.contains_key("server"));
        assert!(table.contains_key("prepare"));
    }
}
