//! Service configuration, loadable from TOML.
//!
//! The `[application_settings]` table is the flat key/value map a hosting
//! pipeline would hand the export stage. It is kept as raw strings so the
//! settings loader can report missing and malformed keys itself.

use std::collections::HashMap;

use serde::Deserialize;

/// Config path used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/aws-export/config.toml";

/// Top-level configuration for the export service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name the service registers under; also the root tracing span.
    #[serde(default = "default_service_key")]
    pub service_key: String,
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Raw application settings. `None` when the table is absent.
    #[serde(default)]
    pub application_settings: Option<HashMap<String, String>>,
}

fn default_service_key() -> String {
    "AWSExport".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServiceConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}
