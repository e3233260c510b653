//! Engine configuration.
//!
//! The engine reads its settings from a small TOML file:
//!
//! ```toml
//! base_url = "https://erp.example.com"
//! kernel_path = "/api/erp/org.openbravo.client.kernel"
//! datasource_path = "/datasource"
//! plugin_timeout_secs = 30
//! ```
//!
//! Every field has a default, so an absent file yields a working
//! configuration pointed at a local ERP instance.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the kernel client and plugin execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the ERP backend (scheme + host).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the kernel action endpoint, appended to `base_url`.
    #[serde(default = "default_kernel_path")]
    pub kernel_path: String,

    /// Path of the datasource endpoint, appended to `base_url`.
    #[serde(default = "default_datasource_path")]
    pub datasource_path: String,

    /// Timeout in seconds applied to every plugin invocation and remote call.
    #[serde(default = "default_plugin_timeout")]
    pub plugin_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_kernel_path() -> String {
    "/api/erp/org.openbravo.client.kernel".to_string()
}

fn default_datasource_path() -> String {
    "/datasource".to_string()
}

fn default_plugin_timeout() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            kernel_path: default_kernel_path(),
            datasource_path: default_datasource_path(),
            plugin_timeout_secs: default_plugin_timeout(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config at {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse engine config TOML")
    }

    /// Full URL of the kernel action endpoint.
    pub fn kernel_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.kernel_path)
    }

    /// Full URL of the datasource endpoint.
    pub fn datasource_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.datasource_path
        )
    }

    /// Validate the configuration and return human-readable warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.plugin_timeout_secs == 0 {
            warnings.push("plugin_timeout_secs is 0: every plugin call will time out".to_string());
        }
        if !self.kernel_path.starts_with('/') {
            warnings.push(format!(
                "kernel_path '{}' should start with '/'",
                self.kernel_path
            ));
        }
        if !self.datasource_path.starts_with('/') {
            warnings.push(format!(
                "datasource_path '{}' should start with '/'",
                self.datasource_path
            ));
        }
        warnings
    }
}
