//! Configuration types for Rift.
//!
//! Configuration is loaded from a single YAML file (`rift.yaml` by default).
//! Every section is optional; missing sections take their defaults.
//!
//! ```yaml
//! upstream:
//!   host: wh.abc123.us-east-1.redshift.amazonaws.com
//!   password_env: REDSHIFT_PASSWORD
//! spectrum:
//!   enabled: true
//! mcp:
//!   transport: stdio
//! audit:
//!   file: logs/audit.log
//! ```

pub mod audit;
pub mod mcp;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use audit::AuditConfig;
pub use mcp::{McpConfig, Transport};
pub use upstream::{PoolConfig, SslMode, UpstreamConfig};

/// Complete Rift configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiftConfig {
    /// Upstream Redshift connection.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Federated (Spectrum) table support.
    #[serde(default)]
    pub spectrum: SpectrumConfig,

    /// MCP server configuration.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Spectrum (externally-federated table) support.
///
/// When disabled, every statement runs in a read-only transaction and the
/// external table catalog is never consulted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpectrumConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RiftConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    ///
    /// Returns the config and whether a file was actually read.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, bool), ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let mut config = Self::from_file(path)?;
            config.resolve_paths(path.parent().unwrap_or(Path::new(".")));
            Ok((config, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    /// Make relative file paths relative to the config file's directory.
    fn resolve_paths(&mut self, base_dir: &Path) {
        if let Some(file) = &self.audit.file
            && file.is_relative()
        {
            self.audit.file = Some(base_dir.join(file));
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let pool = &self.upstream.pool;
        if pool.min_connections > pool.max_connections {
            return Err(ConfigError::Config(format!(
                "upstream.pool.min_connections ({}) exceeds max_connections ({})",
                pool.min_connections, pool.max_connections
            )));
        }
        if self.mcp.is_http() && self.mcp.port == 0 {
            return Err(ConfigError::Config(
                "mcp.port must be non-zero for the http transport".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the audit log file, if file output is configured.
    pub fn audit_file(&self) -> Option<&PathBuf> {
        self.audit.file.as_ref()
    }
}
