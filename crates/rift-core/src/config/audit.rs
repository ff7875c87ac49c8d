//! Audit logging configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for audit logging.
///
/// Without a `file`, events go to stderr. With a `file`, `console` also
/// echoes them to stderr.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Echo audit events as log lines on stderr.
    #[serde(default)]
    pub console: bool,

    /// Append audit events as JSON lines to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            console: false,
            file: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}
