//! Error types for the MCP crate.

use crate::protocol::{INTERNAL_ERROR, INVALID_PARAMS};
use thiserror::Error;

/// Errors that can occur in the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Tool not found.
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// Invalid arguments for tool.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Resource URI not recognized.
    #[error("resource not found: {uri}")]
    ResourceNotFound { uri: String },

    /// Reading a resource failed.
    #[error("failed to read resource {uri}: {reason}")]
    ResourceFailed { uri: String, reason: String },

    /// Transport error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl McpError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidRequest(_)
            | Self::ToolNotFound { .. }
            | Self::InvalidArguments { .. }
            | Self::ResourceNotFound { .. } => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        }
    }
}
