//! # rift-mcp
//!
//! MCP (Model Context Protocol) server exposing a Redshift cluster to AI
//! assistants.
//!
//! - **Guarded queries**: the `query` tool runs SQL through
//!   [`rift_guard::TransactionRouter`], so only validated SELECT statements
//!   reach the database, each in its own transaction.
//! - **Catalog tools**: schema, table, column and statistics lookups backed by
//!   a [`rift_core::MetadataSource`].
//! - **Resources**: `redshift://schemas` and `redshift://schema/{name}`.
//! - **Transports**: stdio (line-delimited JSON-RPC) and HTTP.
//!
//! ## Architecture
//!
//! ```text
//! AI assistant
//!       │
//!       │ MCP (tools/list, tools/call, resources/read)
//!       ▼
//! ┌──────────────────┐
//! │    McpServer     │
//! │  ToolRegistry    │
//! │  ToolExecutor ───┼──▶ TransactionRouter ──▶ Redshift (guarded SQL)
//! │                  │
//! │                  └──▶ MetadataSource ─────▶ svv_* system views
//! └──────────────────┘
//! ```

pub mod error;
pub mod executor;
pub mod http_transport;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::McpError;
pub use executor::{ToolExecutor, guard_error_payload, query_result};
pub use http_transport::{HttpServer, create_router};
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, ResourceDefinition,
    ToolAnnotations, ToolContent, ToolDefinition,
};
pub use server::McpServer;
pub use tools::ToolRegistry;
