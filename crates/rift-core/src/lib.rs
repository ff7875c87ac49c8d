//! # rift-core
//!
//! Shared types for the Rift Redshift MCP server.
//!
//! - [`config`]: the unified configuration loaded from `rift.yaml`
//! - [`metadata`]: the catalog metadata contract consumed by the MCP tools

// Configuration types shared across all Rift crates
pub mod config;

// Catalog metadata contract
pub mod metadata;

pub use config::{
    AuditConfig, ConfigError, McpConfig, PoolConfig, RiftConfig, SpectrumConfig,
    SslMode, Transport, UpstreamConfig,
};
pub use metadata::{
    ColumnInfo, MetadataError, MetadataSource, SchemaInfo, SchemaKind, TableInfo,
    TableStatistics,
};
