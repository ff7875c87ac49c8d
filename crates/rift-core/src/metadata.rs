//! Catalog metadata contract.
//!
//! Types describing schemas, tables and columns as reported by the warehouse
//! system views, plus the [`MetadataSource`] trait the MCP tools read them
//! through. The Redshift implementation lives in `rift-adapter-pg`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Whether a schema holds native tables or is mapped to an external catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Local,
    External,
}

/// A schema visible to the connected user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub kind: SchemaKind,
}

/// A table or view inside a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    /// Raw table type from the catalog (`TABLE`, `VIEW`, `EXTERNAL TABLE`).
    pub table_type: String,
    /// True for Spectrum (externally-federated) tables.
    pub is_external: bool,
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub data_type: String,
    /// 1-based position within the table.
    pub ordinal: i32,
    pub nullable: bool,
}

/// Storage statistics for a native table.
///
/// All fields except the identifiers are optional: external tables and
/// freshly created tables have no entry in the statistics view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableStatistics {
    pub schema: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_estimate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsorted_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_off: Option<f64>,
}

/// Errors returned by a [`MetadataSource`].
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The requested table does not exist or is not visible.
    #[error("table not found: {schema}.{table}")]
    TableNotFound { schema: String, table: String },

    /// The catalog query failed.
    #[error("catalog query failed: {0}")]
    Query(String),
}

/// Read access to warehouse catalog metadata.
///
/// Implementations must only issue parameterized queries against system
/// views; user input is never interpolated into SQL text.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// List user-visible schemas, excluding system schemas.
    async fn list_schemas(&self) -> Result<Vec<SchemaInfo>, MetadataError>;

    /// List tables and views in a schema.
    async fn list_tables(&self, schema: &str) -> Result<Vec<TableInfo>, MetadataError>;

    /// Columns of a table in ordinal order.
    async fn describe_table(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, MetadataError>;

    /// Columns whose name matches a SQL `LIKE` pattern, across all schemas.
    async fn find_column(&self, pattern: &str) -> Result<Vec<ColumnInfo>, MetadataError>;

    /// Storage statistics for a table.
    async fn table_statistics(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<TableStatistics, MetadataError>;
}
