//! Tool execution.
//!
//! The `query` tool goes through the transaction router; every other tool
//! and every resource reads catalog metadata.

use crate::error::McpError;
use crate::protocol::{CallToolResponse, ResourceDefinition};
use crate::tools::{DESCRIBE_TABLE, FIND_COLUMN, LIST_SCHEMAS, LIST_TABLES, QUERY, TABLE_STATISTICS};
use rift_core::{MetadataError, MetadataSource};
use rift_guard::{GuardError, TransactionOutcome, TransactionRouter};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub const SCHEMAS_URI: &str = "redshift://schemas";
pub const SCHEMA_URI_PREFIX: &str = "redshift://schema/";

const JSON_MIME: &str = "application/json";

/// Executes MCP tools against the router and the metadata source.
pub struct ToolExecutor {
    router: Arc<TransactionRouter>,
    metadata: Arc<dyn MetadataSource>,
}

impl ToolExecutor {
    pub fn new(router: Arc<TransactionRouter>, metadata: Arc<dyn MetadataSource>) -> Self {
        Self { router, metadata }
    }

    /// Run a tool.
    ///
    /// Argument problems are protocol errors (`Err`). Rejections, database
    /// failures and metadata failures are tool results with `isError` set.
    pub async fn execute(&self, name: &str, arguments: &Value) -> Result<CallToolResponse, McpError> {
        tracing::debug!(tool = name, "Executing tool");

        match name {
            QUERY => {
                let sql = required_str(name, arguments, "sql")?;
                Ok(self.run_query(sql).await)
            }
            LIST_SCHEMAS => Ok(metadata_response(
                self.metadata
                    .list_schemas()
                    .await
                    .map(|schemas| json!({ "schemas": schemas })),
            )),
            LIST_TABLES => {
                let schema = required_str(name, arguments, "schema")?;
                Ok(metadata_response(
                    self.metadata
                        .list_tables(schema)
                        .await
                        .map(|tables| json!({ "schema": schema, "tables": tables })),
                ))
            }
            DESCRIBE_TABLE => {
                let schema = required_str(name, arguments, "schema")?;
                let table = required_str(name, arguments, "table")?;
                Ok(metadata_response(
                    self.metadata.describe_table(schema, table).await.map(|columns| {
                        json!({ "schema": schema, "table": table, "columns": columns })
                    }),
                ))
            }
            FIND_COLUMN => {
                let pattern = required_str(name, arguments, "pattern")?;
                Ok(metadata_response(
                    self.metadata
                        .find_column(pattern)
                        .await
                        .map(|columns| json!({ "pattern": pattern, "columns": columns })),
                ))
            }
            TABLE_STATISTICS => {
                let schema = required_str(name, arguments, "schema")?;
                let table = required_str(name, arguments, "table")?;
                Ok(metadata_response(
                    self.metadata.table_statistics(schema, table).await,
                ))
            }
            other => Err(McpError::ToolNotFound {
                name: other.to_string(),
            }),
        }
    }

    async fn run_query(&self, sql: &str) -> CallToolResponse {
        match self.router.execute_guarded(sql).await {
            Ok(outcome) => CallToolResponse::json(query_result(&outcome)),
            Err(e) => {
                if e.is_rejection() {
                    tracing::info!(error = %e, "Query rejected");
                } else {
                    tracing::warn!(kind = e.kind(), error = %e, "Query failed");
                }
                CallToolResponse::error(guard_error_payload(&e))
            }
        }
    }

    /// Resources: the schema list plus one entry per schema.
    pub async fn list_resources(&self) -> Vec<ResourceDefinition> {
        let mut resources = vec![ResourceDefinition {
            uri: SCHEMAS_URI.to_string(),
            name: "Schemas".to_string(),
            description: Some("All user schemas in the database".to_string()),
            mime_type: JSON_MIME.to_string(),
        }];

        match self.metadata.list_schemas().await {
            Ok(schemas) => {
                resources.extend(schemas.into_iter().map(|schema| ResourceDefinition {
                    uri: format!("{}{}", SCHEMA_URI_PREFIX, schema.name),
                    description: Some(format!("Tables in schema {}", schema.name)),
                    name: schema.name,
                    mime_type: JSON_MIME.to_string(),
                }));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not list schemas for resource listing");
            }
        }

        resources
    }

    /// Read a resource, returning the MCP `resources/read` result.
    pub async fn read_resource(&self, uri: &str) -> Result<Value, McpError> {
        let failed = |e: MetadataError| McpError::ResourceFailed {
            uri: uri.to_string(),
            reason: e.to_string(),
        };

        let body = if uri == SCHEMAS_URI {
            json!({ "schemas": self.metadata.list_schemas().await.map_err(failed)? })
        } else if let Some(schema) = uri.strip_prefix(SCHEMA_URI_PREFIX)
            && !schema.is_empty()
        {
            let tables = self.metadata.list_tables(schema).await.map_err(failed)?;
            json!({ "schema": schema, "tables": tables })
        } else {
            return Err(McpError::ResourceNotFound {
                uri: uri.to_string(),
            });
        };

        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": JSON_MIME,
                "text": body.to_string()
            }]
        }))
    }
}

/// Success payload of the `query` tool.
pub fn query_result(outcome: &TransactionOutcome) -> Value {
    json!({
        "rows": outcome.rows,
        "rowCount": outcome.row_count(),
        "path": outcome.path,
        "fallbackUsed": outcome.fallback_used()
    })
}

/// Failure payload of the `query` tool.
///
/// Rejections carry the validation result; operational failures carry a
/// message. `kind` tells clients which one they got.
pub fn guard_error_payload(error: &GuardError) -> Value {
    match error.validation() {
        Some(validation) => json!({
            "kind": error.kind(),
            "isValid": validation.is_valid(),
            "errors": validation.errors()
        }),
        None => json!({
            "kind": error.kind(),
            "message": error.to_string()
        }),
    }
}

fn metadata_response<T: Serialize>(result: Result<T, MetadataError>) -> CallToolResponse {
    let error = match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(value) => return CallToolResponse::json(value),
            Err(e) => json!({ "kind": "internal", "message": e.to_string() }),
        },
        Err(e @ MetadataError::TableNotFound { .. }) => {
            json!({ "kind": "table_not_found", "message": e.to_string() })
        }
        Err(e) => {
            tracing::warn!(error = %e, "Metadata query failed");
            json!({ "kind": "metadata_error", "message": e.to_string() })
        }
    };
    CallToolResponse::error(error)
}

fn required_str<'a>(tool: &str, arguments: &'a Value, key: &str) -> Result<&'a str, McpError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("missing string argument '{}'", key),
        })
}
