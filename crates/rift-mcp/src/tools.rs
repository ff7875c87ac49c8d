//! Tool registry and the built-in tool set.

use crate::protocol::{ToolAnnotations, ToolDefinition};
use serde_json::json;
use std::collections::HashMap;

pub const QUERY: &str = "query";
pub const LIST_SCHEMAS: &str = "list_schemas";
pub const LIST_TABLES: &str = "list_tables";
pub const DESCRIBE_TABLE: &str = "describe_table";
pub const FIND_COLUMN: &str = "find_column";
pub const TABLE_STATISTICS: &str = "table_statistics";

/// Registry of available MCP tools.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in tool.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        for tool in builtin_tools() {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tools, sorted by name.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        let mut tools: Vec<_> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn read_only() -> Option<ToolAnnotations> {
    Some(ToolAnnotations {
        read_only: Some(true),
        open_world: Some(false),
    })
}

fn schema_table_input() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "schema": { "type": "string", "description": "Schema name" },
            "table": { "type": "string", "description": "Table name" }
        },
        "required": ["schema", "table"]
    })
}

/// Definitions of the tools this server always exposes.
pub fn builtin_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: QUERY.to_string(),
            description: Some(
                "Run a single read-only SELECT statement. Statements referencing Spectrum \
                 tables run in a controlled transaction; anything that could modify data \
                 is rejected before execution."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sql": { "type": "string", "description": "SELECT statement to run" }
                },
                "required": ["sql"]
            }),
            annotations: read_only(),
        },
        ToolDefinition {
            name: LIST_SCHEMAS.to_string(),
            description: Some("List user schemas, including external (Spectrum) schemas.".to_string()),
            input_schema: json!({ "type": "object", "properties": {} }),
            annotations: read_only(),
        },
        ToolDefinition {
            name: LIST_TABLES.to_string(),
            description: Some("List tables and views in a schema.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "schema": { "type": "string", "description": "Schema name" }
                },
                "required": ["schema"]
            }),
            annotations: read_only(),
        },
        ToolDefinition {
            name: DESCRIBE_TABLE.to_string(),
            description: Some("Columns of a table with types and nullability.".to_string()),
            input_schema: schema_table_input(),
            annotations: read_only(),
        },
        ToolDefinition {
            name: FIND_COLUMN.to_string(),
            description: Some(
                "Find columns by name across all schemas. Plain terms match anywhere in \
                 the name; `%` and `_` act as LIKE wildcards."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Column name or LIKE pattern" }
                },
                "required": ["pattern"]
            }),
            annotations: read_only(),
        },
        ToolDefinition {
            name: TABLE_STATISTICS.to_string(),
            description: Some(
                "Row estimate, size, distribution style, sort key and health of a table."
                    .to_string(),
            ),
            input_schema: schema_table_input(),
            annotations: read_only(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tools_registered() {
        let registry = ToolRegistry::with_builtin_tools();

        assert_eq!(registry.len(), 6);
        for name in [
            QUERY,
            LIST_SCHEMAS,
            LIST_TABLES,
            DESCRIBE_TABLE,
            FIND_COLUMN,
            TABLE_STATISTICS,
        ] {
            assert!(registry.contains(name), "missing tool {name}");
        }
    }

    #[test]
    fn test_list_is_sorted() {
        let registry = ToolRegistry::with_builtin_tools();
        let names: Vec<_> = registry.list().iter().map(|t| t.name.as_str()).collect();

        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_query_tool_requires_sql() {
        let registry = ToolRegistry::with_builtin_tools();
        let query = registry.get(QUERY).unwrap();

        assert_eq!(query.input_schema["required"], json!(["sql"]));
        assert_eq!(
            query.annotations.as_ref().and_then(|a| a.read_only),
            Some(true)
        );
    }

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(QUERY).is_none());
    }
}
