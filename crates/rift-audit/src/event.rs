//! Audit event types.
//!
//! One [`AuditEvent`] is written per router decision or outcome. Events are
//! built from [`GuardEvent`]s, so the router itself never depends on this crate.

use chrono::{DateTime, Utc};
use rift_guard::GuardEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest SQL preview shown in console log lines.
const SQL_PREVIEW_CHARS: usize = 100;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // ===== Classification =====
    /// A transaction strategy was chosen.
    StatementClassified,
    /// The statement failed validation.
    ValidationRejected,
    /// The federated catalog could not be consulted.
    CatalogLookupFailed,

    // ===== Execution =====
    /// The statement committed.
    QueryExecuted,
    /// The statement failed.
    QueryFailed,
    /// The elevated attempt failed and the fallback transaction ran.
    FallbackUsed,
    /// A rollback failed after an execution error.
    RollbackFailed,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StatementClassified => write!(f, "STATEMENT_CLASSIFIED"),
            Self::ValidationRejected => write!(f, "VALIDATION_REJECTED"),
            Self::CatalogLookupFailed => write!(f, "CATALOG_LOOKUP_FAILED"),
            Self::QueryExecuted => write!(f, "QUERY_EXECUTED"),
            Self::QueryFailed => write!(f, "QUERY_FAILED"),
            Self::FallbackUsed => write!(f, "FALLBACK_USED"),
            Self::RollbackFailed => write!(f, "ROLLBACK_FAILED"),
        }
    }
}

/// An audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Event type.
    pub event_type: AuditEventType,

    /// The statement text as submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,

    // ===== Routing =====
    /// Strategy chosen for the statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Execution path taken (`read_only`, `secure_elevated`, `fallback`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Tables referenced by the statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,

    /// Referenced tables the catalog reported as federated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federated_tables: Option<Vec<String>>,

    // ===== Execution details =====
    /// Number of rows returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    /// Duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Validation errors (for rejections).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,

    /// Error message (for failures).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event of the given type.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type,
            sql: None,
            strategy: None,
            path: None,
            tables: None,
            federated_tables: None,
            row_count: None,
            duration_ms: None,
            errors: None,
            error: None,
        }
    }

    /// Create a builder for an audit event.
    pub fn builder(event_type: AuditEventType) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type)
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] EVENT_TYPE [path=...] [sql="..."] ...`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {}",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event_type,
        );

        if let Some(ref strategy) = self.strategy {
            line.push_str(&format!(" strategy={}", strategy));
        }

        if let Some(ref path) = self.path {
            line.push_str(&format!(" path={}", path));
        }

        if let Some(ref sql) = self.sql {
            let mut preview: String = sql.chars().take(SQL_PREVIEW_CHARS).collect();
            if sql.chars().count() > SQL_PREVIEW_CHARS {
                preview.push_str("...");
            }
            line.push_str(&format!(" sql=\"{}\"", preview.replace('\n', " ")));
        }

        if let Some(ref tables) = self.tables
            && !tables.is_empty()
        {
            line.push_str(&format!(" tables=[{}]", tables.join(",")));
        }

        if let Some(ref federated) = self.federated_tables
            && !federated.is_empty()
        {
            line.push_str(&format!(" federated=[{}]", federated.join(",")));
        }

        if let Some(row_count) = self.row_count {
            line.push_str(&format!(" rows={}", row_count));
        }

        if let Some(duration) = self.duration_ms {
            line.push_str(&format!(" duration_ms={}", duration));
        }

        if let Some(ref errors) = self.errors {
            line.push_str(&format!(" errors=\"{}\"", errors.join("; ").replace('"', "'")));
        }

        if let Some(ref error) = self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }

        line
    }
}

impl From<GuardEvent> for AuditEvent {
    fn from(event: GuardEvent) -> Self {
        match event {
            GuardEvent::ValidationRejected { sql, errors } => {
                AuditEvent::builder(AuditEventType::ValidationRejected)
                    .sql(sql)
                    .errors(errors)
                    .build()
            }
            GuardEvent::CatalogLookupFailed { sql, table, error } => {
                AuditEvent::builder(AuditEventType::CatalogLookupFailed)
                    .sql(sql)
                    .tables(vec![table])
                    .error(error)
                    .build()
            }
            GuardEvent::StatementClassified {
                sql,
                strategy,
                tables,
                federated_tables,
            } => AuditEvent::builder(AuditEventType::StatementClassified)
                .sql(sql)
                .strategy(strategy)
                .tables(tables)
                .federated_tables(federated_tables)
                .build(),
            GuardEvent::FallbackUsed { sql, error } => {
                AuditEvent::builder(AuditEventType::FallbackUsed)
                    .sql(sql)
                    .error(error)
                    .build()
            }
            GuardEvent::RollbackFailed { sql, path, error } => {
                AuditEvent::builder(AuditEventType::RollbackFailed)
                    .sql(sql)
                    .path(path.to_string())
                    .error(error)
                    .build()
            }
            GuardEvent::QueryExecuted {
                sql,
                path,
                row_count,
                duration_ms,
            } => AuditEvent::builder(AuditEventType::QueryExecuted)
                .sql(sql)
                .path(path.to_string())
                .row_count(row_count)
                .duration_ms(duration_ms)
                .build(),
            GuardEvent::QueryFailed {
                sql,
                path,
                error,
                duration_ms,
            } => AuditEvent::builder(AuditEventType::QueryFailed)
                .sql(sql)
                .path(path.to_string())
                .error(error)
                .duration_ms(duration_ms)
                .build(),
        }
    }
}

/// Builder for creating audit events.
#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event: AuditEvent::new(event_type),
        }
    }

    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.event.sql = Some(sql.into());
        self
    }

    pub fn strategy(mut self, strategy: impl Into<String>) -> Self {
        self.event.strategy = Some(strategy.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.event.path = Some(path.into());
        self
    }

    pub fn tables(mut self, tables: Vec<String>) -> Self {
        self.event.tables = Some(tables);
        self
    }

    pub fn federated_tables(mut self, tables: Vec<String>) -> Self {
        self.event.federated_tables = Some(tables);
        self
    }

    pub fn row_count(mut self, count: u64) -> Self {
        self.event.row_count = Some(count);
        self
    }

    pub fn duration_ms(mut self, duration: u64) -> Self {
        self.event.duration_ms = Some(duration);
        self
    }

    pub fn errors(mut self, errors: Vec<String>) -> Self {
        self.event.errors = Some(errors);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    /// Build the audit event.
    pub fn build(self) -> AuditEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_guard::ExecutionPath;

    #[test]
    fn test_event_type_display() {
        assert_eq!(AuditEventType::FallbackUsed.to_string(), "FALLBACK_USED");
        assert_eq!(
            AuditEventType::StatementClassified.to_string(),
            "STATEMENT_CLASSIFIED"
        );
    }

    #[test]
    fn test_event_type_serializes_snake_case() {
        let json = serde_json::to_string(&AuditEventType::CatalogLookupFailed).unwrap();
        assert_eq!(json, "\"catalog_lookup_failed\"");
    }

    #[test]
    fn test_from_query_executed() {
        let event = AuditEvent::from(GuardEvent::QueryExecuted {
            sql: "SELECT 1".into(),
            path: ExecutionPath::SecureElevated,
            row_count: 3,
            duration_ms: 12,
        });

        assert_eq!(event.event_type, AuditEventType::QueryExecuted);
        assert_eq!(event.path.as_deref(), Some("secure_elevated"));
        assert_eq!(event.row_count, Some(3));
        assert_eq!(event.duration_ms, Some(12));
        assert!(event.error.is_none());
    }

    #[test]
    fn test_from_validation_rejected() {
        let event = AuditEvent::from(GuardEvent::ValidationRejected {
            sql: "DROP TABLE t".into(),
            errors: vec!["Only SELECT statements are allowed".into()],
        });

        assert_eq!(event.event_type, AuditEventType::ValidationRejected);
        assert_eq!(
            event.errors,
            Some(vec!["Only SELECT statements are allowed".to_string()])
        );
    }

    #[test]
    fn test_log_line_format() {
        let event = AuditEvent::builder(AuditEventType::QueryFailed)
            .sql("SELECT *\nFROM t")
            .path("read_only")
            .error("relation \"t\" does not exist")
            .build();

        let line = event.to_log_line();
        assert!(line.contains("QUERY_FAILED"));
        assert!(line.contains("path=read_only"));
        assert!(line.contains("sql=\"SELECT * FROM t\""));
        assert!(line.contains("error=\"relation 't' does not exist\""));
    }

    #[test]
    fn test_log_line_truncates_long_sql() {
        let sql = format!("SELECT {} FROM t", "é, ".repeat(80));
        let event = AuditEvent::builder(AuditEventType::QueryExecuted)
            .sql(sql)
            .build();

        assert!(event.to_log_line().contains("...\""));
    }

    #[test]
    fn test_optional_fields_skipped() {
        let json = serde_json::to_value(AuditEvent::new(AuditEventType::FallbackUsed)).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("event_id"));
        assert!(!obj.contains_key("sql"));
        assert!(!obj.contains_key("row_count"));
    }
}
