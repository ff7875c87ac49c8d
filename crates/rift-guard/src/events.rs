//! Structured events emitted by the router for audit logging.
//!
//! The sink is injected into the router; the router works the same with no
//! sink at all, and a failing sink is logged and otherwise ignored.

use crate::error::SinkError;
use crate::router::ExecutionPath;
use async_trait::async_trait;
use serde::Serialize;

/// Something the router decided or observed while handling a statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GuardEvent {
    /// The statement failed validation and was not executed.
    ValidationRejected { sql: String, errors: Vec<String> },

    /// The federated catalog could not be consulted; read-only path chosen.
    CatalogLookupFailed { sql: String, table: String, error: String },

    /// A strategy was chosen for the statement.
    StatementClassified {
        sql: String,
        strategy: String,
        tables: Vec<String>,
        federated_tables: Vec<String>,
    },

    /// The elevated attempt failed and the fallback path is being entered.
    FallbackUsed { sql: String, error: String },

    /// A rollback itself failed after an execution failure.
    RollbackFailed {
        sql: String,
        path: ExecutionPath,
        error: String,
    },

    /// The statement committed.
    QueryExecuted {
        sql: String,
        path: ExecutionPath,
        row_count: u64,
        duration_ms: u64,
    },

    /// The statement failed after a transaction was opened.
    QueryFailed {
        sql: String,
        path: ExecutionPath,
        error: String,
        duration_ms: u64,
    },
}

impl GuardEvent {
    /// Short event name, matching the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValidationRejected { .. } => "validation_rejected",
            Self::CatalogLookupFailed { .. } => "catalog_lookup_failed",
            Self::StatementClassified { .. } => "statement_classified",
            Self::FallbackUsed { .. } => "fallback_used",
            Self::RollbackFailed { .. } => "rollback_failed",
            Self::QueryExecuted { .. } => "query_executed",
            Self::QueryFailed { .. } => "query_failed",
        }
    }
}

/// Receiver of router events.
#[async_trait]
pub trait GuardEventSink: Send + Sync {
    async fn record(&self, event: GuardEvent) -> Result<(), SinkError>;
}
