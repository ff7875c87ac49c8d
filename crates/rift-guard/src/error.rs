//! Error types for the guard crate.

use crate::router::ExecutionPath;
use crate::validator::ValidationResult;
use thiserror::Error;

/// Errors raised by a connection or connection provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// A connection could not be borrowed.
    #[error("failed to acquire connection: {0}")]
    Acquire(String),

    /// The database rejected or failed a command.
    #[error("{0}")]
    Database(String),
}

/// Errors raised by the federated catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("catalog lookup failed: {0}")]
pub struct CatalogError(pub String);

/// Errors raised by an observability sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("event sink failed: {0}")]
pub struct SinkError(pub String);

/// Failure of a guarded statement.
///
/// [`GuardError::Rejected`] means the statement never reached the database;
/// every other variant means a transaction was attempted.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The statement failed validation. Never executed, never retried.
    #[error("query rejected: {}", .0.errors().join("; "))]
    Rejected(ValidationResult),

    /// No connection could be borrowed for the statement.
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(ConnectionError),

    /// The statement failed inside its transaction.
    ///
    /// `rollback_error` records a failed rollback; `source` stays the root cause.
    #[error("query failed on {path} path: {source}")]
    ExecutionFailed {
        path: ExecutionPath,
        source: ConnectionError,
        rollback_error: Option<ConnectionError>,
    },

    /// The secure elevated attempt and the fallback attempt both failed.
    ///
    /// Each attempt keeps its own rollback failure, if any.
    #[error("query failed on elevated path ({secure}) and on fallback ({fallback})")]
    FallbackExhausted {
        secure: ConnectionError,
        fallback: ConnectionError,
        secure_rollback_error: Option<ConnectionError>,
        fallback_rollback_error: Option<ConnectionError>,
    },
}

impl GuardError {
    /// True when the statement was refused before execution.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Stable machine-readable kind for clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "rejected",
            Self::ConnectionUnavailable(_) => "connection_unavailable",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::FallbackExhausted { .. } => "fallback_exhausted",
        }
    }

    /// The validation result of a rejection.
    pub fn validation(&self) -> Option<&ValidationResult> {
        match self {
            Self::Rejected(result) => Some(result),
            _ => None,
        }
    }
}
