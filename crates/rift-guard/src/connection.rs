//! Connection contract the router executes through.
//!
//! The router never owns a pool. It asks a [`ConnectionProvider`] for one
//! connection per statement, drives the transaction on it, and drops it when
//! the statement's lifecycle ends.

use crate::error::ConnectionError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// A result row: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Transaction isolation mode requested from the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    /// `BEGIN TRANSACTION READ ONLY`: no data or metadata mutation possible.
    ReadOnly,
    /// Plain `BEGIN`: needed by Spectrum metadata operations.
    ReadWrite,
}

impl TransactionMode {
    /// The statement that opens a transaction in this mode.
    pub fn begin_statement(&self) -> &'static str {
        match self {
            Self::ReadOnly => "BEGIN TRANSACTION READ ONLY",
            Self::ReadWrite => "BEGIN",
        }
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read_only"),
            Self::ReadWrite => write!(f, "read_write"),
        }
    }
}

/// One borrowed database connection.
///
/// The router guarantees call order: `begin`, then `execute`, then `commit`
/// on success. Any failed step is followed by a single `rollback`.
#[async_trait]
pub trait SqlConnection: Send {
    /// Open a transaction in the given mode.
    async fn begin(&mut self, mode: TransactionMode) -> Result<(), ConnectionError>;

    /// Run a statement inside the open transaction and return its rows.
    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, ConnectionError>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<(), ConnectionError>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> Result<(), ConnectionError>;
}

/// Source of connections, typically a pool.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Borrow a connection for a single statement.
    async fn acquire(&self) -> Result<Box<dyn SqlConnection>, ConnectionError>;
}
