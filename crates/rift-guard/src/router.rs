//! Transaction routing for validated statements.
//!
//! Every statement goes through the same sequence:
//!
//! ```text
//! validate ──invalid──▶ Rejected (no connection touched)
//!    │
//!    ▼
//! classify ──spectrum disabled / no federated table / lookup failed──▶ READ ONLY path
//!    │
//!    └─federated──▶ re-validate + nested-mutation check ──fail──▶ Rejected
//!                        │
//!                        ▼
//!                  SECURE ELEVATED path (read-write) ──fail, rolled back──▶ FALLBACK path
//! ```
//!
//! The fallback reuses the borrowed connection unless the elevated attempt's
//! rollback failed, in which case it borrows a fresh one.
//!
//! Each path opens exactly one transaction per attempt and ends it with a
//! `COMMIT` or a `ROLLBACK` before control returns; no transaction outlives
//! the call that opened it.

use crate::catalog::FederatedCatalog;
use crate::connection::{ConnectionProvider, Row, SqlConnection, TransactionMode};
use crate::error::{ConnectionError, GuardError};
use crate::events::{GuardEvent, GuardEventSink};
use crate::references::{TableReference, extract_table_references};
use crate::validator::{self, ValidationResult};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Strategy chosen for a statement before any connection is borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Run inside `BEGIN TRANSACTION READ ONLY`.
    ReadOnly,
    /// Run inside a single-statement read-write transaction (Spectrum).
    ControlledReadWrite,
    /// Refuse to run.
    Rejected(ValidationResult),
}

impl ExecutionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::ControlledReadWrite => "controlled_read_write",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// The path a statement actually executed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    ReadOnly,
    SecureElevated,
    Fallback,
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read_only"),
            Self::SecureElevated => write!(f, "secure_elevated"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Rows of a committed statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionOutcome {
    pub rows: Vec<Row>,
    pub committed: bool,
    pub path: ExecutionPath,
}

impl TransactionOutcome {
    /// True when the secure elevated attempt failed and the fallback served the rows.
    pub fn fallback_used(&self) -> bool {
        self.path == ExecutionPath::Fallback
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Result of asking the catalog about a statement's tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Every table reference extracted from the statement.
    pub tables: Vec<TableReference>,
    /// The references the catalog reported as federated.
    pub federated: Vec<TableReference>,
}

impl Classification {
    pub fn is_federated(&self) -> bool {
        !self.federated.is_empty()
    }
}

/// A failed transaction attempt, after its rollback was tried.
struct AttemptFailure {
    source: ConnectionError,
    rollback_error: Option<ConnectionError>,
}

/// Routes statements to the least-privileged transaction mode that can run them.
///
/// Holds no per-statement state; one router is shared by all requests.
pub struct TransactionRouter {
    provider: Arc<dyn ConnectionProvider>,
    catalog: Option<Arc<dyn FederatedCatalog>>,
    spectrum_enabled: bool,
    sink: Option<Arc<dyn GuardEventSink>>,
}

impl TransactionRouter {
    /// Create a router with Spectrum support disabled.
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            catalog: None,
            spectrum_enabled: false,
            sink: None,
        }
    }

    /// Set the federated-table catalog.
    pub fn with_catalog(mut self, catalog: Arc<dyn FederatedCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Enable or disable Spectrum (federated table) support.
    pub fn with_spectrum_enabled(mut self, enabled: bool) -> Self {
        self.spectrum_enabled = enabled;
        self
    }

    /// Set the observability sink.
    pub fn with_event_sink(mut self, sink: Arc<dyn GuardEventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn spectrum_enabled(&self) -> bool {
        self.spectrum_enabled
    }

    /// Validate and execute a statement under the matching transaction mode.
    pub async fn execute_guarded(&self, sql: &str) -> Result<TransactionOutcome, GuardError> {
        match self.plan(sql).await {
            ExecutionStrategy::Rejected(validation) => Err(GuardError::Rejected(validation)),
            ExecutionStrategy::ReadOnly => self.run_read_only(sql).await,
            ExecutionStrategy::ControlledReadWrite => self.run_elevated(sql).await,
        }
    }

    /// Choose the strategy for a statement without executing it.
    ///
    /// May consult the federated catalog, but never borrows a connection.
    pub async fn plan(&self, sql: &str) -> ExecutionStrategy {
        let validation = validator::validate(sql);
        if !validation.is_valid() {
            self.reject(sql, validation.clone()).await;
            return ExecutionStrategy::Rejected(validation);
        }

        let classification = self.classify(sql).await;

        let strategy = if classification.is_federated() {
            // Read-write requires both checks to pass again. `validate` above
            // already rejects every mutation keyword, so this branch only
            // fires if the two checks ever diverge.
            let select_only = validator::validate_select_only(sql);
            let nested = validator::contains_nested_modification(sql);
            if select_only && !nested {
                ExecutionStrategy::ControlledReadWrite
            } else {
                let elevated = validator::validate_elevated(sql);
                self.reject(sql, elevated.clone()).await;
                return ExecutionStrategy::Rejected(elevated);
            }
        } else {
            ExecutionStrategy::ReadOnly
        };

        tracing::info!(
            strategy = strategy.name(),
            tables = classification.tables.len(),
            federated = classification.federated.len(),
            "Statement classified"
        );
        self.emit(GuardEvent::StatementClassified {
            sql: sql.to_string(),
            strategy: strategy.name().to_string(),
            tables: classification.tables.iter().map(TableReference::key).collect(),
            federated_tables: classification
                .federated
                .iter()
                .map(TableReference::key)
                .collect(),
        })
        .await;

        strategy
    }

    /// Find the federated tables a statement references.
    ///
    /// Returns an empty `federated` list when Spectrum support is disabled, no
    /// catalog is configured, or any lookup fails.
    pub async fn classify(&self, sql: &str) -> Classification {
        if !self.spectrum_enabled {
            return Classification::default();
        }

        let tables = extract_table_references(sql);
        let Some(catalog) = &self.catalog else {
            tracing::debug!("Spectrum enabled without a catalog; treating statement as native");
            return Classification {
                tables,
                federated: Vec::new(),
            };
        };

        let mut federated = Vec::new();
        for table in &tables {
            match catalog.is_federated(table).await {
                Ok(true) => federated.push(table.clone()),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        table = %table,
                        error = %e,
                        "Federated catalog lookup failed; using read-only path"
                    );
                    self.emit(GuardEvent::CatalogLookupFailed {
                        sql: sql.to_string(),
                        table: table.key(),
                        error: e.to_string(),
                    })
                    .await;
                    return Classification {
                        tables,
                        federated: Vec::new(),
                    };
                }
            }
        }

        Classification { tables, federated }
    }

    async fn run_read_only(&self, sql: &str) -> Result<TransactionOutcome, GuardError> {
        let path = ExecutionPath::ReadOnly;
        let started = Instant::now();
        let mut conn = self.acquire(sql, path, started).await?;

        match self
            .attempt(conn.as_mut(), TransactionMode::ReadOnly, path, sql)
            .await
        {
            Ok(rows) => Ok(self.finish(sql, path, rows, started).await),
            Err(failure) => {
                self.failed(sql, path, &failure.source, started).await;
                Err(GuardError::ExecutionFailed {
                    path,
                    source: failure.source,
                    rollback_error: failure.rollback_error,
                })
            }
        }
    }

    async fn run_elevated(&self, sql: &str) -> Result<TransactionOutcome, GuardError> {
        let started = Instant::now();
        let mut conn = self
            .acquire(sql, ExecutionPath::SecureElevated, started)
            .await?;

        let secure = match self
            .attempt(
                conn.as_mut(),
                TransactionMode::ReadWrite,
                ExecutionPath::SecureElevated,
                sql,
            )
            .await
        {
            Ok(rows) => {
                return Ok(self
                    .finish(sql, ExecutionPath::SecureElevated, rows, started)
                    .await);
            }
            Err(failure) => failure,
        };

        // The elevated attempt has been rolled back; the fallback is a fresh
        // transaction, not a retry of the same one.
        tracing::warn!(
            error = %secure.source,
            "Secure elevated execution failed; trying fallback transaction"
        );
        self.emit(GuardEvent::FallbackUsed {
            sql: sql.to_string(),
            error: secure.source.to_string(),
        })
        .await;

        // A connection whose rollback failed may still be inside the aborted
        // transaction; the fallback needs a clean one.
        if secure.rollback_error.is_some() {
            drop(conn);
            conn = match self.provider.acquire().await {
                Ok(fresh) => fresh,
                Err(e) => {
                    self.failed(sql, ExecutionPath::Fallback, &e, started).await;
                    return Err(GuardError::FallbackExhausted {
                        secure: secure.source,
                        fallback: e,
                        secure_rollback_error: secure.rollback_error,
                        fallback_rollback_error: None,
                    });
                }
            };
        }

        match self
            .attempt(
                conn.as_mut(),
                TransactionMode::ReadWrite,
                ExecutionPath::Fallback,
                sql,
            )
            .await
        {
            Ok(rows) => Ok(self.finish(sql, ExecutionPath::Fallback, rows, started).await),
            Err(fallback) => {
                self.failed(sql, ExecutionPath::Fallback, &fallback.source, started)
                    .await;
                Err(GuardError::FallbackExhausted {
                    secure: secure.source,
                    fallback: fallback.source,
                    secure_rollback_error: secure.rollback_error,
                    fallback_rollback_error: fallback.rollback_error,
                })
            }
        }
    }

    /// One transaction: begin, execute, commit. Any failure rolls back.
    async fn attempt(
        &self,
        conn: &mut dyn SqlConnection,
        mode: TransactionMode,
        path: ExecutionPath,
        sql: &str,
    ) -> Result<Vec<Row>, AttemptFailure> {
        if let Err(e) = conn.begin(mode).await {
            return Err(self.roll_back(conn, path, sql, e).await);
        }

        let rows = match conn.execute(sql).await {
            Ok(rows) => rows,
            Err(e) => return Err(self.roll_back(conn, path, sql, e).await),
        };

        if let Err(e) = conn.commit().await {
            return Err(self.roll_back(conn, path, sql, e).await);
        }

        Ok(rows)
    }

    /// Roll back after `source`; a rollback failure is logged, never surfaced
    /// in place of `source`.
    async fn roll_back(
        &self,
        conn: &mut dyn SqlConnection,
        path: ExecutionPath,
        sql: &str,
        source: ConnectionError,
    ) -> AttemptFailure {
        let rollback_error = match conn.rollback().await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(
                    path = %path,
                    error = %e,
                    original_error = %source,
                    "Rollback failed"
                );
                self.emit(GuardEvent::RollbackFailed {
                    sql: sql.to_string(),
                    path,
                    error: e.to_string(),
                })
                .await;
                Some(e)
            }
        };

        AttemptFailure {
            source,
            rollback_error,
        }
    }

    async fn acquire(
        &self,
        sql: &str,
        path: ExecutionPath,
        started: Instant,
    ) -> Result<Box<dyn SqlConnection>, GuardError> {
        match self.provider.acquire().await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                self.failed(sql, path, &e, started).await;
                Err(GuardError::ConnectionUnavailable(e))
            }
        }
    }

    async fn finish(
        &self,
        sql: &str,
        path: ExecutionPath,
        rows: Vec<Row>,
        started: Instant,
    ) -> TransactionOutcome {
        let duration_ms = elapsed_ms(started);
        tracing::debug!(path = %path, rows = rows.len(), duration_ms, "Statement committed");
        self.emit(GuardEvent::QueryExecuted {
            sql: sql.to_string(),
            path,
            row_count: rows.len() as u64,
            duration_ms,
        })
        .await;

        TransactionOutcome {
            rows,
            committed: true,
            path,
        }
    }

    async fn failed(&self, sql: &str, path: ExecutionPath, error: &ConnectionError, started: Instant) {
        tracing::warn!(path = %path, error = %error, "Statement failed");
        self.emit(GuardEvent::QueryFailed {
            sql: sql.to_string(),
            path,
            error: error.to_string(),
            duration_ms: elapsed_ms(started),
        })
        .await;
    }

    async fn reject(&self, sql: &str, validation: ValidationResult) {
        tracing::warn!(errors = ?validation.errors(), "Statement rejected by validation");
        self.emit(GuardEvent::ValidationRejected {
            sql: sql.to_string(),
            errors: validation.errors().to_vec(),
        })
        .await;
    }

    async fn emit(&self, event: GuardEvent) {
        if let Some(sink) = &self.sink {
            let name = event.name();
            if let Err(e) = sink.record(event).await {
                tracing::warn!(event = name, error = %e, "Failed to record guard event");
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
