//! # rift-guard
//!
//! Query safety and transaction routing for Redshift.
//!
//! Every statement an assistant submits passes through two components:
//!
//! - **Validator** ([`validator`]): pure pattern checks deciding whether the
//!   text is a single SELECT with no mutating keywords, and whether a
//!   mutation hides inside a subquery or CTE.
//! - **Router** ([`TransactionRouter`]): chooses the least-privileged
//!   transaction mode that can run the statement, executes it, and guarantees
//!   every `BEGIN` ends in a `COMMIT` or `ROLLBACK`.
//!
//! ## Architecture
//!
//! ```text
//!   execute_guarded(sql)
//!         │
//!         ▼
//! ┌───────────────────┐
//! │ validator         │──invalid──▶ GuardError::Rejected
//! └────────┬──────────┘
//!          ▼
//! ┌───────────────────┐
//! │ FederatedCatalog  │  ← svv_external_tables (rift-adapter-pg)
//! └────────┬──────────┘
//!          ▼
//! ┌───────────────────┐
//! │ ConnectionProvider│  ← sqlx pool (rift-adapter-pg)
//! │ READ ONLY | BEGIN │
//! └────────┬──────────┘
//!          ▼
//!   TransactionOutcome { rows, path }
//! ```
//!
//! ## Heuristics
//!
//! Both the validator and table extraction match text, not a parse tree.
//! They over-reject: a keyword inside a string literal or quoted identifier
//! still rejects the statement. A table hidden from extraction stays on the
//! read-only path; a table wrongly extracted only triggers the stricter
//! elevated validation.
//!
//! ## Example
//!
//! ```ignore
//! use rift_guard::TransactionRouter;
//!
//! let router = TransactionRouter::new(provider)
//!     .with_catalog(catalog)
//!     .with_spectrum_enabled(true)
//!     .with_event_sink(audit_logger);
//!
//! let outcome = router.execute_guarded("SELECT * FROM spectrum.events").await?;
//! println!("{} rows via {}", outcome.row_count(), outcome.path);
//! ```

pub mod catalog;
pub mod connection;
pub mod error;
pub mod events;
pub mod references;
pub mod router;
pub mod validator;

pub use catalog::FederatedCatalog;
pub use connection::{ConnectionProvider, Row, SqlConnection, TransactionMode};
pub use error::{CatalogError, ConnectionError, GuardError, SinkError};
pub use events::{GuardEvent, GuardEventSink};
pub use references::{DEFAULT_SCHEMA, TableReference, extract_table_references};
pub use router::{
    Classification, ExecutionPath, ExecutionStrategy, TransactionOutcome, TransactionRouter,
};
pub use validator::{
    ValidationResult, contains_nested_modification, validate, validate_elevated,
    validate_select_only,
};
