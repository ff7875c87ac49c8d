//! # rift-audit
//!
//! Audit logging for the Rift MCP server.
//!
//! [`AuditLogger`] implements the router's event sink, turning each routing
//! decision and outcome into an [`AuditEvent`]:
//!
//! - **File output**: JSON Lines (one JSON object per line)
//! - **Console output**: human-readable lines on stderr
//!
//! ## Event Types
//!
//! | Event Type | Description |
//! |------------|-------------|
//! | `StatementClassified` | A transaction strategy was chosen |
//! | `ValidationRejected` | Statement refused before execution |
//! | `CatalogLookupFailed` | Federated catalog unavailable; read-only path used |
//! | `QueryExecuted` | Statement committed |
//! | `QueryFailed` | Statement failed |
//! | `FallbackUsed` | Elevated attempt failed; fallback transaction ran |
//! | `RollbackFailed` | Rollback itself failed |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rift_audit::AuditLogger;
//! use rift_core::AuditConfig;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = Arc::new(AuditLogger::new(&AuditConfig::default())?);
//! // router.with_event_sink(logger)
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType};
pub use logger::AuditLogger;
pub use storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};
