//! Audit logger implementation.
//!
//! The logger is the router's [`GuardEventSink`]: every routing decision and
//! outcome becomes one stored [`AuditEvent`].

use async_trait::async_trait;
use rift_core::AuditConfig;
use rift_guard::{GuardEvent, GuardEventSink, SinkError};
use std::sync::Arc;

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};

/// The main audit logger.
pub struct AuditLogger {
    enabled: bool,
    storage: Arc<dyn AuditStorage>,
}

impl AuditLogger {
    /// Create a new audit logger with the given configuration.
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        let storage: Arc<dyn AuditStorage> = if !config.enabled {
            Arc::new(NullStorage::new())
        } else {
            match &config.file {
                Some(path) if config.console => Arc::new(DualStorage::new(path)?),
                Some(path) => Arc::new(FileStorage::new(path)?),
                None => Arc::new(ConsoleStorage::new()),
            }
        };

        Ok(Self {
            enabled: config.enabled,
            storage,
        })
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(storage: Arc<dyn AuditStorage>) -> Self {
        Self {
            enabled: true,
            storage,
        }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            storage: Arc::new(NullStorage::new()),
        }
    }

    /// Check if logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log an audit event.
    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        if !self.enabled {
            return Ok(());
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            path = event.path.as_deref().unwrap_or("-"),
            "Audit event"
        );

        self.storage.store(event).await
    }
}

#[async_trait]
impl GuardEventSink for AuditLogger {
    async fn record(&self, event: GuardEvent) -> Result<(), SinkError> {
        self.log(AuditEvent::from(event))
            .await
            .map_err(|e| SinkError(e.to_string()))
    }
}
