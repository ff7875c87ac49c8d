//! Router behavior against a spy connection.
//!
//! The spy records every transaction command it receives so tests can assert
//! the exact sequence the router issued.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use rift_guard::{
    CatalogError, ConnectionError, ConnectionProvider, ExecutionPath, ExecutionStrategy,
    FederatedCatalog, GuardError, GuardEvent, GuardEventSink, Row, SinkError, SqlConnection,
    TableReference, TransactionMode, TransactionRouter, contains_nested_modification, validate,
};
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

// =============================================================================
// Spies
// =============================================================================

#[derive(Default)]
struct Script {
    calls: Vec<String>,
    acquires: usize,
    fail_acquire: bool,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
    /// Results for successive `execute` calls; empty means one row.
    executes: VecDeque<Result<Vec<Row>, ConnectionError>>,
}

#[derive(Clone, Default)]
struct SpyProvider {
    script: Arc<Mutex<Script>>,
}

impl SpyProvider {
    fn new() -> Self {
        Self::default()
    }

    fn configure(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    fn acquires(&self) -> usize {
        self.script.lock().unwrap().acquires
    }
}

#[async_trait]
impl ConnectionProvider for SpyProvider {
    async fn acquire(&self) -> Result<Box<dyn SqlConnection>, ConnectionError> {
        let mut script = self.script.lock().unwrap();
        script.acquires += 1;
        if script.fail_acquire {
            return Err(ConnectionError::Acquire("pool timed out".into()));
        }
        Ok(Box::new(SpyConnection {
            script: Arc::clone(&self.script),
        }))
    }
}

struct SpyConnection {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl SqlConnection for SpyConnection {
    async fn begin(&mut self, mode: TransactionMode) -> Result<(), ConnectionError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(mode.begin_statement().to_string());
        if script.fail_begin {
            return Err(ConnectionError::Database("cannot begin".into()));
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, ConnectionError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(format!("EXECUTE {sql}"));
        script
            .executes
            .pop_front()
            .unwrap_or_else(|| Ok(vec![row("name", "alice")]))
    }

    async fn commit(&mut self) -> Result<(), ConnectionError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push("COMMIT".to_string());
        if script.fail_commit {
            return Err(ConnectionError::Database("commit failed".into()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ConnectionError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push("ROLLBACK".to_string());
        if script.fail_rollback {
            return Err(ConnectionError::Database("connection reset".into()));
        }
        Ok(())
    }
}

/// Catalog answering from a fixed set of `schema.table` keys.
struct SetCatalog {
    federated: HashSet<String>,
    lookups: Mutex<Vec<String>>,
}

impl SetCatalog {
    fn new(federated: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            federated: federated.iter().map(|s| s.to_string()).collect(),
            lookups: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl FederatedCatalog for SetCatalog {
    async fn is_federated(&self, table: &TableReference) -> Result<bool, CatalogError> {
        self.lookups.lock().unwrap().push(table.key());
        Ok(self.federated.contains(&table.key()))
    }
}

struct FailingCatalog;

#[async_trait]
impl FederatedCatalog for FailingCatalog {
    async fn is_federated(&self, _table: &TableReference) -> Result<bool, CatalogError> {
        Err(CatalogError("statement timeout".into()))
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<GuardEvent>>,
}

impl RecordingSink {
    fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

#[async_trait]
impl GuardEventSink for RecordingSink {
    async fn record(&self, event: GuardEvent) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

struct BrokenSink;

#[async_trait]
impl GuardEventSink for BrokenSink {
    async fn record(&self, _event: GuardEvent) -> Result<(), SinkError> {
        Err(SinkError("disk full".into()))
    }
}

/// Makes every later acquire fail once the fallback starts.
struct PoolDrainingSink {
    provider: SpyProvider,
}

#[async_trait]
impl GuardEventSink for PoolDrainingSink {
    async fn record(&self, event: GuardEvent) -> Result<(), SinkError> {
        if matches!(event, GuardEvent::FallbackUsed { .. }) {
            self.provider.configure(|s| s.fail_acquire = true);
        }
        Ok(())
    }
}

fn row(column: &str, value: &str) -> Row {
    let mut row = Row::new();
    row.insert(column.to_string(), json!(value));
    row
}

fn router(provider: &SpyProvider) -> TransactionRouter {
    TransactionRouter::new(Arc::new(provider.clone()))
}

fn spectrum_router(provider: &SpyProvider, federated: &[&str]) -> TransactionRouter {
    router(provider)
        .with_catalog(SetCatalog::new(federated))
        .with_spectrum_enabled(true)
}

// =============================================================================
// End-to-end scenarios
// =============================================================================

#[tokio::test]
async fn test_native_select_runs_read_only() {
    let provider = SpyProvider::new();
    let sql = "SELECT name FROM public.users LIMIT 5";

    let outcome = router(&provider).execute_guarded(sql).await.unwrap();

    assert_eq!(outcome.path, ExecutionPath::ReadOnly);
    assert!(outcome.committed);
    assert!(!outcome.fallback_used());
    assert_eq!(outcome.rows, vec![row("name", "alice")]);
    assert_eq!(
        provider.calls(),
        vec![
            "BEGIN TRANSACTION READ ONLY".to_string(),
            format!("EXECUTE {sql}"),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_drop_is_rejected_without_touching_provider() {
    let provider = SpyProvider::new();

    let err = router(&provider)
        .execute_guarded("DROP TABLE users")
        .await
        .unwrap_err();

    assert!(err.is_rejection());
    assert_eq!(err.kind(), "rejected");
    let validation = err.validation().unwrap();
    assert!(!validation.is_valid());
    assert!(
        validation
            .errors()
            .iter()
            .any(|e| e.contains("potentially dangerous pattern"))
    );
    assert_eq!(provider.acquires(), 0);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_federated_select_runs_elevated() {
    let provider = SpyProvider::new();
    let sql = "SELECT * FROM ext_schema.ext_table";

    let outcome = spectrum_router(&provider, &["ext_schema.ext_table"])
        .execute_guarded(sql)
        .await
        .unwrap();

    assert_eq!(outcome.path, ExecutionPath::SecureElevated);
    assert!(!outcome.fallback_used());
    assert_eq!(outcome.row_count(), 1);
    assert_eq!(
        provider.calls(),
        vec![
            "BEGIN".to_string(),
            format!("EXECUTE {sql}"),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_elevated_failure_falls_back() {
    let provider = SpyProvider::new();
    provider.configure(|s| {
        s.executes
            .push_back(Err(ConnectionError::Database("spectrum scan error".into())));
    });
    let sink = Arc::new(RecordingSink::default());
    let sql = "SELECT * FROM ext_schema.ext_table";

    let outcome = spectrum_router(&provider, &["ext_schema.ext_table"])
        .with_event_sink(sink.clone())
        .execute_guarded(sql)
        .await
        .unwrap();

    assert!(outcome.fallback_used());
    assert_eq!(outcome.path, ExecutionPath::Fallback);
    assert_eq!(outcome.row_count(), 1);
    assert_eq!(
        provider.calls(),
        vec![
            "BEGIN".to_string(),
            format!("EXECUTE {sql}"),
            "ROLLBACK".to_string(),
            "BEGIN".to_string(),
            format!("EXECUTE {sql}"),
            "COMMIT".to_string(),
        ]
    );
    // Both attempts share one borrowed connection.
    assert_eq!(provider.acquires(), 1);
    assert_eq!(
        sink.names(),
        vec!["statement_classified", "fallback_used", "query_executed"]
    );
}

// =============================================================================
// Transaction lifecycle
// =============================================================================

#[tokio::test]
async fn test_read_only_failure_rolls_back_once() {
    let provider = SpyProvider::new();
    provider.configure(|s| {
        s.executes
            .push_back(Err(ConnectionError::Database("relation does not exist".into())));
    });

    let err = router(&provider)
        .execute_guarded("SELECT * FROM missing")
        .await
        .unwrap_err();

    assert!(!err.is_rejection());
    assert_eq!(err.kind(), "execution_failed");
    let calls = provider.calls();
    assert_eq!(calls.iter().filter(|c| *c == "ROLLBACK").count(), 1);
    assert!(!calls.contains(&"COMMIT".to_string()));
    assert!(err.to_string().contains("relation does not exist"));
}

#[tokio::test]
async fn test_read_only_failure_does_not_fall_back() {
    let provider = SpyProvider::new();
    provider.configure(|s| {
        s.executes
            .push_back(Err(ConnectionError::Database("syntax error".into())));
    });

    router(&provider)
        .execute_guarded("SELECT 1 FROM t")
        .await
        .unwrap_err();

    let begins = provider
        .calls()
        .iter()
        .filter(|c| c.starts_with("BEGIN"))
        .count();
    assert_eq!(begins, 1);
}

#[tokio::test]
async fn test_rollback_failure_keeps_original_error() {
    let provider = SpyProvider::new();
    provider.configure(|s| {
        s.fail_rollback = true;
        s.executes
            .push_back(Err(ConnectionError::Database("division by zero".into())));
    });
    let sink = Arc::new(RecordingSink::default());

    let err = router(&provider)
        .with_event_sink(sink.clone())
        .execute_guarded("SELECT 1 / 0 FROM t")
        .await
        .unwrap_err();

    match err {
        GuardError::ExecutionFailed {
            path,
            source,
            rollback_error,
        } => {
            assert_eq!(path, ExecutionPath::ReadOnly);
            assert_eq!(source, ConnectionError::Database("division by zero".into()));
            assert_eq!(
                rollback_error,
                Some(ConnectionError::Database("connection reset".into()))
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(sink.names().contains(&"rollback_failed"));
}

#[tokio::test]
async fn test_failed_begin_is_rolled_back() {
    let provider = SpyProvider::new();
    provider.configure(|s| s.fail_begin = true);

    let err = router(&provider)
        .execute_guarded("SELECT 1 FROM t")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "execution_failed");
    assert_eq!(
        provider.calls(),
        vec![
            "BEGIN TRANSACTION READ ONLY".to_string(),
            "ROLLBACK".to_string()
        ]
    );
}

#[tokio::test]
async fn test_failed_commit_is_rolled_back() {
    let provider = SpyProvider::new();
    provider.configure(|s| s.fail_commit = true);

    let err = router(&provider)
        .execute_guarded("SELECT 1 FROM t")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "execution_failed");
    assert_eq!(provider.calls().last().map(String::as_str), Some("ROLLBACK"));
}

#[tokio::test]
async fn test_both_elevated_attempts_fail() {
    let provider = SpyProvider::new();
    provider.configure(|s| {
        s.executes
            .push_back(Err(ConnectionError::Database("first".into())));
        s.executes
            .push_back(Err(ConnectionError::Database("second".into())));
    });

    let err = spectrum_router(&provider, &["spectrum.events"])
        .execute_guarded("SELECT * FROM spectrum.events")
        .await
        .unwrap_err();

    match err {
        GuardError::FallbackExhausted {
            secure,
            fallback,
            secure_rollback_error,
            fallback_rollback_error,
        } => {
            assert_eq!(secure, ConnectionError::Database("first".into()));
            assert_eq!(fallback, ConnectionError::Database("second".into()));
            assert_eq!(secure_rollback_error, None);
            assert_eq!(fallback_rollback_error, None);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let calls = provider.calls();
    assert_eq!(calls.iter().filter(|c| *c == "ROLLBACK").count(), 2);
    assert!(!calls.contains(&"COMMIT".to_string()));
}

#[tokio::test]
async fn test_fallback_borrows_fresh_connection_after_failed_rollback() {
    let provider = SpyProvider::new();
    provider.configure(|s| {
        s.fail_rollback = true;
        s.executes
            .push_back(Err(ConnectionError::Database("first".into())));
    });
    let sql = "SELECT * FROM spectrum.events";

    let outcome = spectrum_router(&provider, &["spectrum.events"])
        .execute_guarded(sql)
        .await
        .unwrap();

    assert_eq!(outcome.path, ExecutionPath::Fallback);
    assert_eq!(provider.acquires(), 2);
    assert_eq!(
        provider.calls(),
        vec![
            "BEGIN".to_string(),
            format!("EXECUTE {sql}"),
            "ROLLBACK".to_string(),
            "BEGIN".to_string(),
            format!("EXECUTE {sql}"),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_exhausted_fallback_keeps_both_rollback_failures() {
    let provider = SpyProvider::new();
    provider.configure(|s| {
        s.fail_rollback = true;
        s.executes
            .push_back(Err(ConnectionError::Database("first".into())));
        s.executes
            .push_back(Err(ConnectionError::Database("second".into())));
    });

    let err = spectrum_router(&provider, &["spectrum.events"])
        .execute_guarded("SELECT * FROM spectrum.events")
        .await
        .unwrap_err();

    let reset = Some(ConnectionError::Database("connection reset".into()));
    match err {
        GuardError::FallbackExhausted {
            secure,
            fallback,
            secure_rollback_error,
            fallback_rollback_error,
        } => {
            assert_eq!(secure, ConnectionError::Database("first".into()));
            assert_eq!(fallback, ConnectionError::Database("second".into()));
            assert_eq!(secure_rollback_error, reset);
            assert_eq!(fallback_rollback_error, reset);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(provider.acquires(), 2);
}

#[tokio::test]
async fn test_fallback_acquire_failure_exhausts_fallback() {
    let provider = SpyProvider::new();
    provider.configure(|s| {
        s.fail_rollback = true;
        s.executes
            .push_back(Err(ConnectionError::Database("first".into())));
    });
    let sink = Arc::new(PoolDrainingSink {
        provider: provider.clone(),
    });

    let err = spectrum_router(&provider, &["spectrum.events"])
        .with_event_sink(sink)
        .execute_guarded("SELECT * FROM spectrum.events")
        .await
        .unwrap_err();

    match err {
        GuardError::FallbackExhausted {
            secure,
            fallback,
            secure_rollback_error,
            fallback_rollback_error,
        } => {
            assert_eq!(secure, ConnectionError::Database("first".into()));
            assert!(matches!(fallback, ConnectionError::Acquire(_)));
            assert!(secure_rollback_error.is_some());
            assert_eq!(fallback_rollback_error, None);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(provider.acquires(), 2);
}

#[tokio::test]
async fn test_acquire_failure_is_connection_unavailable() {
    let provider = SpyProvider::new();
    provider.configure(|s| s.fail_acquire = true);

    let err = router(&provider)
        .execute_guarded("SELECT 1 FROM t")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "connection_unavailable");
    assert_eq!(provider.acquires(), 1);
    assert!(provider.calls().is_empty());
}

// =============================================================================
// Classification
// =============================================================================

#[tokio::test]
async fn test_catalog_failure_falls_back_to_read_only() {
    let provider = SpyProvider::new();
    let sink = Arc::new(RecordingSink::default());

    let outcome = router(&provider)
        .with_catalog(Arc::new(FailingCatalog))
        .with_spectrum_enabled(true)
        .with_event_sink(sink.clone())
        .execute_guarded("SELECT * FROM spectrum.events")
        .await
        .unwrap();

    assert_eq!(outcome.path, ExecutionPath::ReadOnly);
    assert_eq!(provider.calls()[0], "BEGIN TRANSACTION READ ONLY");
    assert!(sink.names().contains(&"catalog_lookup_failed"));
}

#[tokio::test]
async fn test_spectrum_disabled_skips_catalog() {
    let provider = SpyProvider::new();
    let catalog = SetCatalog::new(&["spectrum.events"]);

    let outcome = router(&provider)
        .with_catalog(catalog.clone())
        .execute_guarded("SELECT * FROM spectrum.events")
        .await
        .unwrap();

    assert_eq!(outcome.path, ExecutionPath::ReadOnly);
    assert!(catalog.lookups.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_spectrum_enabled_without_catalog_is_read_only() {
    let provider = SpyProvider::new();

    let strategy = router(&provider)
        .with_spectrum_enabled(true)
        .plan("SELECT * FROM spectrum.events")
        .await;

    assert_eq!(strategy, ExecutionStrategy::ReadOnly);
}

#[tokio::test]
async fn test_one_federated_table_escalates_join() {
    let provider = SpyProvider::new();
    let catalog = SetCatalog::new(&["spectrum.clicks"]);
    let router = router(&provider)
        .with_catalog(catalog.clone())
        .with_spectrum_enabled(true);

    let classification = router
        .classify("SELECT u.id FROM users u JOIN spectrum.clicks c ON c.uid = u.id")
        .await;

    assert!(classification.is_federated());
    assert_eq!(
        classification.federated,
        vec![TableReference::new("spectrum", "clicks")]
    );
    let mut lookups = catalog.lookups.lock().unwrap().clone();
    lookups.sort();
    assert_eq!(lookups, vec!["public.users", "spectrum.clicks"]);
}

#[tokio::test]
async fn test_catalog_is_asked_once_per_unique_table() {
    let provider = SpyProvider::new();
    let catalog = SetCatalog::new(&[]);
    let router = router(&provider)
        .with_catalog(catalog.clone())
        .with_spectrum_enabled(true);

    router
        .classify("SELECT * FROM sales a JOIN sales b ON a.id = b.id JOIN public.sales c ON true")
        .await;

    assert_eq!(*catalog.lookups.lock().unwrap(), vec!["public.sales"]);
}

#[tokio::test]
async fn test_rejected_plan_never_begins() {
    let provider = SpyProvider::new();
    let router = spectrum_router(&provider, &["ext.t"]);

    for sql in [
        "DELETE FROM ext.t",
        "SELECT * FROM ext.t; DROP TABLE ext.t",
        "WITH x AS (DELETE FROM ext.t RETURNING *) SELECT * FROM x",
        "SELECT * FROM (INSERT INTO ext.t VALUES (1))",
        "GRANT SELECT ON ext.t TO bob",
    ] {
        let err = router.execute_guarded(sql).await.unwrap_err();
        assert!(err.is_rejection(), "expected rejection for {sql}");
    }

    assert_eq!(provider.acquires(), 0);
    assert!(!provider.calls().iter().any(|c| c.starts_with("BEGIN")));
}

#[tokio::test]
async fn test_plan_reports_strategy() {
    let provider = SpyProvider::new();
    let router = spectrum_router(&provider, &["ext.t"]);

    assert_eq!(
        router.plan("SELECT * FROM ext.t").await,
        ExecutionStrategy::ControlledReadWrite
    );
    assert_eq!(
        router.plan("SELECT * FROM local_table").await,
        ExecutionStrategy::ReadOnly
    );
    assert!(matches!(
        router.plan("UPDATE ext.t SET a = 1").await,
        ExecutionStrategy::Rejected(_)
    ));
    assert_eq!(provider.acquires(), 0);
}

#[tokio::test]
async fn test_nested_mutation_on_federated_table_is_rejected_before_classification() {
    let provider = SpyProvider::new();
    let catalog = SetCatalog::new(&["spectrum.events"]);
    let router = router(&provider)
        .with_catalog(catalog.clone())
        .with_spectrum_enabled(true);
    let sql = "SELECT * FROM spectrum.events WHERE id IN (DELETE FROM spectrum.events RETURNING id)";

    // The nested check only adds to the elevated verdict; the first
    // validation already refuses the mutation keyword.
    assert!(contains_nested_modification(sql));
    assert_eq!(router.plan(sql).await, ExecutionStrategy::Rejected(validate(sql)));
    assert!(catalog.lookups.lock().unwrap().is_empty());
    assert_eq!(provider.acquires(), 0);
}

// =============================================================================
// Observability
// =============================================================================

#[tokio::test]
async fn test_rejection_is_recorded() {
    let provider = SpyProvider::new();
    let sink = Arc::new(RecordingSink::default());

    router(&provider)
        .with_event_sink(sink.clone())
        .execute_guarded("TRUNCATE users")
        .await
        .unwrap_err();

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        GuardEvent::ValidationRejected { sql, errors } => {
            assert_eq!(sql, "TRUNCATE users");
            assert!(!errors.is_empty());
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_classification_event_lists_tables() {
    let provider = SpyProvider::new();
    let sink = Arc::new(RecordingSink::default());

    spectrum_router(&provider, &["ext.t"])
        .with_event_sink(sink.clone())
        .execute_guarded("SELECT * FROM ext.t JOIN dim d ON true")
        .await
        .unwrap();

    let events = sink.events.lock().unwrap();
    match &events[0] {
        GuardEvent::StatementClassified {
            strategy,
            tables,
            federated_tables,
            ..
        } => {
            assert_eq!(strategy, "controlled_read_write");
            assert_eq!(tables, &vec!["ext.t".to_string(), "public.dim".to_string()]);
            assert_eq!(federated_tables, &vec!["ext.t".to_string()]);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_broken_sink_does_not_affect_execution() {
    let provider = SpyProvider::new();

    let outcome = router(&provider)
        .with_event_sink(Arc::new(BrokenSink))
        .execute_guarded("SELECT 1 FROM t")
        .await
        .unwrap();

    assert!(outcome.committed);

    let err = router(&provider)
        .with_event_sink(Arc::new(BrokenSink))
        .execute_guarded("DROP TABLE t")
        .await
        .unwrap_err();

    assert!(err.is_rejection());
}

#[tokio::test]
async fn test_concurrent_statements_use_separate_connections() {
    let provider = SpyProvider::new();
    let router = Arc::new(router(&provider));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                router
                    .execute_guarded(&format!("SELECT {i} FROM t"))
                    .await
                    .map(|o| o.path)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), ExecutionPath::ReadOnly);
    }
    assert_eq!(provider.acquires(), 8);
    let calls = provider.calls();
    assert_eq!(calls.iter().filter(|c| *c == "COMMIT").count(), 8);
    assert!(!calls.contains(&"ROLLBACK".to_string()));
}
