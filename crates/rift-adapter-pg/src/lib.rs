//! Redshift adapter over the Postgres wire protocol.
//!
//! Provides the pooled [`PgConnectionProvider`] the router executes through,
//! the [`SpectrumCatalog`] federated-table lookup, and the
//! [`RedshiftIntrospector`] behind the metadata tools.

use rift_core::UpstreamConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

pub mod catalog;
pub mod connection;
pub mod introspect;

pub use catalog::SpectrumCatalog;
pub use connection::{PgConnectionProvider, PgSqlConnection, row_to_json};
pub use introspect::{RedshiftIntrospector, SYSTEM_SCHEMAS};

/// Pool options derived from the upstream pool configuration.
pub fn pool_options(config: &UpstreamConfig) -> PgPoolOptions {
    let pool = &config.pool;
    PgPoolOptions::new()
        .min_connections(pool.min_connections)
        .max_connections(pool.max_connections)
        .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(pool.idle_timeout_secs)))
}

/// Open a connection pool to the configured cluster.
pub async fn connect(config: &UpstreamConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!(cluster = %config.redacted_target(), "Connecting to Redshift");
    pool_options(config)
        .connect(&config.connection_string())
        .await
}

/// Create a pool that connects on first use.
pub fn connect_lazy(config: &UpstreamConfig) -> Result<PgPool, sqlx::Error> {
    pool_options(config).connect_lazy(&config.connection_string())
}
