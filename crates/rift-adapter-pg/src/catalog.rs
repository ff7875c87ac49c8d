use async_trait::async_trait;
use rift_guard::{CatalogError, FederatedCatalog, TableReference};
use sqlx::PgPool;

/// Federated-table lookup against `svv_external_tables`.
#[derive(Debug, Clone)]
pub struct SpectrumCatalog {
    pool: PgPool,
}

impl SpectrumCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FederatedCatalog for SpectrumCatalog {
    async fn is_federated(&self, table: &TableReference) -> Result<bool, CatalogError> {
        let found: Option<i32> = sqlx::query_scalar(
            r#"
            select 1
            from svv_external_tables
            where schemaname = $1 and tablename = $2
            limit 1
            "#,
        )
        .bind(&table.schema)
        .bind(&table.table)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError(e.to_string()))?;

        Ok(found.is_some())
    }
}
