//! Federated-table catalog contract.

use crate::error::CatalogError;
use crate::references::TableReference;
use async_trait::async_trait;

/// Answers whether a table is externally federated (a Spectrum table).
///
/// Implementations may fail; the router treats any failure as "not
/// federated" so that an unprovable answer never grants write access.
#[async_trait]
pub trait FederatedCatalog: Send + Sync {
    async fn is_federated(&self, table: &TableReference) -> Result<bool, CatalogError>;
}
