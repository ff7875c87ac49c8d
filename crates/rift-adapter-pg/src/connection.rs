//! Pooled connections implementing the router's connection contract.

use async_trait::async_trait;
use rift_guard::{ConnectionError, ConnectionProvider, Row, SqlConnection, TransactionMode};
use serde_json::{Value, json};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgConnection, PgPool, Postgres, Row as _, TypeInfo};

/// Hands out one pooled connection per statement.
#[derive(Debug, Clone)]
pub struct PgConnectionProvider {
    pool: PgPool,
}

impl PgConnectionProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionProvider for PgConnectionProvider {
    async fn acquire(&self) -> Result<Box<dyn SqlConnection>, ConnectionError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| ConnectionError::Acquire(e.to_string()))?;
        Ok(Box::new(PgSqlConnection::new(conn)))
    }
}

/// A borrowed connection driven with explicit transaction statements.
///
/// A connection dropped while a transaction may still be open is detached
/// from the pool and closed instead of being handed to the next request.
pub struct PgSqlConnection {
    conn: Option<PoolConnection<Postgres>>,
    in_transaction: bool,
}

impl PgSqlConnection {
    pub fn new(conn: PoolConnection<Postgres>) -> Self {
        Self {
            conn: Some(conn),
            in_transaction: false,
        }
    }

    fn conn(&mut self) -> Result<&mut PgConnection, ConnectionError> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| ConnectionError::Database("connection already closed".to_string()))
    }

    async fn run(&mut self, statement: &'static str) -> Result<(), ConnectionError> {
        let conn = self.conn()?;
        sqlx::Executor::execute(conn, sqlx::raw_sql(statement))
            .await
            .map_err(database_error)?;
        Ok(())
    }
}

#[async_trait]
impl SqlConnection for PgSqlConnection {
    async fn begin(&mut self, mode: TransactionMode) -> Result<(), ConnectionError> {
        // Assume a transaction is open until a COMMIT or ROLLBACK succeeds.
        self.in_transaction = true;
        self.run(mode.begin_statement()).await
    }

    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, ConnectionError> {
        let conn = self.conn()?;
        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(database_error)?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn commit(&mut self) -> Result<(), ConnectionError> {
        self.run("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ConnectionError> {
        self.run("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }
}

impl Drop for PgSqlConnection {
    fn drop(&mut self) {
        if self.in_transaction
            && let Some(conn) = self.conn.take()
        {
            tracing::warn!("Closing connection with a possibly open transaction");
            drop(conn.detach());
        }
    }
}

fn database_error(e: sqlx::Error) -> ConnectionError {
    match e {
        sqlx::Error::Database(db) => ConnectionError::Database(db.message().to_string()),
        other => ConnectionError::Database(other.to_string()),
    }
}

/// Convert a row into a JSON object keyed by column name.
pub fn row_to_json(row: &PgRow) -> Row {
    let mut obj = Row::new();

    for col in row.columns() {
        let value = decode_column(row, col.ordinal(), col.type_info().name());
        obj.insert(col.name().to_string(), value);
    }

    obj
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Value {
    let decoded: Result<Option<Value>, sqlx::Error> = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map(|v| v.map(Value::from)),
        "INT2" => row.try_get::<Option<i16>, _>(idx).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(idx).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(|v| v.map(Value::from)),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx).map(|v| v.map(Value::from)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map(|v| v.map(Value::from)),
        // Kept as text so DECIMAL(38, x) values do not lose precision.
        "NUMERIC" => row
            .try_get::<Option<bigdecimal::BigDecimal>, _>(idx)
            .map(|v| v.map(|d| json!(d.to_string()))),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .map(|v| v.map(|d| json!(d.to_string()))),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(idx)
            .map(|v| v.map(|t| json!(t.to_string()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .map(|v| v.map(|t| json!(t.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map(|v| v.map(|t| json!(t.to_rfc3339()))),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .map(|v| v.map(|u| json!(u.to_string()))),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx),
        _ => row.try_get::<Option<String>, _>(idx).map(|v| v.map(Value::from)),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => Value::Null,
        Err(e) => {
            // SUPER, GEOMETRY and other Redshift types without a decoder.
            tracing::debug!(column = idx, type_name, error = %e, "Undecodable column, returning null");
            Value::Null
        }
    }
}
