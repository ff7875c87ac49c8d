//! Catalog introspection through Redshift system views.
//!
//! All queries bind user input as parameters. System schemas are excluded
//! from listings and column searches.

use async_trait::async_trait;
use rift_core::{
    ColumnInfo, MetadataError, MetadataSource, SchemaInfo, SchemaKind, TableInfo, TableStatistics,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Schemas that hold catalog or internal objects, never user data.
pub const SYSTEM_SCHEMAS: &[&str] = &[
    "pg_catalog",
    "information_schema",
    "pg_internal",
    "pg_automv",
    "pg_auto_copy",
    "pg_mv",
    "pg_s3",
];

/// Maximum rows returned by a column search.
const FIND_COLUMN_LIMIT: u32 = 500;

/// [`MetadataSource`] backed by `svv_*` system views.
#[derive(Debug, Clone)]
pub struct RedshiftIntrospector {
    pool: PgPool,
}

impl RedshiftIntrospector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `SYSTEM_SCHEMAS` as a SQL list literal.
///
/// Redshift has no array parameters, so the constant list is inlined.
fn system_schema_list() -> String {
    SYSTEM_SCHEMAS
        .iter()
        .map(|s| format!("'{}'", s))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turn a user search term into an `ILIKE` pattern.
///
/// Terms without `%` or `_` match anywhere in the column name.
pub fn like_pattern(term: &str) -> String {
    if term.contains('%') || term.contains('_') {
        term.to_string()
    } else {
        format!("%{}%", term)
    }
}

fn query_error(e: sqlx::Error) -> MetadataError {
    MetadataError::Query(e.to_string())
}

fn column_from_row(row: &PgRow) -> Result<ColumnInfo, sqlx::Error> {
    let is_nullable: String = row.try_get("is_nullable")?;
    Ok(ColumnInfo {
        schema: row.try_get("table_schema")?,
        table: row.try_get("table_name")?,
        name: row.try_get("column_name")?,
        data_type: row.try_get("data_type")?,
        ordinal: row.try_get("ordinal_position")?,
        nullable: is_nullable.eq_ignore_ascii_case("yes"),
    })
}

fn statistics_from_row(
    schema: &str,
    table: &str,
    row: &PgRow,
) -> Result<TableStatistics, sqlx::Error> {
    Ok(TableStatistics {
        schema: schema.to_string(),
        table: table.to_string(),
        row_estimate: row.try_get("row_estimate")?,
        size_mb: row.try_get("size_mb")?,
        dist_style: row.try_get("diststyle")?,
        sort_key: row.try_get("sortkey1")?,
        unsorted_pct: row.try_get("unsorted_pct")?,
        stats_off: row.try_get("stats_off")?,
    })
}

#[async_trait]
impl MetadataSource for RedshiftIntrospector {
    async fn list_schemas(&self) -> Result<Vec<SchemaInfo>, MetadataError> {
        let sql = format!(
            r#"
            select schema_name, cast(schema_owner as varchar) as schema_owner, schema_type
            from svv_all_schemas
            where database_name = current_database()
              and schema_name not in ({})
            order by schema_name
            "#,
            system_schema_list()
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                let schema_type: String = row.try_get("schema_type")?;
                Ok(SchemaInfo {
                    name: row.try_get("schema_name")?,
                    owner: row.try_get("schema_owner")?,
                    kind: if schema_type.eq_ignore_ascii_case("external") {
                        SchemaKind::External
                    } else {
                        SchemaKind::Local
                    },
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(query_error)
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<TableInfo>, MetadataError> {
        let rows = sqlx::query(
            r#"
            select table_schema, table_name, table_type
            from svv_tables
            where table_schema = $1
            order by table_name
            "#,
        )
        .bind(schema)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                let table_type: String = row.try_get("table_type")?;
                Ok(TableInfo {
                    schema: row.try_get("table_schema")?,
                    name: row.try_get("table_name")?,
                    is_external: table_type.eq_ignore_ascii_case("EXTERNAL TABLE"),
                    table_type,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(query_error)
    }

    async fn describe_table(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, MetadataError> {
        let rows = sqlx::query(
            r#"
            select table_schema, table_name, column_name, data_type,
                   cast(ordinal_position as integer) as ordinal_position, is_nullable
            from svv_columns
            where table_schema = $1 and table_name = $2
            order by ordinal_position
            "#,
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        if rows.is_empty() {
            return Err(MetadataError::TableNotFound {
                schema: schema.to_string(),
                table: table.to_string(),
            });
        }

        rows.iter()
            .map(column_from_row)
            .collect::<Result<_, _>>()
            .map_err(query_error)
    }

    async fn find_column(&self, pattern: &str) -> Result<Vec<ColumnInfo>, MetadataError> {
        let sql = format!(
            r#"
            select table_schema, table_name, column_name, data_type,
                   cast(ordinal_position as integer) as ordinal_position, is_nullable
            from svv_columns
            where column_name ilike $1
              and table_schema not in ({})
            order by table_schema, table_name, ordinal_position
            limit {}
            "#,
            system_schema_list(),
            FIND_COLUMN_LIMIT
        );
        let rows = sqlx::query(&sql)
            .bind(like_pattern(pattern))
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(column_from_row)
            .collect::<Result<_, _>>()
            .map_err(query_error)
    }

    async fn table_statistics(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<TableStatistics, MetadataError> {
        let row = sqlx::query(
            r#"
            select cast(tbl_rows as bigint) as row_estimate,
                   cast(size as bigint) as size_mb,
                   diststyle,
                   sortkey1,
                   cast(unsorted as float8) as unsorted_pct,
                   cast(stats_off as float8) as stats_off
            from svv_table_info
            where "schema" = $1 and "table" = $2
            "#,
        )
        .bind(schema)
        .bind(table)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        match row {
            Some(row) => statistics_from_row(schema, table, &row).map_err(query_error),
            None => {
                // External and empty tables have no svv_table_info entry.
                let exists: Option<i32> = sqlx::query_scalar(
                    "select 1 from svv_tables where table_schema = $1 and table_name = $2 limit 1",
                )
                .bind(schema)
                .bind(table)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error)?;

                match exists {
                    Some(_) => Ok(TableStatistics {
                        schema: schema.to_string(),
                        table: table.to_string(),
                        ..Default::default()
                    }),
                    None => Err(MetadataError::TableNotFound {
                        schema: schema.to_string(),
                        table: table.to_string(),
                    }),
                }
            }
        }
    }
}
