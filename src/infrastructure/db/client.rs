use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row, TypeInfo};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::SnapdiffError;
use crate::domain::ports::RowRepository;
use crate::domain::snapshot::{RowMap, TableResult};
use crate::domain::value_objects::{ColumnName, Schema, TableName};
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::dialect::{blob_or_string, from_driver, Dialect};
use crate::infrastructure::db::sql_utils::{build_select_query, build_typed_select_query};
use crate::infrastructure::db::BOOKKEEPING_TABLE;

pub struct SqlxRowRepository {
    pool: AnyPool,
    dialect: Arc<dyn Dialect>,
    /// Schema the tables are listed from and introspected in when no tenant
    /// is given. `None` for drivers without schemas.
    default_schema: Option<Schema>,
}

/// Connect to the database described in `cfg` and return a `SqlxRowRepository`.
pub async fn connect(cfg: &DbConfig) -> Result<SqlxRowRepository, SnapdiffError> {
    sqlx::any::install_default_drivers();

    let connection_error = |source| SnapdiffError::Connection {
        database: cfg.dbname.clone(),
        driver: cfg.driver.clone(),
        source,
    };

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.url())
        .await
        .map_err(connection_error)?;

    let dialect: Arc<dyn Dialect> = Arc::from(from_driver(&cfg.driver));

    let default_schema = match dialect.default_schema_sql() {
        Some(sql) => {
            let row = sqlx::query(sql)
                .fetch_one(&pool)
                .await
                .map_err(connection_error)?;
            // Reading the single text column cannot fail for a catalog query
            // that just succeeded; treat a decode failure as "no schema".
            blob_or_string(&row, 0).ok().map(Schema)
        }
        None => None,
    };

    debug!(
        host = %cfg.host,
        dbname = %cfg.dbname,
        driver = %cfg.driver,
        schema = default_schema.as_ref().map(|s| s.0.as_str()).unwrap_or(""),
        "connected"
    );

    Ok(SqlxRowRepository {
        pool,
        dialect,
        default_schema,
    })
}

/// Query `information_schema.columns` for `(column_name, data_type)` pairs.
async fn fetch_column_types(
    pool: &AnyPool,
    schema: &Schema,
    table: &TableName,
    dialect: &dyn Dialect,
) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query(dialect.introspect_sql())
        .bind(&schema.0)
        .bind(&table.0)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to fetch column types for {}.{}", schema.0, table.0))?;

    let mut cols = Vec::with_capacity(rows.len());
    for row in &rows {
        cols.push((blob_or_string(row, 0)?, blob_or_string(row, 1)?));
    }
    Ok(cols)
}

/// Convert a sqlx `AnyRow` into a `RowMap`, preferring the
/// `information_schema` type hint over AnyRow's runtime type name.
fn row_to_map(
    row: &AnyRow,
    col_types: &BTreeMap<String, String>,
    decoder: &dyn Dialect,
) -> Result<RowMap> {
    let mut map = BTreeMap::new();
    for col in row.columns() {
        let name = col.name().to_string();
        let type_hint = col_types
            .get(&name)
            .map(|s| s.as_str())
            .unwrap_or_else(|| col.type_info().name());
        let value = decoder.decode_column(row, col.ordinal(), type_hint)?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl RowRepository for SqlxRowRepository {
    async fn list_base_tables(&self) -> Result<Vec<TableName>> {
        let mut query = sqlx::query(self.dialect.list_tables_sql());
        if let Some(schema) = &self.default_schema {
            query = query.bind(schema.0.clone());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| "Failed to list base tables")?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = blob_or_string(row, 0)?;
            if name != BOOKKEEPING_TABLE {
                tables.push(TableName(name));
            }
        }
        debug!(count = tables.len(), "listed base tables");
        Ok(tables)
    }

    async fn fetch_table(
        &self,
        table: &TableName,
        tenant: Option<&Schema>,
        order_by: Option<&ColumnName>,
    ) -> Result<TableResult> {
        // Typed SELECT where information_schema is available; plain SELECT *
        // for SQLite, whose loose affinity AnyRow decodes natively.
        let introspect_in = tenant.or(self.default_schema.as_ref());
        let (query, col_types_map) = match introspect_in {
            Some(schema) if self.dialect.needs_introspection() => {
                let col_types =
                    fetch_column_types(&self.pool, schema, table, self.dialect.as_ref()).await?;
                if col_types.is_empty() {
                    bail!("Table {}.{} does not exist", schema.0, table.0);
                }
                if let Some(col) = order_by {
                    if !col_types.iter().any(|(name, _)| name == &col.0) {
                        bail!("Column {} does not exist in {}.{}", col.0, schema.0, table.0);
                    }
                }
                let q = build_typed_select_query(
                    tenant,
                    table,
                    order_by,
                    &col_types,
                    self.dialect.as_ref(),
                );
                (q, col_types.into_iter().collect::<BTreeMap<_, _>>())
            }
            _ => (
                build_select_query(tenant, table, order_by, self.dialect.as_ref()),
                BTreeMap::new(),
            ),
        };

        debug!("Executing: {}", query);

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query {}", table.0))?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            result.push(row_to_map(row, &col_types_map, self.dialect.as_ref())?);
        }
        Ok(TableResult::from_rows(result))
    }
}
