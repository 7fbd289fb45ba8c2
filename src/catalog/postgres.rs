//! PostgreSQL catalog client
//!
//! A catalog is a database on the configured server; each one gets its own
//! lazily created pool, bounded by the server-side statement timeout.

use crate::catalog::{CatalogClient, ColumnSummary, SampleRow, TableRef, TableSummary};
use crate::db::queries::{self, validate_identifier, SqlBuilder};
use crate::db::{self, DbConnectionConfig};
use crate::error::AppError;
use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Catalog client over a PostgreSQL server
pub struct PostgresCatalog {
    /// Connection settings for the server; `database` is the admin database
    server: DbConnectionConfig,
    /// Catalog name -> pool
    pools: Arc<RwLock<HashMap<String, Pool>>>,
}

impl PostgresCatalog {
    pub fn new(server: DbConnectionConfig, statement_timeout_ms: u64) -> Self {
        Self {
            server: server.with_statement_timeout(statement_timeout_ms),
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Connection to one catalog. A pool is kept only after it has served a
    /// connection, so names of missing databases never stay in the map.
    async fn client(&self, catalog: &str) -> Result<Object, AppError> {
        validate_identifier(catalog, "catalog")?;

        let cached = self.pools.read().await.get(catalog).cloned();
        if let Some(pool) = cached {
            return checkout(catalog, &pool).await;
        }

        let pool = db::create_pool(&self.server.for_database(catalog))?;
        let client = checkout(catalog, &pool).await?;

        let mut pools = self.pools.write().await;
        if !pools.contains_key(catalog) {
            pools.insert(catalog.to_string(), pool);
            info!("Opened catalog pool for '{}'", catalog);
        }
        Ok(client)
    }
}

async fn checkout(catalog: &str, pool: &Pool) -> Result<Object, AppError> {
    pool.get()
        .await
        .map_err(|e| AppError::Transport(format!("Cannot connect to catalog '{}': {}", catalog, e)))
}

/// Statement failures at this boundary are transport errors for the caller
fn transport(context: &str, e: tokio_postgres::Error) -> AppError {
    AppError::Transport(format!("{}: {}", context, e))
}

#[async_trait]
impl CatalogClient for PostgresCatalog {
    async fn current_user(&self) -> Result<String, AppError> {
        let client = self.client(&self.server.database).await?;
        let row = client
            .query_one(queries::CURRENT_USER, &[])
            .await
            .map_err(|e| transport("Cannot resolve current user", e))?;
        Ok(row.get("name"))
    }

    async fn list_catalogs(&self) -> Result<Vec<String>, AppError> {
        let client = self.client(&self.server.database).await?;
        let rows = client
            .query(queries::LIST_CATALOGS, &[])
            .await
            .map_err(|e| transport("Cannot list catalogs", e))?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    async fn list_schemas(&self, catalog: &str) -> Result<Vec<String>, AppError> {
        let client = self.client(catalog).await?;
        let rows = client
            .query(queries::LIST_SCHEMAS, &[])
            .await
            .map_err(|e| transport("Cannot list schemas", e))?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    async fn list_tables(&self, catalog: &str, schema: Option<&str>) -> Result<Vec<TableSummary>, AppError> {
        if let Some(schema) = schema {
            validate_identifier(schema, "schema")?;
        }

        let client = self.client(catalog).await?;
        let rows = client
            .query(queries::LIST_TABLES, &[&schema])
            .await
            .map_err(|e| transport("Cannot list tables", e))?;

        Ok(rows
            .iter()
            .map(|row| TableSummary {
                table_catalog: catalog.to_string(),
                table_schema: row.get("schema_name"),
                table_name: row.get("table_name"),
                table_type: row.get("table_type"),
                current_comment: row.get("current_comment"),
                column_count: row.get("column_count"),
            })
            .collect())
    }

    async fn list_columns(&self, table: &TableRef) -> Result<Vec<ColumnSummary>, AppError> {
        table.validate()?;

        let client = self.client(&table.catalog).await?;
        let rows = client
            .query(queries::LIST_COLUMNS, &[&table.schema, &table.table])
            .await
            .map_err(|e| transport("Cannot list columns", e))?;

        if rows.is_empty() {
            return Err(AppError::NotFound(format!(
                "Table '{}' not found or has no columns",
                table.path()
            )));
        }

        Ok(rows
            .iter()
            .map(|row| ColumnSummary {
                column_name: row.get("column_name"),
                data_type: row.get("data_type"),
                comment: row.get("comment"),
            })
            .collect())
    }

    async fn sample_rows(&self, table: &TableRef, limit: usize) -> Result<Vec<SampleRow>, AppError> {
        table.validate()?;

        let client = self.client(&table.catalog).await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = client
            .query(&SqlBuilder::sample_rows(&table.schema, &table.table), &[&limit])
            .await
            .map_err(|e| transport("Cannot read sample rows", e))?;

        let mut samples = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.get("row");
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(serde_json::Value::Object(map)) => samples.push(map),
                Ok(_) | Err(_) => debug!("Skipping non-object sample row from {}", table.path()),
            }
        }
        Ok(samples)
    }

    async fn probe_table(&self, table: &TableRef) -> Result<(), AppError> {
        table.validate()?;

        let client = self.client(&table.catalog).await?;
        client
            .query(&SqlBuilder::probe_table(&table.schema, &table.table), &[])
            .await
            .map_err(|e| transport(&format!("Cannot read {}", table.path()), e))?;
        Ok(())
    }

    async fn can_comment_on(&self, table: &TableRef) -> Result<bool, AppError> {
        table.validate()?;

        let client = self.client(&table.catalog).await?;
        let row = client
            .query_opt(queries::CAN_COMMENT_ON_TABLE, &[&table.schema, &table.table])
            .await
            .map_err(|e| transport("Cannot describe table", e))?
            .ok_or_else(|| AppError::NotFound(format!("Table '{}' not found", table.path())))?;
        Ok(row.get("can_comment"))
    }

    async fn set_table_comment(&self, table: &TableRef, comment: &str) -> Result<(), AppError> {
        table.validate()?;

        let client = self.client(&table.catalog).await?;
        client
            .batch_execute(&SqlBuilder::comment_on_table(&table.schema, &table.table, comment))
            .await
            .map_err(|e| transport(&format!("COMMENT ON TABLE {} failed", table.path()), e))?;

        debug!("Set comment on table {}", table.path());
        Ok(())
    }

    async fn set_column_comment(&self, table: &TableRef, column: &str, comment: &str) -> Result<(), AppError> {
        table.validate()?;
        validate_identifier(column, "column")?;

        let client = self.client(&table.catalog).await?;
        client
            .batch_execute(&SqlBuilder::comment_on_column(
                &table.schema,
                &table.table,
                column,
                comment,
            ))
            .await
            .map_err(|e| {
                transport(
                    &format!("COMMENT ON COLUMN {}.{} failed", table.path(), column),
                    e,
                )
            })?;

        debug!("Set comment on column {}.{}", table.path(), column);
        Ok(())
    }
}
