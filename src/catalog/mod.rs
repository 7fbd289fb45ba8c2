//! Catalog client
//!
//! Read access to catalog/schema/table/column metadata and sample rows, plus
//! the two comment writes the apply step needs. The catalog service is an
//! external collaborator; the workflow only talks to it through
//! [`CatalogClient`].

pub mod permissions;
pub mod postgres;

use crate::db::queries::validate_identifier;
use crate::error::AppError;
use crate::governance::models::{percentage, SchemaCoverage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub use permissions::{PermissionChecker, PermissionReport};
pub use postgres::PostgresCatalog;

/// Fully qualified table reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    pub catalog: String,
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Check every part against the identifier allow-list
    pub fn validate(&self) -> Result<(), AppError> {
        validate_identifier(&self.catalog, "catalog")?;
        validate_identifier(&self.schema, "schema")?;
        validate_identifier(&self.table, "table")
    }

    pub fn path(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, self.table)
    }
}

/// A table as listed by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub table_catalog: String,
    pub table_schema: String,
    pub table_name: String,
    pub table_type: String,
    pub current_comment: Option<String>,
    pub column_count: i64,
}

impl TableSummary {
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.table_catalog, &self.table_schema, &self.table_name)
    }

    pub fn is_documented(&self) -> bool {
        has_text(&self.current_comment)
    }
}

/// A column with its declared type and comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    pub column_name: String,
    pub data_type: String,
    pub comment: Option<String>,
}

impl ColumnSummary {
    pub fn is_documented(&self) -> bool {
        has_text(&self.comment)
    }
}

/// One sample row, keyed by column name
pub type SampleRow = serde_json::Map<String, serde_json::Value>;

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Operations consumed from the metadata catalog.
///
/// Implementations validate every identifier before it reaches a textual
/// statement.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Identity the catalog sees for this service
    async fn current_user(&self) -> Result<String, AppError>;

    async fn list_catalogs(&self) -> Result<Vec<String>, AppError>;

    async fn list_schemas(&self, catalog: &str) -> Result<Vec<String>, AppError>;

    /// Tables in a catalog, optionally restricted to one schema
    async fn list_tables(&self, catalog: &str, schema: Option<&str>) -> Result<Vec<TableSummary>, AppError>;

    async fn list_columns(&self, table: &TableRef) -> Result<Vec<ColumnSummary>, AppError>;

    /// Up to `limit` rows, read with a bounded wait
    async fn sample_rows(&self, table: &TableRef, limit: usize) -> Result<Vec<SampleRow>, AppError>;

    /// Read one row to prove SELECT access
    async fn probe_table(&self, table: &TableRef) -> Result<(), AppError>;

    /// Whether the caller may set comments on the table
    async fn can_comment_on(&self, table: &TableRef) -> Result<bool, AppError>;

    async fn set_table_comment(&self, table: &TableRef, comment: &str) -> Result<(), AppError>;

    async fn set_column_comment(&self, table: &TableRef, column: &str, comment: &str) -> Result<(), AppError>;
}

/// Shared handle used across handlers and services
pub type SharedCatalog = Arc<dyn CatalogClient>;

/// Per-schema documentation coverage, best covered first
pub fn schema_coverage(tables: &[TableSummary]) -> Vec<SchemaCoverage> {
    let mut by_schema: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for table in tables {
        let entry = by_schema.entry(table.table_schema.as_str()).or_default();
        entry.0 += 1;
        if table.is_documented() {
            entry.1 += 1;
        }
    }

    let mut coverage: Vec<_> = by_schema
        .into_iter()
        .map(|(schema, (total, documented))| SchemaCoverage {
            schema_name: schema.to_string(),
            total_tables: total,
            documented,
            missing: total - documented,
            pct_complete: percentage(documented, total),
        })
        .collect();
    // Stable sort keeps schema-name order among ties
    coverage.sort_by(|a, b| b.pct_complete.total_cmp(&a.pct_complete));
    coverage
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scriptable in-process catalog for tests

    use super::*;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CommentWrite {
        Table { table: TableRef, comment: String },
        Column { table: TableRef, column: String, comment: String },
    }

    #[derive(Default)]
    struct Inner {
        schemas: HashMap<String, Vec<String>>,
        tables: Vec<TableSummary>,
        columns: HashMap<TableRef, Vec<ColumnSummary>>,
        samples: HashMap<TableRef, Vec<SampleRow>>,
        failing_writes: HashSet<String>,
        unreadable: HashSet<TableRef>,
        writes: Vec<CommentWrite>,
    }

    #[derive(Default)]
    pub struct FakeCatalog {
        inner: Mutex<Inner>,
    }

    impl FakeCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a table; `columns` are `(name, type, comment)`
        pub async fn add_table(
            &self,
            table: &TableRef,
            comment: Option<&str>,
            columns: &[(&str, &str, Option<&str>)],
        ) {
            let mut inner = self.inner.lock().await;
            let schemas = inner.schemas.entry(table.catalog.clone()).or_default();
            if !schemas.contains(&table.schema) {
                schemas.push(table.schema.clone());
            }
            inner.tables.push(TableSummary {
                table_catalog: table.catalog.clone(),
                table_schema: table.schema.clone(),
                table_name: table.table.clone(),
                table_type: "MANAGED".to_string(),
                current_comment: comment.map(str::to_string),
                column_count: columns.len() as i64,
            });
            inner.columns.insert(
                table.clone(),
                columns
                    .iter()
                    .map(|(name, data_type, comment)| ColumnSummary {
                        column_name: name.to_string(),
                        data_type: data_type.to_string(),
                        comment: comment.map(str::to_string),
                    })
                    .collect(),
            );
        }

        pub async fn set_samples(&self, table: &TableRef, rows: Vec<serde_json::Value>) {
            let rows = rows
                .into_iter()
                .filter_map(|v| v.as_object().cloned())
                .collect();
            self.inner.lock().await.samples.insert(table.clone(), rows);
        }

        /// Make comment writes to `path` (`catalog.schema.table[.column]`) fail
        pub async fn fail_writes_to(&self, path: &str) {
            self.inner.lock().await.failing_writes.insert(path.to_string());
        }

        pub async fn heal_writes_to(&self, path: &str) {
            self.inner.lock().await.failing_writes.remove(path);
        }

        pub async fn make_unreadable(&self, table: &TableRef) {
            self.inner.lock().await.unreadable.insert(table.clone());
        }

        pub async fn writes(&self) -> Vec<CommentWrite> {
            self.inner.lock().await.writes.clone()
        }
    }

    #[async_trait]
    impl CatalogClient for FakeCatalog {
        async fn current_user(&self) -> Result<String, AppError> {
            Ok("svc-docs".to_string())
        }

        async fn list_catalogs(&self) -> Result<Vec<String>, AppError> {
            let mut catalogs: Vec<_> = self.inner.lock().await.schemas.keys().cloned().collect();
            catalogs.sort();
            Ok(catalogs)
        }

        async fn list_schemas(&self, catalog: &str) -> Result<Vec<String>, AppError> {
            Ok(self
                .inner
                .lock()
                .await
                .schemas
                .get(catalog)
                .cloned()
                .unwrap_or_default())
        }

        async fn list_tables(&self, catalog: &str, schema: Option<&str>) -> Result<Vec<TableSummary>, AppError> {
            Ok(self
                .inner
                .lock()
                .await
                .tables
                .iter()
                .filter(|t| t.table_catalog == catalog)
                .filter(|t| schema.map_or(true, |s| t.table_schema == s))
                .cloned()
                .collect())
        }

        async fn list_columns(&self, table: &TableRef) -> Result<Vec<ColumnSummary>, AppError> {
            self.inner
                .lock()
                .await
                .columns
                .get(table)
                .cloned()
                .ok_or_else(|| AppError::Transport(format!("Table {} not found", table.path())))
        }

        async fn sample_rows(&self, table: &TableRef, limit: usize) -> Result<Vec<SampleRow>, AppError> {
            let inner = self.inner.lock().await;
            if inner.unreadable.contains(table) {
                return Err(AppError::Transport(format!("SELECT denied on {}", table.path())));
            }
            Ok(inner
                .samples
                .get(table)
                .map(|rows| rows.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        }

        async fn probe_table(&self, table: &TableRef) -> Result<(), AppError> {
            if self.inner.lock().await.unreadable.contains(table) {
                return Err(AppError::Transport(format!("SELECT denied on {}", table.path())));
            }
            Ok(())
        }

        async fn can_comment_on(&self, _table: &TableRef) -> Result<bool, AppError> {
            Ok(true)
        }

        async fn set_table_comment(&self, table: &TableRef, comment: &str) -> Result<(), AppError> {
            table.validate()?;
            let mut inner = self.inner.lock().await;
            if inner.failing_writes.contains(&table.path()) {
                return Err(AppError::Transport(format!("COMMENT failed on {}", table.path())));
            }
            inner.writes.push(CommentWrite::Table {
                table: table.clone(),
                comment: comment.to_string(),
            });
            Ok(())
        }

        async fn set_column_comment(&self, table: &TableRef, column: &str, comment: &str) -> Result<(), AppError> {
            table.validate()?;
            validate_identifier(column, "column")?;
            let path = format!("{}.{}", table.path(), column);
            let mut inner = self.inner.lock().await;
            if inner.failing_writes.contains(&path) {
                return Err(AppError::Transport(format!("COMMENT failed on {}", path)));
            }
            inner.writes.push(CommentWrite::Column {
                table: table.clone(),
                column: column.to_string(),
                comment: comment.to_string(),
            });
            Ok(())
        }
    }
}
