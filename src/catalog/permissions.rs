//! Permission pre-flight check
//!
//! Read-only and idempotent. Every failing step is recorded as a diagnostic
//! instead of aborting, so the caller sees all missing capabilities at once.

use crate::catalog::{SharedCatalog, TableRef};
use crate::db::queries::validate_identifier;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Capabilities of the calling identity on a catalog/schema/table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionReport {
    pub user: Option<String>,
    pub can_use_catalog: bool,
    pub can_use_schema: bool,
    pub can_select: bool,
    pub can_modify: bool,
    pub errors: Vec<String>,
}

impl PermissionReport {
    /// Generation needs to read metadata and, later, write comments
    pub fn allows_generation(&self) -> bool {
        self.can_select && self.can_modify
    }

    /// Convert a refusal into a blocking precondition failure
    pub fn require_generation(&self) -> Result<(), AppError> {
        if self.allows_generation() {
            return Ok(());
        }
        let reasons = if self.errors.is_empty() {
            "missing SELECT or MODIFY capability".to_string()
        } else {
            self.errors.join(", ")
        };
        Err(AppError::Permission(format!("Insufficient permissions: {}", reasons)))
    }
}

pub struct PermissionChecker {
    catalog: SharedCatalog,
}

impl PermissionChecker {
    pub fn new(catalog: SharedCatalog) -> Self {
        Self { catalog }
    }

    pub async fn check(
        &self,
        catalog: &str,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> Result<PermissionReport, AppError> {
        validate_identifier(catalog, "catalog")?;
        if let Some(schema) = schema {
            validate_identifier(schema, "schema")?;
        }
        if let Some(table) = table {
            validate_identifier(table, "table")?;
        }

        let mut report = PermissionReport::default();

        match self.catalog.current_user().await {
            Ok(user) => report.user = Some(user),
            Err(e) => report.errors.push(format!("Cannot resolve current user: {}", e)),
        }

        match self.catalog.list_catalogs().await {
            Ok(catalogs) if catalogs.iter().any(|c| c == catalog) => report.can_use_catalog = true,
            Ok(_) => report.errors.push(format!("Catalog '{}' not accessible", catalog)),
            Err(e) => report.errors.push(format!("Cannot list catalogs: {}", e)),
        }

        match schema {
            Some(schema) => match self.catalog.list_schemas(catalog).await {
                Ok(schemas) if schemas.iter().any(|s| s == schema) => report.can_use_schema = true,
                Ok(_) => report.errors.push(format!("Schema '{}' not accessible", schema)),
                Err(e) => report.errors.push(format!("Cannot list schemas: {}", e)),
            },
            None => report.can_use_schema = true,
        }

        match (schema, table) {
            (Some(schema), Some(table)) => {
                let table_ref = TableRef::new(catalog, schema, table);
                match self.catalog.probe_table(&table_ref).await {
                    Ok(()) => report.can_select = true,
                    Err(e) => report.errors.push(format!("Cannot access table '{}': {}", table, e)),
                }
                match self.catalog.can_comment_on(&table_ref).await {
                    Ok(true) => report.can_modify = true,
                    Ok(false) => report
                        .errors
                        .push(format!("Cannot set comments on table '{}'", table)),
                    Err(e) => report.errors.push(format!("Cannot describe table '{}': {}", table, e)),
                }
            }
            _ => match self.catalog.list_tables(catalog, schema).await {
                Ok(_) => {
                    report.can_select = true;
                    report.can_modify = true;
                }
                Err(e) => report.errors.push(format!("Cannot list tables: {}", e)),
            },
        }

        debug!(
            "Permission check on {}.{}: select={} modify={}",
            catalog,
            schema.unwrap_or("*"),
            report.can_select,
            report.can_modify
        );
        Ok(report)
    }
}
