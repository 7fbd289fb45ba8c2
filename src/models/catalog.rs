//! Catalog browsing DTOs

use crate::catalog::{PermissionReport, TableSummary};
use crate::governance::models::SchemaCoverage;
use serde::{Deserialize, Serialize};
use super::validate_identifier;
use validator::Validate;

/// Permission pre-flight request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub catalog: String,

    #[validate(custom(function = "validate_identifier"))]
    pub schema: String,

    #[validate(custom(function = "validate_identifier"))]
    pub table: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub permissions: PermissionReport,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CoverageQuery {
    #[validate(custom(function = "validate_identifier"))]
    pub catalog: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CoverageResponse {
    pub catalog: String,
    pub schemas: Vec<SchemaCoverage>,
}

#[derive(Debug, Serialize)]
pub struct CatalogListResponse {
    pub catalogs: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListSchemasQuery {
    #[validate(custom(function = "validate_identifier"))]
    pub catalog: String,
}

#[derive(Debug, Serialize)]
pub struct SchemaListResponse {
    pub schemas: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListTablesQuery {
    #[validate(custom(function = "validate_identifier"))]
    pub catalog: String,

    #[validate(custom(function = "validate_identifier"))]
    pub schema: String,
}

#[derive(Debug, Serialize)]
pub struct TableListResponse {
    pub tables: Vec<TableSummary>,
}
