//! Catalog browsing and permission route handlers

use crate::catalog::schema_coverage;
use crate::error::{validation_error, ApiResult};
use crate::models::{
    CatalogListResponse, CoverageQuery, CoverageResponse, ListSchemasQuery, ListTablesQuery,
    PermissionRequest, PermissionResponse, SchemaListResponse, SuccessResponse, TableListResponse,
};
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    Json,
};
use tracing::debug;
use validator::Validate;

/// Check what the service identity may do on a catalog/schema/table
pub async fn check_permissions(
    State(state): State<SharedState>,
    Json(payload): Json<PermissionRequest>,
) -> ApiResult<Json<SuccessResponse<PermissionResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let permissions = state
        .permissions
        .check(&payload.catalog, Some(payload.schema.as_str()), payload.table.as_deref())
        .await?;

    Ok(Json(SuccessResponse::with_data(
        "Permissions checked.",
        PermissionResponse { permissions },
    )))
}

/// Documentation coverage per schema, from live catalog metadata
pub async fn coverage(
    State(state): State<SharedState>,
    Query(params): Query<CoverageQuery>,
) -> ApiResult<Json<SuccessResponse<CoverageResponse>>> {
    params.validate().map_err(|e| validation_error(e.to_string()))?;
    let catalog = params
        .catalog
        .unwrap_or_else(|| state.settings.governance.target_catalog.clone());

    let tables = state.catalog.list_tables(&catalog, None).await?;
    debug!("Computing coverage over {} tables in {}", tables.len(), catalog);

    Ok(Json(SuccessResponse::with_data(
        "Coverage computed successfully.",
        CoverageResponse {
            schemas: schema_coverage(&tables),
            catalog,
        },
    )))
}

pub async fn list_catalogs(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<CatalogListResponse>>> {
    let catalogs = state.catalog.list_catalogs().await?;
    Ok(Json(SuccessResponse::with_data(
        "Catalogs fetched successfully.",
        CatalogListResponse { catalogs },
    )))
}

pub async fn list_schemas(
    State(state): State<SharedState>,
    Query(params): Query<ListSchemasQuery>,
) -> ApiResult<Json<SuccessResponse<SchemaListResponse>>> {
    params.validate().map_err(|e| validation_error(e.to_string()))?;
    let schemas = state.catalog.list_schemas(&params.catalog).await?;
    Ok(Json(SuccessResponse::with_data(
        "Schemas fetched successfully.",
        SchemaListResponse { schemas },
    )))
}

pub async fn list_tables(
    State(state): State<SharedState>,
    Query(params): Query<ListTablesQuery>,
) -> ApiResult<Json<SuccessResponse<TableListResponse>>> {
    params.validate().map_err(|e| validation_error(e.to_string()))?;
    let tables = state
        .catalog
        .list_tables(&params.catalog, Some(params.schema.as_str()))
        .await?;
    Ok(Json(SuccessResponse::with_data(
        "Tables fetched successfully.",
        TableListResponse { tables },
    )))
}
