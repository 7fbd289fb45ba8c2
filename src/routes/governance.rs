//! Governance workflow route handlers

use crate::error::{validation_error, ApiResult};
use crate::governance::review::UNKNOWN_REVIEWER;
use crate::models::{
    ApplyResponse, GenerateRequest, GenerateResponse, MessageResponse, PendingQuery,
    ReviewActivityResponse, ReviewQueueResponse, ReviewRequest, ReviewResponse,
    SchemaProgressResponse, StatsResponse, SuccessResponse,
};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use tracing::{debug, info};
use validator::Validate;

/// Header set by the authenticating proxy in front of the service
const FORWARDED_EMAIL_HEADER: &str = "x-forwarded-email";

/// Create the governance table (idempotent)
pub async fn setup(State(state): State<SharedState>) -> ApiResult<Json<MessageResponse>> {
    state.store.setup().await?;
    Ok(Json(MessageResponse::new("Governance table created")))
}

/// Generate descriptions for undocumented (or explicitly listed) tables
pub async fn generate(
    State(state): State<SharedState>,
    Json(payload): Json<GenerateRequest>,
) -> ApiResult<Json<SuccessResponse<GenerateResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    let request = payload.into_generation(&state.settings.governance.target_catalog);

    state
        .permissions
        .check(&request.catalog, request.schema.as_deref(), None)
        .await?
        .require_generation()?;

    let results = state.orchestrator.generate(request).await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Generated {} descriptions.", results.generated),
        GenerateResponse { results },
    )))
}

/// Approve or reject one record
pub async fn review(
    State(state): State<SharedState>,
    Path(record_id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<Json<SuccessResponse<ReviewResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    let reviewer = resolve_reviewer(payload.reviewer.as_deref(), &headers);

    let record = state
        .reviews
        .update_status(record_id, &payload.status, payload.approved_description, &reviewer)
        .await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Review status updated to {}", record.review_status),
        ReviewResponse { record },
    )))
}

/// Write every approved description to the catalog
pub async fn apply(State(state): State<SharedState>) -> ApiResult<Json<SuccessResponse<ApplyResponse>>> {
    let results = state.reconciler.apply_all_approved().await?;
    info!("Apply requested: {} applied, {} errors", results.applied, results.errors);

    Ok(Json(SuccessResponse::with_data(
        format!("Applied {} descriptions.", results.applied),
        ApplyResponse { results },
    )))
}

pub async fn stats(State(state): State<SharedState>) -> ApiResult<Json<SuccessResponse<StatsResponse>>> {
    let stats = state.store.statistics().await?;
    Ok(Json(SuccessResponse::with_data(
        "Statistics fetched successfully.",
        StatsResponse { stats },
    )))
}

/// Review queue, one page at a time
pub async fn pending(
    State(state): State<SharedState>,
    Query(params): Query<PendingQuery>,
) -> ApiResult<Json<SuccessResponse<ReviewQueueResponse>>> {
    params.validate().map_err(|e| validation_error(e.to_string()))?;
    let (limit, offset) = params.window();
    debug!("Fetching review queue: limit={} offset={}", limit, offset);

    let records = state.store.review_queue(limit, offset).await?;

    Ok(Json(SuccessResponse::with_data(
        "Review queue fetched successfully.",
        ReviewQueueResponse {
            records,
            page: offset / limit + 1,
            per_page: limit,
        },
    )))
}

pub async fn schema_progress(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<SchemaProgressResponse>>> {
    let schemas = state.store.schema_progress().await?;
    Ok(Json(SuccessResponse::with_data(
        "Schema progress fetched successfully.",
        SchemaProgressResponse { schemas },
    )))
}

pub async fn review_activity(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<ReviewActivityResponse>>> {
    let activity = state.store.review_activity().await?;
    Ok(Json(SuccessResponse::with_data(
        "Review activity fetched successfully.",
        ReviewActivityResponse { activity },
    )))
}

/// Body field first, then the proxy header, then "unknown"
fn resolve_reviewer(from_body: Option<&str>, headers: &HeaderMap) -> String {
    from_body
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            headers
                .get(FORWARDED_EMAIL_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|name| !name.is_empty())
        })
        .unwrap_or(UNKNOWN_REVIEWER)
        .to_string()
}
