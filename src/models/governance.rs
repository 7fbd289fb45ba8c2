//! Governance workflow DTOs

use crate::generation::{GenerationRequest, GenerationSummary};
use crate::generation::orchestrator::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::governance::models::{GovernanceRecord, GovernanceStats, ReviewActivity, SchemaProgress};
use crate::governance::ApplySummary;
use serde::{Deserialize, Serialize};
use super::validate_identifier;
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 200;
pub const MAX_PAGE: i64 = 1_000_000;

/// Request to generate descriptions
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub catalog: Option<String>,

    #[validate(custom(function = "validate_identifier"))]
    pub schema: Option<String>,

    /// Specific tables; empty for every undocumented table
    #[serde(default)]
    pub tables: Vec<String>,

    #[serde(alias = "batch_size")]
    #[validate(range(min = 1, max = 100, message = "batch_size must be between 1 and 100"))]
    pub batch_size: Option<usize>,
}

impl GenerateRequest {
    pub fn into_generation(self, default_catalog: &str) -> GenerationRequest {
        GenerationRequest {
            catalog: self.catalog.unwrap_or_else(|| default_catalog.to_string()),
            schema: self.schema,
            tables: self.tables,
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).min(MAX_BATCH_SIZE),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub results: GenerationSummary,
}

/// Reviewer decision on one record
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    #[validate(length(min = 1, message = "status is required"))]
    pub status: String,

    #[serde(default, alias = "approved_description")]
    pub approved_description: Option<String>,

    #[serde(default)]
    pub reviewer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub record: GovernanceRecord,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub results: ApplySummary,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: GovernanceStats,
}

/// Paging for the review queue
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    #[validate(range(min = 1, max = 1_000_000, message = "page must be between 1 and 1000000"))]
    pub page: Option<i64>,

    #[serde(alias = "per_page")]
    #[validate(range(min = 1, max = 200, message = "per_page must be between 1 and 200"))]
    pub per_page: Option<i64>,
}

impl PendingQuery {
    /// `(limit, offset)` for the store
    pub fn window(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let per_page = self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (per_page, (page - 1).saturating_mul(per_page))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueueResponse {
    pub records: Vec<GovernanceRecord>,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Serialize)]
pub struct SchemaProgressResponse {
    pub schemas: Vec<SchemaProgress>,
}

#[derive(Debug, Serialize)]
pub struct ReviewActivityResponse {
    pub activity: Vec<ReviewActivity>,
}
