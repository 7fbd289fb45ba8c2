//! PostgreSQL-backed governance store
//!
//! Every value travels as a bind parameter. The only interpolated text is the
//! governance schema/table name, which is validated and quoted once at
//! construction.

use crate::db::queries::{self, validate_identifier, SqlBuilder};
use crate::error::AppError;
use crate::governance::models::*;
use crate::governance::store::GovernanceStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tracing::{debug, info};

pub const GOVERNANCE_TABLE_NAME: &str = "description_governance";

/// Durable store in `<schema>.description_governance`
pub struct PostgresGovernanceStore {
    pool: Pool,
    schema: String,
    table: String,
}

impl PostgresGovernanceStore {
    pub fn new(pool: Pool, governance_schema: &str) -> Result<Self, AppError> {
        validate_identifier(governance_schema, "governance schema")?;
        Ok(Self {
            pool,
            schema: SqlBuilder::quote_ident(governance_schema),
            table: SqlBuilder::qualified(governance_schema, GOVERNANCE_TABLE_NAME),
        })
    }

    fn sql(&self, template: &str) -> String {
        SqlBuilder::governance(template, &self.table)
    }
}

fn record_from_row(row: &Row) -> Result<GovernanceRecord, AppError> {
    let object_type: String = row.try_get("object_type")?;
    let review_status: String = row.try_get("review_status")?;

    Ok(GovernanceRecord {
        id: row.try_get("id")?,
        object_type: object_type.parse().map_err(AppError::Internal)?,
        location: ObjectLocation {
            catalog_name: row.try_get("catalog_name")?,
            schema_name: row.try_get("schema_name")?,
            table_name: row.try_get("table_name")?,
            column_name: row.try_get("column_name")?,
            column_data_type: row.try_get("column_data_type")?,
        },
        ai_generated_description: row.try_get("ai_generated_description")?,
        approved_description: row.try_get("approved_description")?,
        review_status: review_status.parse().map_err(AppError::Internal)?,
        reviewer: row.try_get("reviewer")?,
        generated_at: row.try_get("generated_at")?,
        reviewed_at: row.try_get("reviewed_at")?,
        applied_at: row.try_get("applied_at")?,
        model_used: row.try_get("model_used")?,
        confidence_score: row.try_get("confidence_score")?,
        apply_attempts: row.try_get("apply_attempts")?,
        last_apply_error: row.try_get("last_apply_error")?,
    })
}

#[async_trait]
impl GovernanceStore for PostgresGovernanceStore {
    async fn setup(&self) -> Result<(), AppError> {
        let client = self.pool.get().await?;

        client
            .batch_execute(&queries::CREATE_GOVERNANCE_SCHEMA.replace("{schema}", &self.schema))
            .await?;
        client.batch_execute(&self.sql(queries::CREATE_GOVERNANCE_TABLE)).await?;
        client
            .batch_execute(&self.sql(queries::CREATE_GOVERNANCE_STATUS_INDEX))
            .await?;

        info!("✅ Governance table {} ready", self.table);
        Ok(())
    }

    async fn insert(&self, record: NewRecord) -> Result<GovernanceRecord, AppError> {
        let client = self.pool.get().await?;
        let location = &record.location;

        let row = client
            .query_one(
                &self.sql(queries::INSERT_RECORD),
                &[
                    &record.object_type.as_str(),
                    &location.catalog_name,
                    &location.schema_name,
                    &location.table_name,
                    &location.column_name,
                    &location.column_data_type,
                    &record.ai_generated_description,
                    &record.generated_at,
                    &record.model_used,
                ],
            )
            .await?;

        let inserted = record_from_row(&row)?;
        debug!("Stored {} record {} for {}", inserted.object_type, inserted.id, inserted.object_path());
        Ok(inserted)
    }

    async fn get(&self, id: i64) -> Result<Option<GovernanceRecord>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(&self.sql(queries::GET_RECORD), &[&id]).await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn record_review(&self, decision: ReviewDecision) -> Result<GovernanceRecord, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                &self.sql(queries::REVIEW_RECORD),
                &[
                    &decision.id,
                    &decision.status.as_str(),
                    &decision.approved_description,
                    &decision.reviewer,
                    &decision.expected.as_str(),
                    &decision.reviewed_at,
                ],
            )
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            // Nothing matched: either the id is unknown or the status moved underneath us
            None => match self.get(decision.id).await? {
                None => Err(AppError::NotFound(format!("Record {} not found", decision.id))),
                Some(current) => Err(AppError::Conflict(format!(
                    "Record {} is {}, expected {}",
                    decision.id, current.review_status, decision.expected
                ))),
            },
        }
    }

    async fn list_apply_candidates(&self) -> Result<Vec<GovernanceRecord>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(&self.sql(queries::LIST_APPLY_CANDIDATES), &[]).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn mark_applied(&self, id: i64, applied_at: DateTime<Utc>) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(&self.sql(queries::MARK_APPLIED), &[&id, &applied_at])
            .await?;

        if updated == 0 {
            return Err(AppError::Conflict(format!(
                "Record {} is no longer APPROVED",
                id
            )));
        }
        Ok(())
    }

    async fn record_apply_failure(
        &self,
        id: i64,
        error: &str,
        max_attempts: u32,
    ) -> Result<ApplyFailureOutcome, AppError> {
        let client = self.pool.get().await?;
        let max_attempts = i32::try_from(max_attempts).unwrap_or(i32::MAX);

        let row = client
            .query_opt(
                &self.sql(queries::RECORD_APPLY_FAILURE),
                &[&id, &error, &max_attempts],
            )
            .await?
            .ok_or_else(|| AppError::Conflict(format!("Record {} is no longer APPROVED", id)))?;

        let status: String = row.try_get("review_status")?;
        Ok(ApplyFailureOutcome {
            status: status.parse().map_err(AppError::Internal)?,
            attempts: row.try_get("apply_attempts")?,
        })
    }

    async fn review_queue(&self, limit: i64, offset: i64) -> Result<Vec<GovernanceRecord>, AppError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(&self.sql(queries::LIST_REVIEW_QUEUE), &[&limit, &offset])
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn statistics(&self) -> Result<GovernanceStats, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_one(&self.sql(queries::STATISTICS), &[]).await?;

        Ok(GovernanceStats {
            total: row.try_get("total")?,
            pending: row.try_get("pending")?,
            approved: row.try_get("approved")?,
            rejected: row.try_get("rejected")?,
            applied: row.try_get("applied")?,
            dead: row.try_get("dead")?,
            tables: row.try_get("tables")?,
            columns: row.try_get("columns")?,
        })
    }

    async fn schema_progress(&self) -> Result<Vec<SchemaProgress>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(&self.sql(queries::SCHEMA_PROGRESS), &[]).await?;

        let mut progress = rows
            .iter()
            .map(|row| {
                Ok(SchemaProgress::new(
                    row.try_get("schema_name")?,
                    row.try_get("total")?,
                    row.try_get("completed")?,
                    row.try_get("pending")?,
                ))
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        sort_progress(&mut progress);
        Ok(progress)
    }

    async fn review_activity(&self) -> Result<Vec<ReviewActivity>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(&self.sql(queries::REVIEW_ACTIVITY), &[]).await?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("review_status")?;
                Ok(ReviewActivity {
                    reviewer: row.try_get("reviewer")?,
                    review_status: status.parse().map_err(AppError::Internal)?,
                    count: row.try_get("count")?,
                    first_review: row.try_get("first_review")?,
                    last_review: row.try_get("last_review")?,
                })
            })
            .collect()
    }
}
