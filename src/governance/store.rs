//! Governance record storage
//!
//! The store is the only shared mutable resource of the workflow. Status
//! changes are compare-and-set so concurrent reviewers cannot silently
//! overwrite each other.

use crate::error::AppError;
use crate::governance::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence for governance records
#[async_trait]
pub trait GovernanceStore: Send + Sync {
    /// Create the backing storage if it does not exist (idempotent)
    async fn setup(&self) -> Result<(), AppError>;

    /// Persist a new PENDING record
    async fn insert(&self, record: NewRecord) -> Result<GovernanceRecord, AppError>;

    async fn get(&self, id: i64) -> Result<Option<GovernanceRecord>, AppError>;

    /// Apply a review decision if the record is still in `decision.expected`.
    ///
    /// Fails with `NotFound` for an unknown id and `Conflict` when the status moved.
    async fn record_review(&self, decision: ReviewDecision) -> Result<GovernanceRecord, AppError>;

    /// Every APPROVED record whose `applied_at` is unset
    async fn list_apply_candidates(&self) -> Result<Vec<GovernanceRecord>, AppError>;

    /// APPROVED → APPLIED
    async fn mark_applied(&self, id: i64, applied_at: DateTime<Utc>) -> Result<(), AppError>;

    /// Count a failed apply, moving the record to DEAD once `max_attempts` is reached
    async fn record_apply_failure(
        &self,
        id: i64,
        error: &str,
        max_attempts: u32,
    ) -> Result<ApplyFailureOutcome, AppError>;

    /// Dashboard queue ordered by status rank, newest first
    async fn review_queue(&self, limit: i64, offset: i64) -> Result<Vec<GovernanceRecord>, AppError>;

    async fn statistics(&self) -> Result<GovernanceStats, AppError>;

    async fn schema_progress(&self) -> Result<Vec<SchemaProgress>, AppError>;

    async fn review_activity(&self) -> Result<Vec<ReviewActivity>, AppError>;
}

/// Shared handle used across handlers and services
pub type SharedStore = Arc<dyn GovernanceStore>;

/// Process-local store
pub struct InMemoryGovernanceStore {
    records: Arc<RwLock<BTreeMap<i64, GovernanceRecord>>>,
    next_id: Arc<RwLock<i64>>,
}

impl InMemoryGovernanceStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(RwLock::new(1)),
        }
    }

    /// Snapshot of every record, in id order
    #[cfg(test)]
    pub async fn all(&self) -> Vec<GovernanceRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

impl Default for InMemoryGovernanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GovernanceStore for InMemoryGovernanceStore {
    async fn setup(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert(&self, record: NewRecord) -> Result<GovernanceRecord, AppError> {
        let mut next_id = self.next_id.write().await;
        let id = *next_id;
        *next_id += 1;

        let record = GovernanceRecord::from_new(id, record);
        self.records.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<GovernanceRecord>, AppError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn record_review(&self, decision: ReviewDecision) -> Result<GovernanceRecord, AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&decision.id)
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found", decision.id)))?;

        if record.review_status != decision.expected {
            return Err(AppError::Conflict(format!(
                "Record {} is {}, expected {}",
                decision.id, record.review_status, decision.expected
            )));
        }

        record.review_status = decision.status;
        record.approved_description = Some(
            decision
                .approved_description
                .unwrap_or_else(|| record.ai_generated_description.clone()),
        );
        record.reviewer = Some(decision.reviewer);
        record.reviewed_at = Some(decision.reviewed_at);
        Ok(record.clone())
    }

    async fn list_apply_candidates(&self) -> Result<Vec<GovernanceRecord>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.awaiting_apply())
            .cloned()
            .collect())
    }

    async fn mark_applied(&self, id: i64, applied_at: DateTime<Utc>) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found", id)))?;

        if record.review_status != ReviewStatus::Approved {
            return Err(AppError::Conflict(format!(
                "Record {} is {}, only APPROVED records can be applied",
                id, record.review_status
            )));
        }

        record.review_status = ReviewStatus::Applied;
        record.applied_at = Some(applied_at);
        Ok(())
    }

    async fn record_apply_failure(
        &self,
        id: i64,
        error: &str,
        max_attempts: u32,
    ) -> Result<ApplyFailureOutcome, AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found", id)))?;

        if record.review_status != ReviewStatus::Approved {
            return Err(AppError::Conflict(format!(
                "Record {} is {}, not APPROVED",
                id, record.review_status
            )));
        }

        record.apply_attempts += 1;
        record.last_apply_error = Some(error.to_string());
        if record.apply_attempts as i64 >= max_attempts as i64 {
            record.review_status = ReviewStatus::Dead;
        }

        Ok(ApplyFailureOutcome {
            status: record.review_status,
            attempts: record.apply_attempts,
        })
    }

    async fn review_queue(&self, limit: i64, offset: i64) -> Result<Vec<GovernanceRecord>, AppError> {
        let records = self.records.read().await;
        let mut queue: Vec<_> = records
            .values()
            .filter(|r| r.review_status.queue_rank().is_some())
            .cloned()
            .collect();

        queue.sort_by(|a, b| {
            a.review_status
                .queue_rank()
                .cmp(&b.review_status.queue_rank())
                .then_with(|| b.generated_at.cmp(&a.generated_at))
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(queue
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn statistics(&self) -> Result<GovernanceStats, AppError> {
        let records = self.records.read().await;
        let mut stats = GovernanceStats::default();

        for record in records.values() {
            stats.total += 1;
            match record.review_status {
                ReviewStatus::Pending => stats.pending += 1,
                ReviewStatus::Approved => stats.approved += 1,
                ReviewStatus::Rejected => stats.rejected += 1,
                ReviewStatus::Applied => stats.applied += 1,
                ReviewStatus::Dead => stats.dead += 1,
            }
            match record.object_type {
                ObjectType::Table => stats.tables += 1,
                ObjectType::Column => stats.columns += 1,
            }
        }

        Ok(stats)
    }

    async fn schema_progress(&self) -> Result<Vec<SchemaProgress>, AppError> {
        let records = self.records.read().await;
        let mut by_schema: HashMap<&str, (i64, i64, i64)> = HashMap::new();

        for record in records.values() {
            let entry = by_schema.entry(record.location.schema_name.as_str()).or_default();
            entry.0 += 1;
            match record.review_status {
                ReviewStatus::Applied => entry.1 += 1,
                ReviewStatus::Pending => entry.2 += 1,
                _ => {}
            }
        }

        let mut progress: Vec<_> = by_schema
            .into_iter()
            .map(|(schema, (total, completed, pending))| {
                SchemaProgress::new(schema.to_string(), total, completed, pending)
            })
            .collect();
        sort_progress(&mut progress);
        Ok(progress)
    }

    async fn review_activity(&self) -> Result<Vec<ReviewActivity>, AppError> {
        let records = self.records.read().await;
        let mut grouped: BTreeMap<(String, &'static str), ReviewActivity> = BTreeMap::new();

        for record in records.values() {
            let Some(reviewer) = &record.reviewer else {
                continue;
            };
            let key = (reviewer.clone(), record.review_status.as_str());
            let activity = grouped.entry(key).or_insert_with(|| ReviewActivity {
                reviewer: reviewer.clone(),
                review_status: record.review_status,
                count: 0,
                first_review: None,
                last_review: None,
            });

            activity.count += 1;
            if let Some(at) = record.reviewed_at {
                activity.first_review = Some(activity.first_review.map_or(at, |f| f.min(at)));
                activity.last_review = Some(activity.last_review.map_or(at, |l| l.max(at)));
            }
        }

        Ok(grouped.into_values().collect())
    }
}
