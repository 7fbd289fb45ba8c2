//! Apply reconciler
//!
//! Writes every approved-but-unapplied description into the catalog. One bad
//! record never blocks the rest: it stays APPROVED with its attempt counted,
//! and moves to DEAD once the attempt ceiling is reached.

use crate::catalog::{SharedCatalog, TableRef};
use crate::db::queries::validate_identifier;
use crate::error::AppError;
use crate::governance::models::{GovernanceRecord, ObjectType, ReviewStatus};
use crate::governance::store::SharedStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySummary {
    pub applied: usize,
    pub errors: usize,
    /// Records that reached the attempt ceiling during this pass
    pub dead_lettered: usize,
}

enum Applied {
    Written,
    ByConcurrentPass,
}

pub struct ApplyReconciler {
    catalog: SharedCatalog,
    store: SharedStore,
    max_attempts: u32,
}

impl ApplyReconciler {
    pub fn new(catalog: SharedCatalog, store: SharedStore, max_attempts: u32) -> Self {
        Self {
            catalog,
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Apply every APPROVED record with no `applied_at`.
    ///
    /// Only a failure to enumerate the candidates is returned as an error.
    pub async fn apply_all_approved(&self) -> Result<ApplySummary, AppError> {
        let candidates = self.store.list_apply_candidates().await?;
        let mut summary = ApplySummary::default();

        if candidates.is_empty() {
            info!("No approved descriptions to apply");
            return Ok(summary);
        }

        for record in &candidates {
            match self.apply_one(record).await {
                Ok(Applied::Written) => summary.applied += 1,
                Ok(Applied::ByConcurrentPass) => {
                    debug!("Record {} was applied by a concurrent pass", record.id);
                }
                Err(e) => {
                    summary.errors += 1;
                    warn!(
                        "Applying record {} ({}) failed: {}",
                        record.id,
                        record.object_path(),
                        e
                    );
                    self.record_failure(record, &e.to_string(), &mut summary).await;
                }
            }
        }

        info!(
            "Apply finished: {} applied, {} errors, {} dead-lettered",
            summary.applied, summary.errors, summary.dead_lettered
        );
        Ok(summary)
    }

    async fn apply_one(&self, record: &GovernanceRecord) -> Result<Applied, AppError> {
        let location = &record.location;
        let table = TableRef::new(&location.catalog_name, &location.schema_name, &location.table_name);
        table.validate()?;

        let text = record
            .approved_description
            .as_deref()
            .unwrap_or(&record.ai_generated_description);

        match record.object_type {
            ObjectType::Table => self.catalog.set_table_comment(&table, text).await?,
            ObjectType::Column => {
                let column = location.column_name.as_deref().ok_or_else(|| {
                    AppError::Validation(format!("Column record {} has no column name", record.id))
                })?;
                validate_identifier(column, "column")?;
                self.catalog.set_column_comment(&table, column, text).await?
            }
        }

        // A failure here leaves the record APPROVED; rewriting the same comment next pass is harmless
        match self.store.mark_applied(record.id, Utc::now()).await {
            Ok(()) => Ok(Applied::Written),
            // Another pass moved it out of APPROVED after writing the same comment
            Err(AppError::Conflict(_)) => Ok(Applied::ByConcurrentPass),
            Err(e) => Err(e),
        }
    }

    async fn record_failure(&self, record: &GovernanceRecord, message: &str, summary: &mut ApplySummary) {
        match self
            .store
            .record_apply_failure(record.id, message, self.max_attempts)
            .await
        {
            Ok(outcome) if outcome.status == ReviewStatus::Dead => {
                summary.dead_lettered += 1;
                warn!(
                    "Record {} moved to DEAD after {} failed attempts",
                    record.id, outcome.attempts
                );
            }
            Ok(_) => {}
            Err(e) => error!("Cannot record apply failure for record {}: {}", record.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fake::{CommentWrite, FakeCatalog};
    use crate::governance::models::*;
    use crate::governance::review::ReviewGateway;
    use crate::governance::store::{GovernanceStore, InMemoryGovernanceStore};
    use async_trait::async_trait;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    async fn approved(store: &InMemoryGovernanceStore, location: ObjectLocation, text: &str) -> i64 {
        let object_type = if location.column_name.is_some() {
            ObjectType::Column
        } else {
            ObjectType::Table
        };
        let record = store
            .insert(NewRecord {
                object_type,
                location,
                ai_generated_description: text.to_string(),
                generated_at: Utc::now(),
                model_used: "test-model".to_string(),
            })
            .await
            .unwrap();
        store
            .record_review(ReviewDecision {
                id: record.id,
                expected: ReviewStatus::Pending,
                status: ReviewStatus::Approved,
                approved_description: None,
                reviewer: "alice".to_string(),
                reviewed_at: Utc::now(),
            })
            .await
            .unwrap();
        record.id
    }

    async fn seeded() -> (Arc<FakeCatalog>, Arc<InMemoryGovernanceStore>, Vec<i64>) {
        let catalog = Arc::new(FakeCatalog::new());
        let store = Arc::new(InMemoryGovernanceStore::new());
        let ids = vec![
            approved(&store, ObjectLocation::table("main", "sales", "orders"), "Customer orders.").await,
            approved(
                &store,
                ObjectLocation::column("main", "sales", "orders", "id", "bigint"),
                "Order identifier.",
            )
            .await,
            approved(
                &store,
                ObjectLocation::column("main", "sales", "orders", "status", "text"),
                "Lifecycle state of the order.",
            )
            .await,
        ];
        (catalog, store, ids)
    }

    #[tokio::test]
    async fn test_nothing_to_apply() {
        let catalog = Arc::new(FakeCatalog::new());
        let store = Arc::new(InMemoryGovernanceStore::new());
        let reconciler = ApplyReconciler::new(catalog.clone(), store.clone(), 5);

        let summary = reconciler.apply_all_approved().await.unwrap();

        assert_eq!(summary, ApplySummary::default());
        assert!(catalog.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_applies_table_and_column_comments() {
        let (catalog, store, ids) = seeded().await;
        let reconciler = ApplyReconciler::new(catalog.clone(), store.clone(), 5);

        let summary = reconciler.apply_all_approved().await.unwrap();

        assert_eq!(
            summary,
            ApplySummary {
                applied: 3,
                errors: 0,
                dead_lettered: 0
            }
        );
        let orders = TableRef::new("main", "sales", "orders");
        assert_eq!(
            catalog.writes().await,
            vec![
                CommentWrite::Table {
                    table: orders.clone(),
                    comment: "Customer orders.".to_string()
                },
                CommentWrite::Column {
                    table: orders.clone(),
                    column: "id".to_string(),
                    comment: "Order identifier.".to_string()
                },
                CommentWrite::Column {
                    table: orders,
                    column: "status".to_string(),
                    comment: "Lifecycle state of the order.".to_string()
                },
            ]
        );
        for id in ids {
            let record = store.get(id).await.unwrap().unwrap();
            assert_eq!(record.review_status, ReviewStatus::Applied);
            assert!(record.applied_at.is_some());
        }

        // A second pass finds nothing left to do
        let again = reconciler.apply_all_approved().await.unwrap();
        assert_eq!(again, ApplySummary::default());
    }

    #[tokio::test]
    async fn test_partial_failure_is_retried_next_pass() {
        let (catalog, store, ids) = seeded().await;
        catalog.fail_writes_to("main.sales.orders.status").await;
        let reconciler = ApplyReconciler::new(catalog.clone(), store.clone(), 5);

        let first = reconciler.apply_all_approved().await.unwrap();
        assert_eq!((first.applied, first.errors), (2, 1));

        let failed = store.get(ids[2]).await.unwrap().unwrap();
        assert_eq!(failed.review_status, ReviewStatus::Approved);
        assert_eq!(failed.apply_attempts, 1);
        assert!(failed.applied_at.is_none());
        assert!(failed.last_apply_error.unwrap().contains("COMMENT failed"));

        catalog.heal_writes_to("main.sales.orders.status").await;
        let second = reconciler.apply_all_approved().await.unwrap();
        assert_eq!((second.applied, second.errors), (1, 0));
        assert_eq!(catalog.writes().await.len(), 3);
    }

    #[tokio::test]
    async fn test_reviewer_text_is_what_gets_written() {
        let catalog = Arc::new(FakeCatalog::new());
        let store = Arc::new(InMemoryGovernanceStore::new());
        let record = store
            .insert(NewRecord {
                object_type: ObjectType::Table,
                location: ObjectLocation::table("main", "hr", "staff"),
                ai_generated_description: "Staff.".to_string(),
                generated_at: Utc::now(),
                model_used: "test-model".to_string(),
            })
            .await
            .unwrap();
        ReviewGateway::new(store.clone())
            .update_status(record.id, "APPROVED", Some("Staff managed by O'Brien".to_string()), "alice")
            .await
            .unwrap();

        ApplyReconciler::new(catalog.clone(), store.clone(), 5)
            .apply_all_approved()
            .await
            .unwrap();

        assert_eq!(
            catalog.writes().await,
            vec![CommentWrite::Table {
                table: TableRef::new("main", "hr", "staff"),
                comment: "Staff managed by O'Brien".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_dead_letter_after_max_attempts() {
        let (catalog, store, ids) = seeded().await;
        catalog.fail_writes_to("main.sales.orders").await;
        let reconciler = ApplyReconciler::new(catalog.clone(), store.clone(), 2);

        let first = reconciler.apply_all_approved().await.unwrap();
        assert_eq!(first.dead_lettered, 0);

        let second = reconciler.apply_all_approved().await.unwrap();
        assert_eq!(
            second,
            ApplySummary {
                applied: 0,
                errors: 1,
                dead_lettered: 1
            }
        );

        let dead = store.get(ids[0]).await.unwrap().unwrap();
        assert_eq!(dead.review_status, ReviewStatus::Dead);
        assert_eq!(dead.apply_attempts, 2);

        // Dead records are no longer candidates
        let third = reconciler.apply_all_approved().await.unwrap();
        assert_eq!(third, ApplySummary::default());
    }

    #[tokio::test]
    async fn test_invalid_identifier_is_a_record_failure() {
        let catalog = Arc::new(FakeCatalog::new());
        let store = Arc::new(InMemoryGovernanceStore::new());
        let bad = approved(&store, ObjectLocation::table("main", "sales", "orders;--"), "Bad.").await;
        let good = approved(&store, ObjectLocation::table("main", "sales", "orders"), "Good.").await;

        let summary = ApplyReconciler::new(catalog.clone(), store.clone(), 5)
            .apply_all_approved()
            .await
            .unwrap();

        assert_eq!((summary.applied, summary.errors), (1, 1));
        let bad = store.get(bad).await.unwrap().unwrap();
        assert_eq!(bad.review_status, ReviewStatus::Approved);
        assert!(bad.last_apply_error.unwrap().contains("table"));
        assert_eq!(
            store.get(good).await.unwrap().unwrap().review_status,
            ReviewStatus::Applied
        );
    }

    /// Delegates to the in-memory store but fails `mark_applied` once, or lets
    /// another pass apply every candidate right after they are listed
    struct FlakyStore {
        inner: InMemoryGovernanceStore,
        fail_next_mark: AtomicBool,
        race_after_list: AtomicBool,
    }

    impl FlakyStore {
        fn new(inner: InMemoryGovernanceStore) -> Self {
            Self {
                inner,
                fail_next_mark: AtomicBool::new(false),
                race_after_list: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl GovernanceStore for FlakyStore {
        async fn setup(&self) -> Result<(), AppError> {
            self.inner.setup().await
        }
        async fn insert(&self, record: NewRecord) -> Result<GovernanceRecord, AppError> {
            self.inner.insert(record).await
        }
        async fn get(&self, id: i64) -> Result<Option<GovernanceRecord>, AppError> {
            self.inner.get(id).await
        }
        async fn record_review(&self, decision: ReviewDecision) -> Result<GovernanceRecord, AppError> {
            self.inner.record_review(decision).await
        }
        async fn list_apply_candidates(&self) -> Result<Vec<GovernanceRecord>, AppError> {
            let candidates = self.inner.list_apply_candidates().await?;
            if self.race_after_list.swap(false, Ordering::SeqCst) {
                for record in &candidates {
                    self.inner.mark_applied(record.id, Utc::now()).await?;
                }
            }
            Ok(candidates)
        }
        async fn mark_applied(&self, id: i64, applied_at: DateTime<Utc>) -> Result<(), AppError> {
            if self.fail_next_mark.swap(false, Ordering::SeqCst) {
                return Err(AppError::Internal("store unavailable".to_string()));
            }
            self.inner.mark_applied(id, applied_at).await
        }
        async fn record_apply_failure(
            &self,
            id: i64,
            error: &str,
            max_attempts: u32,
        ) -> Result<ApplyFailureOutcome, AppError> {
            self.inner.record_apply_failure(id, error, max_attempts).await
        }
        async fn review_queue(&self, limit: i64, offset: i64) -> Result<Vec<GovernanceRecord>, AppError> {
            self.inner.review_queue(limit, offset).await
        }
        async fn statistics(&self) -> Result<GovernanceStats, AppError> {
            self.inner.statistics().await
        }
        async fn schema_progress(&self) -> Result<Vec<SchemaProgress>, AppError> {
            self.inner.schema_progress().await
        }
        async fn review_activity(&self) -> Result<Vec<ReviewActivity>, AppError> {
            self.inner.review_activity().await
        }
    }

    #[tokio::test]
    async fn test_failed_mark_applied_rewrites_next_pass() {
        let catalog = Arc::new(FakeCatalog::new());
        let inner = InMemoryGovernanceStore::new();
        let id = approved(&inner, ObjectLocation::table("main", "sales", "orders"), "Customer orders.").await;
        let store = Arc::new(FlakyStore::new(inner));
        store.fail_next_mark.store(true, Ordering::SeqCst);
        let reconciler = ApplyReconciler::new(catalog.clone(), store.clone(), 5);

        let first = reconciler.apply_all_approved().await.unwrap();
        assert_eq!((first.applied, first.errors), (0, 1));
        assert_eq!(
            store.get(id).await.unwrap().unwrap().review_status,
            ReviewStatus::Approved
        );

        let second = reconciler.apply_all_approved().await.unwrap();
        assert_eq!((second.applied, second.errors), (1, 0));
        // Same comment written twice
        assert_eq!(catalog.writes().await.len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_pass_is_not_an_error() {
        let catalog = Arc::new(FakeCatalog::new());
        let inner = InMemoryGovernanceStore::new();
        let id = approved(&inner, ObjectLocation::table("main", "sales", "orders"), "Customer orders.").await;
        let store = Arc::new(FlakyStore::new(inner));
        store.race_after_list.store(true, Ordering::SeqCst);

        let summary = ApplyReconciler::new(catalog.clone(), store.clone(), 5)
            .apply_all_approved()
            .await
            .unwrap();

        assert_eq!(summary, ApplySummary::default());
        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.review_status, ReviewStatus::Applied);
        assert_eq!(record.apply_attempts, 0);
        assert!(record.last_apply_error.is_none());
    }
}
