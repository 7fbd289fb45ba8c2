//! Review gateway
//!
//! The only way a reviewer can move a record. Only PENDING records are
//! reviewable, and the store write is conditional on the status observed here.

use crate::error::AppError;
use crate::governance::models::{GovernanceRecord, ReviewDecision, ReviewStatus};
use crate::governance::store::SharedStore;
use chrono::Utc;
use tracing::info;

pub const UNKNOWN_REVIEWER: &str = "unknown";

pub struct ReviewGateway {
    store: SharedStore,
}

impl ReviewGateway {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Record a reviewer's decision on one record.
    ///
    /// Without a non-empty `approved_text` the AI-generated text is kept as the
    /// approved description. Provided text is stored as given.
    pub async fn update_status(
        &self,
        record_id: i64,
        status: &str,
        approved_text: Option<String>,
        reviewer: &str,
    ) -> Result<GovernanceRecord, AppError> {
        if record_id <= 0 {
            return Err(AppError::Validation(format!("Invalid record id: {}", record_id)));
        }
        let status = parse_review_status(status)?;

        let current = self
            .store
            .get(record_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found", record_id)))?;

        if status == ReviewStatus::Applied {
            return Err(AppError::Conflict(
                "Records become APPLIED only when the apply step writes them".to_string(),
            ));
        }
        if !current.review_status.can_transition_to(status) {
            let reason = if current.review_status.is_terminal() {
                "is final"
            } else {
                "was already reviewed"
            };
            return Err(AppError::Conflict(format!(
                "Record {} {} ({})",
                record_id, reason, current.review_status
            )));
        }

        let reviewer = match reviewer.trim() {
            "" => UNKNOWN_REVIEWER.to_string(),
            name => name.to_string(),
        };
        let approved_description = approved_text.filter(|text| !text.is_empty());

        let updated = self
            .store
            .record_review(ReviewDecision {
                id: record_id,
                expected: current.review_status,
                status,
                approved_description,
                reviewer,
                reviewed_at: Utc::now(),
            })
            .await?;

        info!(
            "Record {} ({}) marked {} by {}",
            updated.id,
            updated.object_path(),
            updated.review_status,
            updated.reviewer.as_deref().unwrap_or(UNKNOWN_REVIEWER)
        );
        Ok(updated)
    }
}

/// Reviewers may ask for APPROVED, REJECTED or APPLIED
fn parse_review_status(value: &str) -> Result<ReviewStatus, AppError> {
    match value.parse::<ReviewStatus>() {
        Ok(status @ (ReviewStatus::Approved | ReviewStatus::Rejected | ReviewStatus::Applied)) => Ok(status),
        Ok(other) => Err(AppError::Validation(format!("Invalid review status: {}", other))),
        Err(e) => Err(AppError::Validation(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::models::{NewRecord, ObjectLocation, ObjectType};
    use crate::governance::store::{GovernanceStore, InMemoryGovernanceStore};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn setup() -> (Arc<InMemoryGovernanceStore>, ReviewGateway, i64) {
        let store = Arc::new(InMemoryGovernanceStore::new());
        let record = store
            .insert(NewRecord {
                object_type: ObjectType::Table,
                location: ObjectLocation::table("main", "sales", "orders"),
                ai_generated_description: "Customer orders.".to_string(),
                generated_at: Utc::now(),
                model_used: "test-model".to_string(),
            })
            .await
            .unwrap();
        let gateway = ReviewGateway::new(store.clone());
        (store, gateway, record.id)
    }

    #[tokio::test]
    async fn test_approve_copies_generated_text() {
        let (_, gateway, id) = setup().await;

        let record = tokio_test::assert_ok!(gateway.update_status(id, "APPROVED", None, "alice").await);

        assert_eq!(record.review_status, ReviewStatus::Approved);
        assert_eq!(record.approved_description.as_deref(), Some("Customer orders."));
        assert_eq!(record.reviewer.as_deref(), Some("alice"));
        assert!(record.reviewed_at.is_some());
        assert!(record.applied_at.is_none());
    }

    #[tokio::test]
    async fn test_reviewer_text_is_stored_verbatim() {
        let (_, gateway, id) = setup().await;

        let record = gateway
            .update_status(id, "approved", Some("Orders placed by O'Brien's team".to_string()), "bob")
            .await
            .unwrap();

        assert_eq!(
            record.approved_description.as_deref(),
            Some("Orders placed by O'Brien's team")
        );
    }

    #[tokio::test]
    async fn test_empty_text_and_reviewer_fall_back() {
        let (_, gateway, id) = setup().await;

        let record = gateway
            .update_status(id, "REJECTED", Some(String::new()), "  ")
            .await
            .unwrap();

        assert_eq!(record.review_status, ReviewStatus::Rejected);
        assert_eq!(record.approved_description.as_deref(), Some("Customer orders."));
        assert_eq!(record.reviewer.as_deref(), Some(UNKNOWN_REVIEWER));
    }

    #[tokio::test]
    async fn test_whitespace_text_is_kept_as_given() {
        let (_, gateway, id) = setup().await;

        let record = gateway
            .update_status(id, "APPROVED", Some("  Orders  ".to_string()), "alice")
            .await
            .unwrap();

        assert_eq!(record.approved_description.as_deref(), Some("  Orders  "));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let (_, gateway, id) = setup().await;

        for status in ["PENDING", "DEAD", "MAYBE", ""] {
            let result = gateway.update_status(id, status, None, "alice").await;
            assert!(matches!(result, Err(AppError::Validation(_))), "status {:?}", status);
        }
        assert!(matches!(
            gateway.update_status(0, "APPROVED", None, "alice").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            gateway.update_status(999, "APPROVED", None, "alice").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_applied_is_reserved_for_apply_step() {
        let (store, gateway, id) = setup().await;

        let err = tokio_test::assert_err!(gateway.update_status(id, "APPLIED", None, "alice").await);

        assert!(matches!(err, AppError::Conflict(_)));
        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.review_status, ReviewStatus::Pending);
        assert!(record.applied_at.is_none());
    }

    #[tokio::test]
    async fn test_second_review_conflicts() {
        let (store, gateway, id) = setup().await;
        gateway.update_status(id, "APPROVED", None, "alice").await.unwrap();

        let result = gateway.update_status(id, "REJECTED", None, "bob").await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.review_status, ReviewStatus::Approved);
        assert_eq!(record.reviewer.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_concurrent_reviewers_one_wins() {
        let (_, gateway, id) = setup().await;
        let gateway = Arc::new(gateway);

        let a = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.update_status(id, "APPROVED", None, "alice").await }
        });
        let b = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.update_status(id, "REJECTED", None, "bob").await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_)))));
    }
}
