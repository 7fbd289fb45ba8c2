//! Governance record data models
//!
//! One record per generated description, tracked through review and apply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of catalog object a description belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Table,
    Column,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Table => "TABLE",
            ObjectType::Column => "COLUMN",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TABLE" => Ok(ObjectType::Table),
            "COLUMN" => Ok(ObjectType::Column),
            other => Err(format!("Invalid object type: {}", other)),
        }
    }
}

/// Review status in the governance workflow
///
/// ```text
/// PENDING ──► APPROVED ──► APPLIED
///    │            │
///    ▼            ▼
/// REJECTED       DEAD
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    /// Generated, waiting for a reviewer
    Pending,
    /// Accepted by a reviewer, not yet written to the catalog
    Approved,
    /// Declined by a reviewer
    Rejected,
    /// Written to the catalog
    Applied,
    /// Apply failed too many times
    Dead,
}

impl Default for ReviewStatus {
    fn default() -> Self {
        ReviewStatus::Pending
    }
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Approved => "APPROVED",
            ReviewStatus::Rejected => "REJECTED",
            ReviewStatus::Applied => "APPLIED",
            ReviewStatus::Dead => "DEAD",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReviewStatus::Rejected | ReviewStatus::Applied | ReviewStatus::Dead
        )
    }

    pub fn can_transition_to(&self, next: ReviewStatus) -> bool {
        matches!(
            (self, next),
            (ReviewStatus::Pending, ReviewStatus::Approved)
                | (ReviewStatus::Pending, ReviewStatus::Rejected)
                | (ReviewStatus::Approved, ReviewStatus::Applied)
                | (ReviewStatus::Approved, ReviewStatus::Dead)
        )
    }

    /// Position in the review queue ordering
    pub fn queue_rank(&self) -> Option<u8> {
        match self {
            ReviewStatus::Pending => Some(1),
            ReviewStatus::Approved => Some(2),
            ReviewStatus::Dead => Some(3),
            ReviewStatus::Applied => Some(4),
            ReviewStatus::Rejected => None,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ReviewStatus::Pending),
            "APPROVED" => Ok(ReviewStatus::Approved),
            "REJECTED" => Ok(ReviewStatus::Rejected),
            "APPLIED" => Ok(ReviewStatus::Applied),
            "DEAD" => Ok(ReviewStatus::Dead),
            other => Err(format!("Invalid status: {}", other)),
        }
    }
}

/// Identifies exactly one catalog object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLocation {
    pub catalog_name: String,
    pub schema_name: String,
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_data_type: Option<String>,
}

impl ObjectLocation {
    pub fn table(catalog: &str, schema: &str, table: &str) -> Self {
        Self {
            catalog_name: catalog.to_string(),
            schema_name: schema.to_string(),
            table_name: table.to_string(),
            column_name: None,
            column_data_type: None,
        }
    }

    pub fn column(catalog: &str, schema: &str, table: &str, column: &str, data_type: &str) -> Self {
        Self {
            column_name: Some(column.to_string()),
            column_data_type: Some(data_type.to_string()),
            ..Self::table(catalog, schema, table)
        }
    }

    /// `catalog.schema.table[.column]`
    pub fn path(&self) -> String {
        let mut path = format!("{}.{}.{}", self.catalog_name, self.schema_name, self.table_name);
        if let Some(column) = &self.column_name {
            path.push('.');
            path.push_str(column);
        }
        path
    }
}

/// A generated description awaiting persistence
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub object_type: ObjectType,
    pub location: ObjectLocation,
    pub ai_generated_description: String,
    pub generated_at: DateTime<Utc>,
    pub model_used: String,
}

/// A persisted governance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceRecord {
    pub id: i64,
    pub object_type: ObjectType,
    #[serde(flatten)]
    pub location: ObjectLocation,
    pub ai_generated_description: String,
    pub approved_description: Option<String>,
    pub review_status: ReviewStatus,
    pub reviewer: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,
    pub model_used: String,
    /// Reserved quality signal in [0, 1]; never populated by generation
    pub confidence_score: Option<f64>,
    pub apply_attempts: i32,
    pub last_apply_error: Option<String>,
}

impl GovernanceRecord {
    /// Materialize a freshly inserted record
    pub fn from_new(id: i64, new: NewRecord) -> Self {
        Self {
            id,
            object_type: new.object_type,
            location: new.location,
            ai_generated_description: new.ai_generated_description,
            approved_description: None,
            review_status: ReviewStatus::Pending,
            reviewer: None,
            generated_at: new.generated_at,
            reviewed_at: None,
            applied_at: None,
            model_used: new.model_used,
            confidence_score: None,
            apply_attempts: 0,
            last_apply_error: None,
        }
    }

    pub fn object_path(&self) -> String {
        self.location.path()
    }

    /// Whether the reconciler should pick this record up
    pub fn awaiting_apply(&self) -> bool {
        self.review_status == ReviewStatus::Approved && self.applied_at.is_none()
    }
}

/// A reviewer's decision, applied only while the record is still in `expected`
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub id: i64,
    pub expected: ReviewStatus,
    pub status: ReviewStatus,
    /// `None` copies the AI-generated text
    pub approved_description: Option<String>,
    pub reviewer: String,
    pub reviewed_at: DateTime<Utc>,
}

/// Outcome of recording one failed apply attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyFailureOutcome {
    pub status: ReviewStatus,
    pub attempts: i32,
}

// =============================================================================
// AGGREGATES
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceStats {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub applied: i64,
    pub dead: i64,
    pub tables: i64,
    pub columns: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaProgress {
    pub schema_name: String,
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
    pub pct_complete: f64,
}

impl SchemaProgress {
    pub fn new(schema_name: String, total: i64, completed: i64, pending: i64) -> Self {
        Self {
            schema_name,
            total,
            completed,
            pending,
            pct_complete: percentage(completed, total),
        }
    }
}

/// Sort progress rows by completion, best first, then by schema name
pub fn sort_progress(rows: &mut [SchemaProgress]) {
    rows.sort_by(|a, b| {
        b.pct_complete
            .total_cmp(&a.pct_complete)
            .then_with(|| a.schema_name.cmp(&b.schema_name))
    });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewActivity {
    pub reviewer: String,
    pub review_status: ReviewStatus,
    pub count: i64,
    pub first_review: Option<DateTime<Utc>>,
    pub last_review: Option<DateTime<Utc>>,
}

/// Documentation coverage of one schema, computed from live catalog metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCoverage {
    pub schema_name: String,
    pub total_tables: i64,
    pub documented: i64,
    pub missing: i64,
    pub pct_complete: f64,
}

/// Percentage rounded to two decimals; zero when `total` is zero
pub fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (10_000.0 * part as f64 / total as f64).round() / 100.0
}
