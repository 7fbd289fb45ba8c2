//! Batch description generation
//!
//! Walks the target tables of one request, asks the generator for a table
//! description and one per undocumented column, and stores each result as a
//! PENDING governance record. Failures are counted per object and never stop
//! the batch.

use crate::catalog::{ColumnSummary, SharedCatalog, TableRef, TableSummary};
use crate::db::queries::validate_identifier;
use crate::error::AppError;
use crate::generation::limiter::RateLimiter;
use crate::generation::prompt::{column_prompt, table_prompt, SAMPLE_ROW_LIMIT};
use crate::governance::models::{GovernanceRecord, NewRecord, ObjectLocation, ObjectType};
use crate::governance::store::SharedStore;
use crate::llm::{is_soft_failure, SharedGenerator};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const MAX_BATCH_SIZE: usize = 100;
const PREVIEW_CHARS: usize = 100;

/// What to generate descriptions for
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub catalog: String,
    pub schema: Option<String>,
    /// Explicit table names; empty means "undocumented tables, up to `batch_size`"
    pub tables: Vec<String>,
    pub batch_size: usize,
}

impl GenerationRequest {
    pub fn new(catalog: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            schema: None,
            tables: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        validate_identifier(&self.catalog, "catalog")?;
        if let Some(schema) = &self.schema {
            validate_identifier(schema, "schema")?;
        }
        for table in &self.tables {
            validate_identifier(table, "table")?;
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(AppError::Validation(format!(
                "batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }
        Ok(())
    }
}

/// Preview of a stored table description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedItem {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub path: String,
    pub description: String,
}

impl GeneratedItem {
    fn preview(record: &GovernanceRecord) -> Self {
        let head: String = record
            .ai_generated_description
            .chars()
            .take(PREVIEW_CHARS)
            .collect();
        Self {
            object_type: record.object_type,
            path: record.object_path(),
            description: format!("{}...", head),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub total_found: usize,
    pub processing: usize,
    pub generated: usize,
    pub errors: usize,
    pub items: Vec<GeneratedItem>,
}

pub struct GenerationOrchestrator {
    catalog: SharedCatalog,
    generator: SharedGenerator,
    store: SharedStore,
    limiter: Arc<RateLimiter>,
}

impl GenerationOrchestrator {
    pub fn new(
        catalog: SharedCatalog,
        generator: SharedGenerator,
        store: SharedStore,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            catalog,
            generator,
            store,
            limiter,
        }
    }

    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationSummary, AppError> {
        request.validate()?;

        let candidates = self
            .catalog
            .list_tables(&request.catalog, request.schema.as_deref())
            .await?;
        let (total_found, targets) = select_targets(candidates, &request);

        info!(
            "Generating descriptions in {}.{}: {} candidate tables, processing {}",
            request.catalog,
            request.schema.as_deref().unwrap_or("*"),
            total_found,
            targets.len()
        );

        let mut summary = GenerationSummary {
            total_found,
            processing: targets.len(),
            ..Default::default()
        };

        for target in &targets {
            self.process_table(&target.table_ref(), &mut summary).await;
        }

        info!(
            "Generation finished: {} generated, {} errors",
            summary.generated, summary.errors
        );
        Ok(summary)
    }

    async fn process_table(&self, table: &TableRef, summary: &mut GenerationSummary) {
        let columns = match self.catalog.list_columns(table).await {
            Ok(columns) => columns,
            Err(e) => {
                warn!("Skipping {}: cannot read columns: {}", table.path(), e);
                summary.errors += 1;
                return;
            }
        };

        let samples = match self.catalog.sample_rows(table, SAMPLE_ROW_LIMIT).await {
            Ok(samples) => samples,
            Err(e) => {
                debug!("No sample rows for {}: {}", table.path(), e);
                Vec::new()
            }
        };

        let location = ObjectLocation::table(&table.catalog, &table.schema, &table.table);
        let prompt = table_prompt(table, &columns, &samples);
        match self.describe(ObjectType::Table, location, &prompt).await {
            Ok(record) => {
                summary.generated += 1;
                summary.items.push(GeneratedItem::preview(&record));
            }
            Err(e) => {
                warn!("Table description for {} failed: {}", table.path(), e);
                summary.errors += 1;
            }
        }

        for column in columns.iter().filter(|c| !c.is_documented()) {
            let location = column_location(table, column);
            let prompt = column_prompt(table, column, &samples);
            match self.describe(ObjectType::Column, location, &prompt).await {
                Ok(_) => summary.generated += 1,
                Err(e) => {
                    warn!(
                        "Column description for {}.{} failed: {}",
                        table.path(),
                        column.column_name,
                        e
                    );
                    summary.errors += 1;
                }
            }
        }
    }

    /// Generate one description and persist it as PENDING
    async fn describe(
        &self,
        object_type: ObjectType,
        location: ObjectLocation,
        prompt: &str,
    ) -> Result<GovernanceRecord, AppError> {
        self.limiter.acquire().await;

        let text = self.generator.generate(prompt).await?;
        if is_soft_failure(&text) {
            return Err(AppError::Transport(format!("Generator reported {}", text.trim())));
        }
        if text.trim().is_empty() {
            return Err(AppError::Transport("Generator returned an empty description".to_string()));
        }

        self.store
            .insert(NewRecord {
                object_type,
                location,
                ai_generated_description: text,
                generated_at: Utc::now(),
                model_used: self.generator.model_name().to_string(),
            })
            .await
    }
}

fn column_location(table: &TableRef, column: &ColumnSummary) -> ObjectLocation {
    ObjectLocation::column(
        &table.catalog,
        &table.schema,
        &table.table,
        &column.column_name,
        &column.data_type,
    )
}

/// Returns the number of candidates considered and the tables to process
fn select_targets(candidates: Vec<TableSummary>, request: &GenerationRequest) -> (usize, Vec<TableSummary>) {
    if request.tables.is_empty() {
        let undocumented: Vec<_> = candidates.into_iter().filter(|t| !t.is_documented()).collect();
        let total = undocumented.len();
        (total, undocumented.into_iter().take(request.batch_size).collect())
    } else {
        let total = candidates.len();
        let targets = candidates
            .into_iter()
            .filter(|t| request.tables.iter().any(|name| name == &t.table_name))
            .collect();
        (total, targets)
    }
}
