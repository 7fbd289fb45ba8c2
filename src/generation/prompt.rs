//! Prompt construction for table and column descriptions

use crate::catalog::{ColumnSummary, SampleRow, TableRef};
use serde_json::Value;

/// Rows fetched per table for prompt context
pub const SAMPLE_ROW_LIMIT: usize = 5;
/// Rows shown in a table prompt
pub const TABLE_PROMPT_ROWS: usize = 3;
/// Non-null sample values shown in a column prompt, in row order
pub const COLUMN_PROMPT_VALUES: usize = 5;

pub fn table_prompt(table: &TableRef, columns: &[ColumnSummary], samples: &[SampleRow]) -> String {
    let columns_info = columns
        .iter()
        .map(|c| format!("  - {} ({})", c.column_name, c.data_type))
        .collect::<Vec<_>>()
        .join("\n");

    let sample_info = if samples.is_empty() {
        String::new()
    } else {
        let shown = &samples[..samples.len().min(TABLE_PROMPT_ROWS)];
        match serde_json::to_string_pretty(shown) {
            Ok(json) => format!("\n\nSample data (first {} rows):\n{}", shown.len(), json),
            Err(_) => String::new(),
        }
    };

    format!(
        "You are a data documentation expert. Generate a clear, concise description for this database table.\n\
         \n\
         Table: {}\n\
         \n\
         Columns:\n\
         {}\n\
         {}\n\
         \n\
         Generate a 1-2 sentence description explaining:\n\
         1. What data this table contains\n\
         2. The primary purpose or use case\n\
         \n\
         Description:",
        table.path(),
        columns_info,
        sample_info
    )
}

pub fn column_prompt(table: &TableRef, column: &ColumnSummary, samples: &[SampleRow]) -> String {
    let values = sample_values(column, samples);
    let sample_info = if values.is_empty() {
        String::new()
    } else {
        format!("\n\nSample values: {}", values.join(", "))
    };

    format!(
        "You are a data documentation expert. Generate a clear, concise description for this database column.\n\
         \n\
         Table: {}\n\
         Column: {}\n\
         Data Type: {}\n\
         {}\n\
         \n\
         Generate a brief 1-sentence description explaining what this column represents and its purpose.\n\
         \n\
         Description:",
        table.path(),
        column.column_name,
        column.data_type,
        sample_info
    )
}

/// Non-null values of one column across the sample rows
fn sample_values(column: &ColumnSummary, samples: &[SampleRow]) -> Vec<String> {
    samples
        .iter()
        .filter_map(|row| row.get(&column.column_name))
        .filter(|value| !value.is_null())
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .take(COLUMN_PROMPT_VALUES)
        .collect()
}
