//! SQL query constants and builders
//!
//! Contains all SQL queries used by the application. Governance-table queries
//! carry a `{table}` placeholder that the store fills with its quoted,
//! validated table name; everything else travels as bind parameters.

use crate::error::AppError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Longest identifier accepted at the catalog boundary
pub const MAX_IDENTIFIER_LEN: usize = 255;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("identifier pattern is valid"));

// =============================================================================
// CATALOG QUERIES
// =============================================================================

/// List all connectable, non-template databases (one per catalog)
pub const LIST_CATALOGS: &str = r#"
    SELECT datname::text AS name
    FROM pg_database
    WHERE datistemplate = false
        AND datallowconn = true
    ORDER BY datname
"#;

/// List user schemas in the connected catalog
pub const LIST_SCHEMAS: &str = r#"
    SELECT nspname::text AS name
    FROM pg_catalog.pg_namespace
    WHERE nspname <> 'information_schema'
        AND nspname !~ '^pg_'
    ORDER BY nspname
"#;

/// List base tables with their comment and column count, optionally in one schema
pub const LIST_TABLES: &str = r#"
    SELECT
        n.nspname::text AS schema_name,
        c.relname::text AS table_name,
        CASE c.relkind
            WHEN 'r' THEN 'MANAGED'
            WHEN 'p' THEN 'PARTITIONED'
        END AS table_type,
        obj_description(c.oid, 'pg_class') AS current_comment,
        (
            SELECT COUNT(*)
            FROM pg_catalog.pg_attribute a
            WHERE a.attrelid = c.oid
                AND a.attnum > 0
                AND NOT a.attisdropped
        ) AS column_count
    FROM pg_catalog.pg_class c
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE c.relkind IN ('r', 'p')
        AND NOT c.relispartition
        AND n.nspname <> 'information_schema'
        AND n.nspname !~ '^pg_'
        AND ($1::text IS NULL OR n.nspname = $1::text)
    ORDER BY n.nspname, c.relname
"#;

/// Column names, declared types and comments for one table
pub const LIST_COLUMNS: &str = r#"
    SELECT
        a.attname::text AS column_name,
        format_type(a.atttypid, a.atttypmod) AS data_type,
        col_description(c.oid, a.attnum) AS comment
    FROM pg_catalog.pg_attribute a
        JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
        AND c.relname = $2
        AND a.attnum > 0
        AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

/// Whether the session user may set comments on a table (owner or member of owner role)
pub const CAN_COMMENT_ON_TABLE: &str = r#"
    SELECT pg_has_role(c.relowner, 'USAGE') AS can_comment
    FROM pg_catalog.pg_class c
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
        AND c.relname = $2
"#;

pub const CURRENT_USER: &str = "SELECT current_user::text AS name";

// =============================================================================
// GOVERNANCE STORE QUERIES
// =============================================================================

pub const CREATE_GOVERNANCE_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS {schema}";

pub const CREATE_GOVERNANCE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS {table} (
        id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
        object_type TEXT NOT NULL,
        catalog_name TEXT NOT NULL,
        schema_name TEXT NOT NULL,
        table_name TEXT NOT NULL,
        column_name TEXT,
        column_data_type TEXT,
        ai_generated_description TEXT NOT NULL,
        approved_description TEXT,
        reviewer TEXT,
        review_status TEXT NOT NULL DEFAULT 'PENDING',
        generated_at TIMESTAMPTZ NOT NULL,
        reviewed_at TIMESTAMPTZ,
        applied_at TIMESTAMPTZ,
        model_used TEXT NOT NULL,
        confidence_score DOUBLE PRECISION,
        apply_attempts INTEGER NOT NULL DEFAULT 0,
        last_apply_error TEXT
    )
"#;

pub const CREATE_GOVERNANCE_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS description_governance_status_idx ON {table} (review_status)";

/// Column list shared by every query that materializes a full record
pub const RECORD_COLUMNS: &str = "id, object_type, catalog_name, schema_name, table_name, \
     column_name, column_data_type, ai_generated_description, approved_description, reviewer, \
     review_status, generated_at, reviewed_at, applied_at, model_used, confidence_score, \
     apply_attempts, last_apply_error";

pub const INSERT_RECORD: &str = r#"
    INSERT INTO {table}
        (object_type, catalog_name, schema_name, table_name, column_name, column_data_type,
         ai_generated_description, review_status, generated_at, model_used)
    VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', $8, $9)
    RETURNING {columns}
"#;

pub const GET_RECORD: &str = "SELECT {columns} FROM {table} WHERE id = $1";

/// Compare-and-set review: only applies while the status is still `$5`
pub const REVIEW_RECORD: &str = r#"
    UPDATE {table}
    SET review_status = $2,
        approved_description = COALESCE($3, ai_generated_description),
        reviewer = $4,
        reviewed_at = $6
    WHERE id = $1
        AND review_status = $5
    RETURNING {columns}
"#;

pub const LIST_APPLY_CANDIDATES: &str = r#"
    SELECT {columns}
    FROM {table}
    WHERE review_status = 'APPROVED'
        AND applied_at IS NULL
    ORDER BY id
"#;

pub const MARK_APPLIED: &str = r#"
    UPDATE {table}
    SET review_status = 'APPLIED',
        applied_at = $2
    WHERE id = $1
        AND review_status = 'APPROVED'
"#;

/// Count a failed apply; dead-letter once the attempt ceiling `$3` is reached
pub const RECORD_APPLY_FAILURE: &str = r#"
    UPDATE {table}
    SET apply_attempts = apply_attempts + 1,
        last_apply_error = $2,
        review_status = CASE
            WHEN apply_attempts + 1 >= $3 THEN 'DEAD'
            ELSE review_status
        END
    WHERE id = $1
        AND review_status = 'APPROVED'
    RETURNING review_status, apply_attempts
"#;

pub const LIST_REVIEW_QUEUE: &str = r#"
    SELECT {columns}
    FROM {table}
    WHERE review_status IN ('PENDING', 'APPROVED', 'DEAD', 'APPLIED')
    ORDER BY
        CASE review_status
            WHEN 'PENDING' THEN 1
            WHEN 'APPROVED' THEN 2
            WHEN 'DEAD' THEN 3
            WHEN 'APPLIED' THEN 4
        END,
        generated_at DESC,
        id DESC
    LIMIT $1 OFFSET $2
"#;

pub const STATISTICS: &str = r#"
    SELECT
        COUNT(*) AS total,
        COUNT(*) FILTER (WHERE review_status = 'PENDING') AS pending,
        COUNT(*) FILTER (WHERE review_status = 'APPROVED') AS approved,
        COUNT(*) FILTER (WHERE review_status = 'REJECTED') AS rejected,
        COUNT(*) FILTER (WHERE review_status = 'APPLIED') AS applied,
        COUNT(*) FILTER (WHERE review_status = 'DEAD') AS dead,
        COUNT(*) FILTER (WHERE object_type = 'TABLE') AS tables,
        COUNT(*) FILTER (WHERE object_type = 'COLUMN') AS columns
    FROM {table}
"#;

pub const SCHEMA_PROGRESS: &str = r#"
    SELECT
        schema_name,
        COUNT(*) AS total,
        COUNT(*) FILTER (WHERE review_status = 'APPLIED') AS completed,
        COUNT(*) FILTER (WHERE review_status = 'PENDING') AS pending
    FROM {table}
    GROUP BY schema_name
"#;

pub const REVIEW_ACTIVITY: &str = r#"
    SELECT
        reviewer,
        review_status,
        COUNT(*) AS count,
        MIN(reviewed_at) AS first_review,
        MAX(reviewed_at) AS last_review
    FROM {table}
    WHERE reviewer IS NOT NULL
    GROUP BY reviewer, review_status
    ORDER BY reviewer, review_status
"#;

// =============================================================================
// IDENTIFIER VALIDATION
// =============================================================================

/// Validate a catalog/schema/table/column name before it reaches any textual statement.
///
/// Accepts ASCII letters, digits, underscore, hyphen and dot, at most
/// [`MAX_IDENTIFIER_LEN`] characters. `what` names the identifier in the error.
pub fn validate_identifier(identifier: &str, what: &str) -> Result<(), AppError> {
    if identifier.is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", what)));
    }
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(AppError::Validation(format!(
            "{} too long (max {} characters)",
            what, MAX_IDENTIFIER_LEN
        )));
    }
    if !IDENTIFIER_RE.is_match(identifier) {
        return Err(AppError::Validation(format!(
            "Invalid {}: contains illegal characters",
            what
        )));
    }
    Ok(())
}

/// SQL builder for safe identifier quoting
pub struct SqlBuilder;

impl SqlBuilder {
    /// Quote an identifier (table/column name) safely
    pub fn quote_ident(ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a string literal for statements that cannot take bind parameters
    pub fn quote_literal(value: &str) -> String {
        format!("'{}'", Self::escape_literal(value))
    }

    /// Double every single quote
    pub fn escape_literal(value: &str) -> String {
        value.replace('\'', "''")
    }

    /// `"schema"."table"`
    pub fn qualified(schema: &str, table: &str) -> String {
        format!("{}.{}", Self::quote_ident(schema), Self::quote_ident(table))
    }

    /// Build COMMENT ON TABLE statement
    pub fn comment_on_table(schema: &str, table: &str, comment: &str) -> String {
        format!(
            "COMMENT ON TABLE {} IS {}",
            Self::qualified(schema, table),
            Self::quote_literal(comment)
        )
    }

    /// Build COMMENT ON COLUMN statement
    pub fn comment_on_column(schema: &str, table: &str, column: &str, comment: &str) -> String {
        format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            Self::qualified(schema, table),
            Self::quote_ident(column),
            Self::quote_literal(comment)
        )
    }

    /// Build a query returning up to `$1` rows of a table as JSON text
    pub fn sample_rows(schema: &str, table: &str) -> String {
        format!(
            "SELECT row_to_json(t)::text AS row FROM {} t LIMIT $1",
            Self::qualified(schema, table)
        )
    }

    /// Build a one-row read probe
    pub fn probe_table(schema: &str, table: &str) -> String {
        format!("SELECT 1 FROM {} LIMIT 1", Self::qualified(schema, table))
    }

    /// Fill a governance query template
    pub fn governance(template: &str, table: &str) -> String {
        template
            .replace("{columns}", RECORD_COLUMNS)
            .replace("{table}", table)
    }
}
