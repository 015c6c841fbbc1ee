//! Advisory schema validation and coercion for fetched tables.
//!
//! [`normalize`] never fails. It coerces what it can and returns every
//! violation it found across all columns; the caller decides whether to log
//! and continue.

use std::fmt;

use drift311_snapshot_models::{Table, is_null};
use serde::{Deserialize, Serialize};

use crate::parsing::{SOCRATA_TIMESTAMP_FORMAT, parse_socrata_date};

/// Number of offending rows or values kept per violation.
const SAMPLE_LEN: usize = 5;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Opaque text; never reinterpreted.
    String,
    /// Whole number.
    Integer,
    /// Floating-point number.
    Float,
    /// `true`/`false`.
    Boolean,
    /// Socrata floating timestamp.
    Timestamp,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

impl ColumnType {
    /// Converts `value` to this type's canonical text, or `None` if it does
    /// not parse.
    #[must_use]
    pub fn coerce(self, value: &str) -> Option<String> {
        match self {
            Self::String => Some(value.to_string()),
            Self::Integer => {
                let trimmed = value.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    return Some(n.to_string());
                }
                #[allow(clippy::cast_possible_truncation)]
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| (f as i64).to_string())
            }
            Self::Float => value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| f.to_string()),
            Self::Boolean => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Some("true".to_string()),
                "false" | "f" | "0" | "no" => Some("false".to_string()),
                _ => None,
            },
            Self::Timestamp => parse_socrata_date(value)
                .map(|dt| dt.format(SOCRATA_TIMESTAMP_FORMAT).to_string()),
        }
    }
}

/// Declared type and nullability of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether null cells are allowed.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

const fn default_nullable() -> bool {
    true
}

/// One schema check that did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    /// A declared column is absent from the table.
    MissingColumn {
        /// Column name.
        column: String,
    },
    /// A non-nullable column contains nulls.
    NullValues {
        /// Column name.
        column: String,
        /// Number of null cells.
        count: usize,
        /// First few offending row indices.
        sample_rows: Vec<usize>,
    },
    /// Cells could not be coerced to the declared type.
    CoercionFailed {
        /// Column name.
        column: String,
        /// Declared type.
        expected: ColumnType,
        /// Number of cells that failed.
        count: usize,
        /// First few offending values.
        sample_values: Vec<String>,
    },
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { column } => write!(f, "column '{column}' not in table"),
            Self::NullValues {
                column,
                count,
                sample_rows,
            } => write!(
                f,
                "column '{column}' is not nullable but has {count} null value(s) (rows {sample_rows:?})"
            ),
            Self::CoercionFailed {
                column,
                expected,
                count,
                sample_values,
            } => write!(
                f,
                "column '{column}' has {count} value(s) not coercible to {expected} (e.g. {sample_values:?})"
            ),
        }
    }
}

/// A table after best-effort coercion, with every violation found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTable {
    /// Table with coercible cells rewritten to canonical form. Cells that
    /// failed coercion keep their original text.
    pub table: Table,
    /// All violations across all columns.
    pub violations: Vec<SchemaViolation>,
}

impl NormalizedTable {
    /// Whether the table conformed to the schema.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Coerces declared columns and checks nullability.
///
/// Columns present in the table but absent from the schema are left alone.
#[must_use]
pub fn normalize(table: &Table, schema: &[ColumnSchema]) -> NormalizedTable {
    let mut current = table.clone();
    let mut violations = Vec::new();

    for column in schema {
        let Some(values) = table.column(&column.name) else {
            violations.push(SchemaViolation::MissingColumn {
                column: column.name.clone(),
            });
            continue;
        };

        let mut null_rows = Vec::new();
        let mut failed = Vec::new();
        let mut coerced = Vec::with_capacity(values.len());

        for (row, value) in values.into_iter().enumerate() {
            match value {
                v if is_null(v) => {
                    null_rows.push(row);
                    coerced.push(v.map(str::to_string));
                }
                Some(v) => match column.column_type.coerce(v) {
                    Some(c) => coerced.push(Some(c)),
                    None => {
                        failed.push(v.to_string());
                        coerced.push(Some(v.to_string()));
                    }
                },
                None => coerced.push(None),
            }
        }

        if !column.nullable && !null_rows.is_empty() {
            violations.push(SchemaViolation::NullValues {
                column: column.name.clone(),
                count: null_rows.len(),
                sample_rows: null_rows.into_iter().take(SAMPLE_LEN).collect(),
            });
        }
        if !failed.is_empty() {
            violations.push(SchemaViolation::CoercionFailed {
                column: column.name.clone(),
                expected: column.column_type,
                count: failed.len(),
                sample_values: failed.into_iter().take(SAMPLE_LEN).collect(),
            });
        }

        if column.column_type != ColumnType::String {
            match current.with_column(&column.name, coerced) {
                Ok(next) => current = next,
                Err(e) => log::warn!("Skipping coercion of '{}': {e}", column.name),
            }
        }
    }

    NormalizedTable {
        table: current,
        violations,
    }
}

/// Logs every violation at `warn` followed by a summary line.
pub fn log_violations(label: &str, violations: &[SchemaViolation]) {
    if violations.is_empty() {
        log::info!("{label}: schema checks passed");
        return;
    }
    for violation in violations {
        log::warn!("{label}: {violation}");
    }
    log::warn!(
        "{label}: schema checks failed with {} violation(s); continuing with unvalidated data",
        violations.len()
    );
}
