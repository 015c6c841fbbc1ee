//! Generic rule evaluator.
//!
//! # Null handling
//!
//! Empty text counts as null, the same as in the metrics.
//!
//! - `expect_column_values_to_not_be_null` counts nulls as unexpected over
//!   all rows
//! - `expect_column_values_to_be_unique` and
//!   `expect_column_values_to_be_in_set` skip nulls and judge only the
//!   non-null cells
//!
//! A `mostly` threshold passes when the conforming fraction of the judged
//! cells is at least `mostly`. With no judged cells the rule passes.

use std::collections::{HashMap, HashSet};

use drift311_expectations_models::{
    Expectation, ExpectationResult, ExpectationSuite, ResultPayload, SuiteValidationResult,
    ValidationStatistics,
};
use drift311_snapshot_models::{Role, Table, is_null};
use serde_json::json;

/// Maximum number of violating values reported per rule.
pub const PARTIAL_UNEXPECTED_LIMIT: usize = 20;

type Outcome = Result<(bool, ResultPayload), String>;

#[allow(clippy::cast_precision_loss)]
fn percent(count: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| count as f64 / total as f64 * 100.0)
}

#[allow(clippy::cast_precision_loss)]
fn meets_mostly(unexpected: usize, judged: usize, mostly: f64) -> bool {
    if judged == 0 {
        return true;
    }
    (judged - unexpected) as f64 / judged as f64 >= mostly
}

fn column_cells<'a>(table: &'a Table, column: &str) -> Result<Vec<Option<&'a str>>, String> {
    table
        .column(column)
        .ok_or_else(|| format!("column {column:?} not found in table"))
}

fn partial(values: &[&str]) -> Vec<Option<String>> {
    values
        .iter()
        .take(PARTIAL_UNEXPECTED_LIMIT)
        .map(|v| Some((*v).to_string()))
        .collect()
}

/// Judges the non-null cells of a column; `is_unexpected` flags violations.
fn column_map(
    table: &Table,
    column: &str,
    mostly: f64,
    is_unexpected: impl Fn(&str, &HashMap<&str, usize>) -> bool,
) -> Outcome {
    let cells = column_cells(table, column)?;
    let present: Vec<&str> = cells.iter().filter(|c| !is_null(**c)).flatten().copied().collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &value in &present {
        *counts.entry(value).or_default() += 1;
    }

    let unexpected: Vec<&str> = present
        .iter()
        .copied()
        .filter(|v| is_unexpected(v, &counts))
        .collect();
    let missing = cells.len() - present.len();

    let payload = ResultPayload {
        element_count: Some(cells.len() as u64),
        missing_count: Some(missing as u64),
        missing_percent: percent(missing, cells.len()),
        unexpected_count: Some(unexpected.len() as u64),
        unexpected_percent: percent(unexpected.len(), present.len()),
        partial_unexpected_list: Some(partial(&unexpected)),
        ..ResultPayload::default()
    };
    Ok((meets_mostly(unexpected.len(), present.len(), mostly), payload))
}

fn columns_match_set(table: &Table, column_set: &[String], exact_match: bool) -> Outcome {
    let present: HashSet<&str> = table.columns().iter().map(String::as_str).collect();
    let wanted: HashSet<&str> = column_set.iter().map(String::as_str).collect();

    let missing: Vec<&str> = column_set
        .iter()
        .map(String::as_str)
        .filter(|c| !present.contains(c))
        .collect();
    let unexpected: Vec<&str> = table
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|c| !wanted.contains(c))
        .collect();

    let unexpected = if exact_match { unexpected } else { Vec::new() };
    let success = missing.is_empty() && unexpected.is_empty();
    let details = (!success).then(|| {
        json!({
            "mismatched": {
                "missing": missing,
                "unexpected": unexpected,
            }
        })
    });

    Ok((
        success,
        ResultPayload {
            observed_value: Some(json!(table.columns())),
            details,
            ..ResultPayload::default()
        },
    ))
}

fn not_null(table: &Table, column: &str, mostly: f64) -> Outcome {
    let cells = column_cells(table, column)?;
    let nulls = cells.iter().filter(|c| is_null(**c)).count();
    Ok((
        meets_mostly(nulls, cells.len(), mostly),
        ResultPayload {
            element_count: Some(cells.len() as u64),
            unexpected_count: Some(nulls as u64),
            unexpected_percent: percent(nulls, cells.len()),
            partial_unexpected_list: Some(
                std::iter::repeat_n(None, nulls.min(PARTIAL_UNEXPECTED_LIMIT)).collect(),
            ),
            ..ResultPayload::default()
        },
    ))
}

fn row_count_between(table: &Table, min_value: Option<u64>, max_value: Option<u64>) -> Outcome {
    let rows = table.len() as u64;
    let success = min_value.is_none_or(|min| rows >= min) && max_value.is_none_or(|max| rows <= max);
    Ok((
        success,
        ResultPayload {
            observed_value: Some(json!(rows)),
            ..ResultPayload::default()
        },
    ))
}

/// Evaluates one rule against a table.
///
/// A rule that cannot be evaluated (e.g. its column is missing) fails with
/// `exception_message` set.
#[must_use]
pub fn evaluate(expectation: &Expectation, table: &Table) -> ExpectationResult {
    let mostly = expectation.mostly();
    let outcome = match expectation {
        Expectation::ExpectTableColumnsToMatchSet {
            column_set,
            exact_match,
        } => columns_match_set(table, column_set, *exact_match),
        Expectation::ExpectColumnValuesToBeUnique { column, .. } => {
            column_map(table, column, mostly, |v, counts| {
                counts.get(v).copied().unwrap_or(0) > 1
            })
        }
        Expectation::ExpectColumnValuesToNotBeNull { column, .. } => {
            not_null(table, column, mostly)
        }
        Expectation::ExpectTableRowCountToBeBetween {
            min_value,
            max_value,
        } => row_count_between(table, *min_value, *max_value),
        Expectation::ExpectColumnValuesToBeInSet {
            column, value_set, ..
        } => {
            let allowed: HashSet<&str> = value_set.iter().flatten().map(String::as_str).collect();
            column_map(table, column, mostly, |v, _| !allowed.contains(v))
        }
    };

    match outcome {
        Ok((success, result)) => ExpectationResult {
            success,
            expectation_config: expectation.clone(),
            result,
            exception_message: None,
        },
        Err(message) => {
            log::warn!("{}: {message}", expectation.expectation_type());
            ExpectationResult {
                success: false,
                expectation_config: expectation.clone(),
                result: ResultPayload::default(),
                exception_message: Some(message),
            }
        }
    }
}

/// Runs every rule of `suite` against `table`. Evaluation never stops at
/// the first failure.
#[must_use]
pub fn validate_suite(
    suite: &ExpectationSuite,
    table: &Table,
    role: Role,
    data_asset_name: &str,
    run_name: &str,
) -> SuiteValidationResult {
    let results: Vec<ExpectationResult> = suite
        .expectations
        .iter()
        .map(|e| evaluate(e, table))
        .collect();

    SuiteValidationResult {
        success: results.iter().all(|r| r.success),
        expectation_suite_name: suite.expectation_suite_name.clone(),
        data_asset_name: data_asset_name.to_string(),
        role,
        run_name: run_name.to_string(),
        element_count: table.len() as u64,
        statistics: ValidationStatistics::from_results(&results),
        results,
    }
}
