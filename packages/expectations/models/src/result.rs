//! Validation results.

use drift311_snapshot_models::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Expectation;

/// Observed figures for one rule.
///
/// Only the fields meaningful for the rule's kind are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Rows evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_count: Option<u64>,
    /// Null cells in the target column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_count: Option<u64>,
    /// Null cells as a percentage of all rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_percent: Option<f64>,
    /// Cells that violate the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unexpected_count: Option<u64>,
    /// Violations as a percentage of the cells the rule applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unexpected_percent: Option<f64>,
    /// The first few violating values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_unexpected_list: Option<Vec<Option<String>>>,
    /// Table-level observation (row count, column list).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_value: Option<Value>,
    /// Extra detail, e.g. mismatched columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ResultPayload {
    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Outcome of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationResult {
    /// Whether the rule passed.
    pub success: bool,
    /// The rule that was evaluated.
    pub expectation_config: Expectation,
    /// Observed figures.
    pub result: ResultPayload,
    /// Set when the rule could not be evaluated (e.g. unknown column).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_message: Option<String>,
}

/// Rule counts for one suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatistics {
    /// Rules evaluated.
    pub evaluated_expectations: usize,
    /// Rules that passed.
    pub successful_expectations: usize,
    /// Rules that failed.
    pub unsuccessful_expectations: usize,
    /// Passing rules as a percentage; `None` for an empty suite.
    pub success_percent: Option<f64>,
}

impl ValidationStatistics {
    /// Tallies a list of rule results.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_results(results: &[ExpectationResult]) -> Self {
        let evaluated = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            evaluated_expectations: evaluated,
            successful_expectations: successful,
            unsuccessful_expectations: evaluated - successful,
            success_percent: (evaluated > 0)
                .then(|| successful as f64 / evaluated as f64 * 100.0),
        }
    }
}

/// Outcome of one suite against one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteValidationResult {
    /// True when every rule passed.
    pub success: bool,
    /// Suite that was run.
    pub expectation_suite_name: String,
    /// Asset the batch was recorded under.
    pub data_asset_name: String,
    /// Snapshot the batch came from.
    pub role: Role,
    /// Run this result belongs to.
    pub run_name: String,
    /// Rows in the validated batch.
    pub element_count: u64,
    /// Per-rule outcomes in suite order.
    pub results: Vec<ExpectationResult>,
    /// Tallies.
    pub statistics: ValidationStatistics,
}

impl SuiteValidationResult {
    /// Rules that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &ExpectationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Combined outcome of a checkpoint run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointResult {
    /// Checkpoint that was run.
    pub checkpoint_name: String,
    /// Rendered run name.
    pub run_name: String,
    /// Logical AND of every suite's success.
    pub success: bool,
    /// Suite results in checkpoint order.
    pub validations: Vec<SuiteValidationResult>,
}
