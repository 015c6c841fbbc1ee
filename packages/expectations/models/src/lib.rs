#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Declarative expectation rules and the suites and checkpoints that bundle
//! them.
//!
//! Rules are plain data: they serialize in the
//! `{"expectation_type": ..., "kwargs": {...}}` shape used by Great
//! Expectations suite files, and a separate evaluator interprets them.

pub mod result;

use drift311_snapshot_models::Role;
use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

pub use result::{
    CheckpointResult, ExpectationResult, ResultPayload, SuiteValidationResult,
    ValidationStatistics,
};

const fn default_true() -> bool {
    true
}

/// One declarative rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "expectation_type", content = "kwargs", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Expectation {
    /// The table's columns match `column_set`. With `exact_match = false`
    /// extra columns are tolerated.
    ExpectTableColumnsToMatchSet {
        /// Columns that must be present.
        column_set: Vec<String>,
        /// Whether extra columns fail the rule.
        #[serde(default = "default_true")]
        exact_match: bool,
    },
    /// No non-null value of `column` appears more than once.
    ExpectColumnValuesToBeUnique {
        /// Target column.
        column: String,
        /// Minimum fraction of non-null values that must conform.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mostly: Option<f64>,
    },
    /// `column` has no nulls.
    ExpectColumnValuesToNotBeNull {
        /// Target column.
        column: String,
        /// Minimum fraction of rows that must be non-null.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mostly: Option<f64>,
    },
    /// The row count lies in `[min_value, max_value]`. A missing bound is
    /// unbounded.
    ExpectTableRowCountToBeBetween {
        /// Inclusive lower bound.
        #[serde(default)]
        min_value: Option<u64>,
        /// Inclusive upper bound.
        #[serde(default)]
        max_value: Option<u64>,
    },
    /// Every non-null value of `column` is in `value_set`.
    ExpectColumnValuesToBeInSet {
        /// Target column.
        column: String,
        /// Allowed values. A `null` entry documents that nulls are allowed;
        /// nulls are never counted against the rule.
        value_set: Vec<Option<String>>,
        /// Minimum fraction of non-null values that must conform.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mostly: Option<f64>,
    },
}

impl Expectation {
    /// The snake-case rule name, e.g. `expect_column_values_to_be_unique`.
    #[must_use]
    pub fn expectation_type(&self) -> &'static str {
        self.into()
    }

    /// The column a column-level rule targets.
    #[must_use]
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::ExpectColumnValuesToBeUnique { column, .. }
            | Self::ExpectColumnValuesToNotBeNull { column, .. }
            | Self::ExpectColumnValuesToBeInSet { column, .. } => Some(column),
            Self::ExpectTableColumnsToMatchSet { .. }
            | Self::ExpectTableRowCountToBeBetween { .. } => None,
        }
    }

    /// The conformance threshold, defaulting to 1.0.
    #[must_use]
    pub fn mostly(&self) -> f64 {
        match self {
            Self::ExpectColumnValuesToBeUnique { mostly, .. }
            | Self::ExpectColumnValuesToNotBeNull { mostly, .. }
            | Self::ExpectColumnValuesToBeInSet { mostly, .. } => mostly.unwrap_or(1.0),
            Self::ExpectTableColumnsToMatchSet { .. }
            | Self::ExpectTableRowCountToBeBetween { .. } => 1.0,
        }
    }
}

/// Suite metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteMeta {
    /// Tool that last wrote the suite.
    #[serde(default)]
    pub created_by: String,
}

/// A named, ordered list of rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationSuite {
    /// Suite name, e.g. `suite_311_recent`.
    pub expectation_suite_name: String,
    /// Rules in evaluation order.
    #[serde(default)]
    pub expectations: Vec<Expectation>,
    /// Metadata.
    #[serde(default)]
    pub meta: SuiteMeta,
}

impl ExpectationSuite {
    /// Creates an empty suite.
    #[must_use]
    pub fn new(name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            expectation_suite_name: name.into(),
            expectations: Vec::new(),
            meta: SuiteMeta {
                created_by: created_by.into(),
            },
        }
    }

    /// Adds `expectation` unless an identical rule is already present.
    ///
    /// Returns whether the rule was added.
    pub fn upsert(&mut self, expectation: Expectation) -> bool {
        if self.expectations.contains(&expectation) {
            false
        } else {
            self.expectations.push(expectation);
            true
        }
    }
}

/// Which suite validates which snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointValidation {
    /// Datasource the batch is read through.
    pub datasource_name: String,
    /// Name the validated data is recorded under, e.g. `nyc311_recent`.
    pub data_asset_name: String,
    /// Snapshot the batch is loaded from.
    pub role: Role,
    /// Suite to run.
    pub expectation_suite_name: String,
}

/// Side effect performed after a checkpoint's validations run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class_name")]
pub enum ActionKind {
    /// Persist each suite's validation result.
    StoreValidationResultAction,
    /// Persist the observed evaluation parameters of the run.
    StoreEvaluationParametersAction,
    /// Rebuild the data-docs index.
    UpdateDataDocsAction,
}

/// A named action in a checkpoint's action list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointAction {
    /// Action name, e.g. `store_validation_result`.
    pub name: String,
    /// What the action does.
    pub action: ActionKind,
}

impl CheckpointAction {
    /// The standard action list: store results, store parameters, update
    /// docs.
    #[must_use]
    pub fn standard_list() -> Vec<Self> {
        vec![
            Self {
                name: "store_validation_result".to_string(),
                action: ActionKind::StoreValidationResultAction,
            },
            Self {
                name: "store_evaluation_params".to_string(),
                action: ActionKind::StoreEvaluationParametersAction,
            },
            Self {
                name: "update_data_docs".to_string(),
                action: ActionKind::UpdateDataDocsAction,
            },
        ]
    }
}

/// A named bundle of validations plus the actions run after them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint name, e.g. `checkpoint_311`.
    pub name: String,
    /// Config format version.
    pub config_version: f64,
    /// `strftime` template for run names.
    pub run_name_template: String,
    /// Validations in run order.
    pub validations: Vec<CheckpointValidation>,
    /// Actions in run order.
    pub action_list: Vec<CheckpointAction>,
}

/// A datasource registered in the store's context config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceConfig {
    /// Datasource name.
    pub name: String,
    /// How batches are read.
    pub execution_engine: String,
}

/// Top-level store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Config format version.
    pub config_version: f64,
    /// Registered datasources.
    #[serde(default)]
    pub datasources: Vec<DatasourceConfig>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            config_version: 3.0,
            datasources: Vec::new(),
        }
    }
}

impl ContextConfig {
    /// Registers a datasource unless one with the same name exists.
    ///
    /// Returns whether it was added.
    pub fn add_datasource(&mut self, datasource: DatasourceConfig) -> bool {
        if self.datasources.iter().any(|d| d.name == datasource.name) {
            false
        } else {
            self.datasources.push(datasource);
            true
        }
    }
}
