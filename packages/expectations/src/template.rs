//! Embedded suite templates.
//!
//! Each dataset ships a JSON file in `packages/expectations/suites/` naming
//! its datasource, checkpoint, one suite per snapshot role, and the rules
//! every suite carries. Value sets may contain `null`, which TOML cannot
//! express.

use drift311_expectations_models::{
    Checkpoint, CheckpointAction, CheckpointValidation, DatasourceConfig, Expectation,
};
use drift311_snapshot_models::Role;
use serde::Deserialize;

use crate::ExpectationError;

const TEMPLATE_JSONS: &[(&str, &str)] = &[("nyc311", include_str!("../suites/nyc311.json"))];

/// Checkpoint name and run-name template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckpointTemplate {
    /// Checkpoint name.
    pub name: String,
    /// `strftime` template for run names.
    pub run_name_template: String,
}

/// Binds a snapshot role to the suite that validates it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SuiteBinding {
    /// Snapshot role.
    pub role: Role,
    /// Suite name.
    pub expectation_suite_name: String,
    /// Asset name the batch is recorded under.
    pub data_asset_name: String,
}

/// A dataset's suite and checkpoint declarations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuiteTemplate {
    /// Dataset id the template belongs to.
    pub dataset: String,
    /// Datasource registered in the store.
    pub datasource: DatasourceConfig,
    /// Checkpoint declaration.
    pub checkpoint: CheckpointTemplate,
    /// One suite per role.
    pub suites: Vec<SuiteBinding>,
    /// Rules every suite carries.
    pub expectations: Vec<Expectation>,
}

impl SuiteTemplate {
    /// Parses and validates a template.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::Template`] if the JSON is malformed, no
    /// suite is declared, or a role is bound twice.
    pub fn parse(json: &str) -> Result<Self, ExpectationError> {
        let template: Self = serde_json::from_str(json).map_err(|e| ExpectationError::Template {
            message: e.to_string(),
        })?;

        if template.suites.is_empty() {
            return Err(ExpectationError::Template {
                message: format!("{}: no suites declared", template.dataset),
            });
        }
        for (i, binding) in template.suites.iter().enumerate() {
            if template.suites[..i].iter().any(|b| b.role == binding.role) {
                return Err(ExpectationError::Template {
                    message: format!("{}: role {} bound twice", template.dataset, binding.role),
                });
            }
        }

        Ok(template)
    }

    /// The checkpoint this template declares, validating each bound suite
    /// through the template's datasource.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            name: self.checkpoint.name.clone(),
            config_version: 1.0,
            run_name_template: self.checkpoint.run_name_template.clone(),
            validations: self
                .suites
                .iter()
                .map(|binding| CheckpointValidation {
                    datasource_name: self.datasource.name.clone(),
                    data_asset_name: binding.data_asset_name.clone(),
                    role: binding.role,
                    expectation_suite_name: binding.expectation_suite_name.clone(),
                })
                .collect(),
            action_list: CheckpointAction::standard_list(),
        }
    }
}

/// Returns the embedded template for a dataset.
///
/// # Errors
///
/// Returns [`ExpectationError::Template`] if no template exists for
/// `dataset_id` or it is malformed.
pub fn template_for(dataset_id: &str) -> Result<SuiteTemplate, ExpectationError> {
    let (_, json) = TEMPLATE_JSONS
        .iter()
        .find(|(id, _)| *id == dataset_id)
        .ok_or_else(|| ExpectationError::Template {
            message: format!("no expectation template for dataset {dataset_id:?}"),
        })?;
    SuiteTemplate::parse(json)
}
