#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Expectation suites for drift311 snapshots.
//!
//! - [`store`]: the file-backed suite/checkpoint/validation store
//! - [`template`]: embedded per-dataset suite declarations
//! - [`evaluate`]: the generic rule evaluator
//! - [`checkpoint`]: the checkpoint runner and its actions
//! - [`docs`]: static data-docs rendering

pub mod checkpoint;
pub mod docs;
pub mod evaluate;
pub mod store;
pub mod template;

use drift311_database::DbError;
use drift311_expectations_models::ExpectationSuite;

use crate::store::ExpectationStore;
use crate::template::SuiteTemplate;

/// Recorded as `meta.created_by` on suites written by [`setup`].
pub const CREATED_BY: &str = "drift311_expectations";

/// Errors that can occur while managing or running expectations.
#[derive(Debug, thiserror::Error)]
pub enum ExpectationError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A snapshot file could not be loaded.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A suite template is malformed or unknown.
    #[error("suite template error: {message}")]
    Template {
        /// Description of the problem.
        message: String,
    },

    /// A suite is not in the store.
    #[error("expectation suite not found: {name} (run `setup` first)")]
    MissingSuite {
        /// Suite name.
        name: String,
    },

    /// A checkpoint is not in the store.
    #[error("checkpoint not found: {name} (run `setup` first)")]
    MissingCheckpoint {
        /// Checkpoint name.
        name: String,
    },

    /// A checkpoint references an unregistered datasource.
    #[error("datasource not registered: {name}")]
    MissingDatasource {
        /// Datasource name.
        name: String,
    },

    /// A checkpoint with this name already exists.
    #[error("checkpoint already exists: {name}")]
    CheckpointExists {
        /// Checkpoint name.
        name: String,
    },

    /// A suite, checkpoint or run name is unsafe as a file name.
    #[error("invalid store name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A run-name template could not be rendered.
    #[error("invalid run name template: {template:?}")]
    InvalidRunNameTemplate {
        /// The rejected template.
        template: String,
    },
}

/// What [`setup`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSummary {
    /// Each suite with the number of rules newly added to it.
    pub suites: Vec<(String, usize)>,
    /// The recreated checkpoint.
    pub checkpoint: String,
    /// Whether the datasource was newly registered.
    pub datasource_added: bool,
}

/// Declares a template's suites and checkpoint in `store`.
///
/// Each suite is created if absent and the template's rules are upserted
/// into it, so repeated runs never duplicate a rule. The checkpoint is
/// deleted and recreated.
///
/// # Errors
///
/// Returns [`ExpectationError`] if the store cannot be read or written.
pub fn setup(
    store: &ExpectationStore,
    template: &SuiteTemplate,
) -> Result<SetupSummary, ExpectationError> {
    store.init()?;
    let datasource_added = store.add_datasource(template.datasource.clone())?;
    if datasource_added {
        log::info!("Registered datasource {}", template.datasource.name);
    }

    let mut suites = Vec::with_capacity(template.suites.len());
    for binding in &template.suites {
        let name = &binding.expectation_suite_name;
        let mut suite = store
            .get_suite(name)?
            .unwrap_or_else(|| ExpectationSuite::new(name, CREATED_BY));

        let mut added = 0;
        for expectation in &template.expectations {
            if suite.upsert(expectation.clone()) {
                added += 1;
            }
        }

        store.save_suite(&suite)?;
        log::info!("Saved suite: {name} ({added} new expectations)");
        suites.push((name.clone(), added));
    }

    let checkpoint = template.checkpoint();
    if store.delete_checkpoint(&checkpoint.name)? {
        log::debug!("Deleted existing checkpoint {}", checkpoint.name);
    }
    store.add_checkpoint(&checkpoint)?;
    log::info!("Checkpoint '{}' ready.", checkpoint.name);

    Ok(SetupSummary {
        suites,
        checkpoint: checkpoint.name,
        datasource_added,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::template_for;

    #[test]
    fn setup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExpectationStore::new(dir.path().join("gx"));
        let template = template_for("nyc311").unwrap();

        let first = setup(&store, &template).unwrap();
        assert_eq!(
            first.suites,
            [
                ("suite_311_recent".to_string(), 6),
                ("suite_311_hist".to_string(), 6)
            ]
        );
        assert!(first.datasource_added);

        let second = setup(&store, &template).unwrap();
        assert!(second.suites.iter().all(|(_, added)| *added == 0));
        assert!(!second.datasource_added);

        let suite = store.load_suite("suite_311_hist").unwrap();
        assert_eq!(suite.expectations, template.expectations);
        assert_eq!(suite.meta.created_by, CREATED_BY);
        assert_eq!(store.load_checkpoint("checkpoint_311").unwrap(), template.checkpoint());
    }

    #[test]
    fn setup_keeps_rules_added_by_hand() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExpectationStore::new(dir.path());
        let template = template_for("nyc311").unwrap();
        setup(&store, &template).unwrap();

        let mut suite = store.load_suite("suite_311_recent").unwrap();
        suite.upsert(drift311_expectations_models::Expectation::ExpectColumnValuesToNotBeNull {
            column: "agency".into(),
            mostly: Some(0.95),
        });
        store.save_suite(&suite).unwrap();

        setup(&store, &template).unwrap();
        assert_eq!(store.load_suite("suite_311_recent").unwrap().expectations.len(), 7);
    }
}
