//! Checkpoint runner.
//!
//! Loads each bound snapshot from its CSV file, runs the bound suite, ANDs
//! the outcomes, and then performs the checkpoint's action list.

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use drift311_database::SnapshotStore;
use drift311_expectations_models::{ActionKind, Checkpoint, CheckpointResult};
use serde_json::{Map, Value, json};

use crate::store::ExpectationStore;
use crate::{ExpectationError, docs, evaluate};

/// Renders a run name from a `strftime` template.
///
/// # Errors
///
/// Returns [`ExpectationError::InvalidRunNameTemplate`] if the template has
/// an unknown or unsupported specifier.
pub fn render_run_name(template: &str, at: NaiveDateTime) -> Result<String, ExpectationError> {
    let mut name = String::new();
    write!(name, "{}", at.format(template)).map_err(|_| {
        ExpectationError::InvalidRunNameTemplate {
            template: template.to_string(),
        }
    })?;
    Ok(name)
}

/// Row counts per suite, keyed by suite name.
fn evaluation_parameters(result: &CheckpointResult) -> Value {
    let suites: Map<String, Value> = result
        .validations
        .iter()
        .map(|v| {
            (
                v.expectation_suite_name.clone(),
                json!({
                    "data_asset_name": v.data_asset_name,
                    "row_count": v.element_count,
                    "success": v.success,
                }),
            )
        })
        .collect();
    json!({
        "checkpoint_name": result.checkpoint_name,
        "run_name": result.run_name,
        "suites": suites,
    })
}

fn run_actions(
    store: &ExpectationStore,
    checkpoint: &Checkpoint,
    result: &CheckpointResult,
) -> Result<(), ExpectationError> {
    for action in &checkpoint.action_list {
        match action.action {
            ActionKind::StoreValidationResultAction => {
                for validation in &result.validations {
                    let path = store.store_validation(validation)?;
                    log::debug!("Stored validation result at {}", path.display());
                }
            }
            ActionKind::StoreEvaluationParametersAction => {
                let path = store
                    .store_evaluation_parameters(&result.run_name, &evaluation_parameters(result))?;
                log::debug!("Stored evaluation parameters at {}", path.display());
            }
            ActionKind::UpdateDataDocsAction => {
                let suites = store
                    .list_suites()?
                    .iter()
                    .map(|name| store.load_suite(name))
                    .collect::<Result<Vec<_>, _>>()?;
                let path = store.write_data_docs(&docs::render_index(&suites, result))?;
                log::info!("Built data docs at {}", path.display());
            }
        }
    }
    Ok(())
}

/// Runs a stored checkpoint against the snapshot files in `snapshots`.
///
/// A failing rule is reported in the result, not as an error.
///
/// # Errors
///
/// Returns [`ExpectationError`] if the checkpoint, a suite, a datasource or
/// a snapshot file is missing, or an action cannot write its output.
pub fn run_checkpoint(
    store: &ExpectationStore,
    snapshots: &SnapshotStore,
    name: &str,
    at: NaiveDateTime,
) -> Result<CheckpointResult, ExpectationError> {
    let checkpoint = store.load_checkpoint(name)?;
    let run_name = render_run_name(&checkpoint.run_name_template, at)?;
    let config = store.load_config()?;

    let mut validations = Vec::with_capacity(checkpoint.validations.len());
    for validation in &checkpoint.validations {
        if !config
            .datasources
            .iter()
            .any(|d| d.name == validation.datasource_name)
        {
            return Err(ExpectationError::MissingDatasource {
                name: validation.datasource_name.clone(),
            });
        }

        let suite = store.load_suite(&validation.expectation_suite_name)?;
        log::info!("Validating {} data...", validation.role.label().to_lowercase());
        let table = snapshots.load(validation.role)?;
        let result = evaluate::validate_suite(
            &suite,
            &table,
            validation.role,
            &validation.data_asset_name,
            &run_name,
        );
        log::info!(
            "{}: {} of {} expectations passed",
            result.expectation_suite_name,
            result.statistics.successful_expectations,
            result.statistics.evaluated_expectations
        );
        validations.push(result);
    }

    let result = CheckpointResult {
        checkpoint_name: checkpoint.name.clone(),
        run_name,
        success: validations.iter().all(|v| v.success),
        validations,
    };

    run_actions(store, &checkpoint, &result)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use drift311_database::paths::ProjectPaths;
    use drift311_snapshot_models::{COMPLAINT_FIELDS, DateWindow, Role, Snapshot, Table};

    use super::*;
    use crate::setup;
    use crate::template::template_for;

    fn at() -> NaiveDateTime {
        "2024-06-15T10:30:05".parse().unwrap()
    }

    /// `rows` complaints with every field set; `duplicate` repeats the
    /// first key on the last row.
    fn complaints(rows: usize, duplicate: bool) -> Table {
        let boroughs = ["MANHATTAN", "BROOKLYN", "BRONX", "QUEENS", "STATEN ISLAND"];
        let data = (0..rows)
            .map(|i| {
                let key = if duplicate && i + 1 == rows { 0 } else { i };
                COMPLAINT_FIELDS
                    .iter()
                    .map(|field| {
                        Some(match *field {
                            "unique_key" => (60_000_000 + key).to_string(),
                            "created_date" => "2024-06-10T12:00:00.000".to_string(),
                            "complaint_type" => "Noise - Residential".to_string(),
                            "borough" => boroughs[i % boroughs.len()].to_string(),
                            other => format!("{other}-{i}"),
                        })
                    })
                    .collect()
            })
            .collect();
        Table::new(COMPLAINT_FIELDS.iter().map(|f| (*f).to_string()).collect(), data).unwrap()
    }

    fn project(recent: Table, hist: Table) -> (tempfile::TempDir, ExpectationStore, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        let store = ExpectationStore::new(paths.gx_dir());
        let snapshots = SnapshotStore::new(paths, "311", "nyc311", "nyc");
        let window =
            DateWindow::new("2024-06-08".parse().unwrap(), "2024-06-14".parse().unwrap()).unwrap();
        snapshots
            .write_files(&[
                &Snapshot {
                    role: Role::Recent,
                    window,
                    table: recent,
                },
                &Snapshot {
                    role: Role::Hist,
                    window,
                    table: hist,
                },
            ])
            .unwrap();
        setup(&store, &template_for("nyc311").unwrap()).unwrap();
        (dir, store, snapshots)
    }

    #[test]
    fn renders_run_names() {
        assert_eq!(
            render_run_name("nyc311__%Y-%m-%dT%H-%M-%S", at()).unwrap(),
            "nyc311__2024-06-15T10-30-05"
        );
        assert!(matches!(
            render_run_name("nyc311__%Q", at()),
            Err(ExpectationError::InvalidRunNameTemplate { .. })
        ));
    }

    #[test]
    fn passing_snapshots_pass_and_run_actions() {
        let (dir, store, snapshots) = project(complaints(120, false), complaints(60, false));

        let result = run_checkpoint(&store, &snapshots, "checkpoint_311", at()).unwrap();

        assert!(result.success);
        assert_eq!(result.run_name, "nyc311__2024-06-15T10-30-05");
        assert_eq!(result.validations.len(), 2);
        assert_eq!(result.validations[1].element_count, 60);

        let gx = dir.path().join("gx/uncommitted");
        assert!(
            gx.join("validations/suite_311_recent/nyc311__2024-06-15T10-30-05.json")
                .exists()
        );
        assert!(
            gx.join("evaluation_parameters/nyc311__2024-06-15T10-30-05.json")
                .exists()
        );
        let html = std::fs::read_to_string(gx.join("data_docs/index.html")).unwrap();
        assert!(html.contains("suite_311_hist"));
    }

    #[test]
    fn duplicate_key_fails_only_that_suite() {
        let (_dir, store, snapshots) = project(complaints(100, true), complaints(100, false));

        let result = run_checkpoint(&store, &snapshots, "checkpoint_311", at()).unwrap();

        assert!(!result.success);
        let recent = &result.validations[0];
        assert!(!recent.success);
        let failures: Vec<&str> = recent
            .failures()
            .map(|f| f.expectation_config.expectation_type())
            .collect();
        assert_eq!(failures, ["expect_column_values_to_be_unique"]);
        assert_eq!(recent.failures().next().unwrap().result.unexpected_count, Some(2));
        assert!(result.validations[1].success);
    }

    #[test]
    fn too_few_rows_fail_the_row_count_rule() {
        let (_dir, store, snapshots) = project(complaints(100, false), complaints(10, false));

        let result = run_checkpoint(&store, &snapshots, "checkpoint_311", at()).unwrap();

        assert!(!result.success);
        let hist = &result.validations[1];
        let failure = hist.failures().next().unwrap();
        assert_eq!(
            failure.expectation_config.expectation_type(),
            "expect_table_row_count_to_be_between"
        );
        assert_eq!(failure.result.observed_value, Some(json!(10)));
    }

    #[test]
    fn missing_checkpoint_or_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        let store = ExpectationStore::new(paths.gx_dir());
        let snapshots = SnapshotStore::new(paths, "311", "nyc311", "nyc");

        assert!(matches!(
            run_checkpoint(&store, &snapshots, "checkpoint_311", at()),
            Err(ExpectationError::MissingCheckpoint { .. })
        ));

        setup(&store, &template_for("nyc311").unwrap()).unwrap();
        assert!(matches!(
            run_checkpoint(&store, &snapshots, "checkpoint_311", at()),
            Err(ExpectationError::Db(_))
        ));
    }
}
