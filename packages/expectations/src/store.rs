//! File-backed expectation store.
//!
//! Layout under the store root (normally `<project>/gx`):
//!
//! ```text
//! great_expectations.json
//! expectations/<suite>.json
//! checkpoints/<checkpoint>.json
//! uncommitted/validations/<suite>/<run_name>.json
//! uncommitted/evaluation_parameters/<run_name>.json
//! uncommitted/data_docs/index.html
//! ```

use std::path::{Path, PathBuf};

use drift311_database::paths::ensure_dir;
use drift311_expectations_models::{
    Checkpoint, ContextConfig, DatasourceConfig, ExpectationSuite, SuiteValidationResult,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ExpectationError;

const CONFIG_FILE: &str = "great_expectations.json";

/// Suite, checkpoint and validation files under one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationStore {
    root: PathBuf,
}

/// Rejects names that would escape their directory.
fn checked_name(name: &str) -> Result<&str, ExpectationError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(name)
    } else {
        Err(ExpectationError::InvalidName {
            name: name.to_string(),
        })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ExpectationError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes via a sibling temp file and rename.
fn write_atomic(path: &Path, contents: &str) -> Result<(), ExpectationError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExpectationError> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    write_atomic(path, &json)
}

impl ExpectationStore {
    /// Uses `root` as the store directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn expectations_dir(&self) -> PathBuf {
        self.root.join("expectations")
    }

    fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    fn uncommitted_dir(&self) -> PathBuf {
        self.root.join("uncommitted")
    }

    /// Suite definition file.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::InvalidName`] for unsafe names.
    pub fn suite_path(&self, name: &str) -> Result<PathBuf, ExpectationError> {
        Ok(self.expectations_dir().join(format!("{}.json", checked_name(name)?)))
    }

    /// Checkpoint definition file.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::InvalidName`] for unsafe names.
    pub fn checkpoint_path(&self, name: &str) -> Result<PathBuf, ExpectationError> {
        Ok(self.checkpoints_dir().join(format!("{}.json", checked_name(name)?)))
    }

    /// Stored validation result for a suite and run.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::InvalidName`] for unsafe names.
    pub fn validation_path(&self, suite: &str, run_name: &str) -> Result<PathBuf, ExpectationError> {
        Ok(self
            .uncommitted_dir()
            .join("validations")
            .join(checked_name(suite)?)
            .join(format!("{}.json", checked_name(run_name)?)))
    }

    /// Stored evaluation parameters for a run.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::InvalidName`] for unsafe names.
    pub fn evaluation_parameters_path(&self, run_name: &str) -> Result<PathBuf, ExpectationError> {
        Ok(self
            .uncommitted_dir()
            .join("evaluation_parameters")
            .join(format!("{}.json", checked_name(run_name)?)))
    }

    /// Data-docs index page.
    #[must_use]
    pub fn data_docs_path(&self) -> PathBuf {
        self.uncommitted_dir().join("data_docs").join("index.html")
    }

    /// Creates the store directories and config file if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] if a directory or the config cannot be
    /// written.
    pub fn init(&self) -> Result<(), ExpectationError> {
        ensure_dir(&self.expectations_dir())?;
        ensure_dir(&self.checkpoints_dir())?;
        ensure_dir(&self.uncommitted_dir())?;
        if !self.root.join(CONFIG_FILE).exists() {
            self.save_config(&ContextConfig::default())?;
            log::info!("Initialized expectation store at {}", self.root.display());
        }
        Ok(())
    }

    /// Store config, or the default if none was written yet.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] if the config is unreadable.
    pub fn load_config(&self) -> Result<ContextConfig, ExpectationError> {
        Ok(read_json(&self.root.join(CONFIG_FILE))?.unwrap_or_default())
    }

    fn save_config(&self, config: &ContextConfig) -> Result<(), ExpectationError> {
        write_json(&self.root.join(CONFIG_FILE), config)
    }

    /// Registers a datasource unless one with that name exists.
    ///
    /// Returns whether it was added.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] if the config cannot be read or written.
    pub fn add_datasource(&self, datasource: DatasourceConfig) -> Result<bool, ExpectationError> {
        let mut config = self.load_config()?;
        let added = config.add_datasource(datasource);
        if added {
            self.save_config(&config)?;
        }
        Ok(added)
    }

    /// Looks up a suite.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] if the file is unreadable.
    pub fn get_suite(&self, name: &str) -> Result<Option<ExpectationSuite>, ExpectationError> {
        read_json(&self.suite_path(name)?)
    }

    /// Loads a suite that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::MissingSuite`] if it does not.
    pub fn load_suite(&self, name: &str) -> Result<ExpectationSuite, ExpectationError> {
        self.get_suite(name)?
            .ok_or_else(|| ExpectationError::MissingSuite {
                name: name.to_string(),
            })
    }

    /// Writes a suite, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] if the write fails.
    pub fn save_suite(&self, suite: &ExpectationSuite) -> Result<(), ExpectationError> {
        write_json(&self.suite_path(&suite.expectation_suite_name)?, suite)
    }

    /// Names of all stored suites, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] if the directory is unreadable.
    pub fn list_suites(&self) -> Result<Vec<String>, ExpectationError> {
        let dir = self.expectations_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Removes a checkpoint. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] if the file cannot be removed.
    pub fn delete_checkpoint(&self, name: &str) -> Result<bool, ExpectationError> {
        match std::fs::remove_file(self.checkpoint_path(name)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Adds a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::CheckpointExists`] if one with the same
    /// name is already stored.
    pub fn add_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), ExpectationError> {
        let path = self.checkpoint_path(&checkpoint.name)?;
        if path.exists() {
            return Err(ExpectationError::CheckpointExists {
                name: checkpoint.name.clone(),
            });
        }
        write_json(&path, checkpoint)
    }

    /// Loads a checkpoint that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::MissingCheckpoint`] if it does not.
    pub fn load_checkpoint(&self, name: &str) -> Result<Checkpoint, ExpectationError> {
        read_json(&self.checkpoint_path(name)?)?.ok_or_else(|| ExpectationError::MissingCheckpoint {
            name: name.to_string(),
        })
    }

    /// Stores one suite's validation result under its run name.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] if the write fails.
    pub fn store_validation(
        &self,
        result: &SuiteValidationResult,
    ) -> Result<PathBuf, ExpectationError> {
        let path = self.validation_path(&result.expectation_suite_name, &result.run_name)?;
        write_json(&path, result)?;
        Ok(path)
    }

    /// Stores a run's evaluation parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] if the write fails.
    pub fn store_evaluation_parameters(
        &self,
        run_name: &str,
        parameters: &serde_json::Value,
    ) -> Result<PathBuf, ExpectationError> {
        let path = self.evaluation_parameters_path(run_name)?;
        write_json(&path, parameters)?;
        Ok(path)
    }

    /// Writes the data-docs index page.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] if the write fails.
    pub fn write_data_docs(&self, html: &str) -> Result<PathBuf, ExpectationError> {
        let path = self.data_docs_path();
        write_atomic(&path, html)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use drift311_expectations_models::Expectation;

    use super::*;

    fn rule() -> Expectation {
        Expectation::ExpectColumnValuesToNotBeNull {
            column: "created_date".into(),
            mostly: None,
        }
    }

    #[test]
    fn suites_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExpectationStore::new(dir.path().join("gx"));
        store.init().unwrap();

        assert_eq!(store.get_suite("suite_311_recent").unwrap(), None);
        let mut suite = ExpectationSuite::new("suite_311_recent", "test");
        suite.upsert(rule());
        store.save_suite(&suite).unwrap();

        assert_eq!(store.load_suite("suite_311_recent").unwrap(), suite);
        assert_eq!(store.list_suites().unwrap(), ["suite_311_recent"]);
        assert!(
            dir.path()
                .join("gx/expectations/suite_311_recent.json")
                .exists()
        );
    }

    #[test]
    fn missing_suite_and_checkpoint_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExpectationStore::new(dir.path());
        assert!(matches!(
            store.load_suite("nope"),
            Err(ExpectationError::MissingSuite { .. })
        ));
        assert!(matches!(
            store.load_checkpoint("nope"),
            Err(ExpectationError::MissingCheckpoint { .. })
        ));
    }

    #[test]
    fn rejects_path_escaping_names() {
        let store = ExpectationStore::new("/tmp/gx");
        assert!(matches!(
            store.suite_path("../etc/passwd"),
            Err(ExpectationError::InvalidName { .. })
        ));
        assert!(store.suite_path("..").is_err());
        assert!(store.validation_path("suite_311_hist", "nyc311__2024-06-15T10-00-00").is_ok());
    }

    #[test]
    fn datasource_is_registered_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExpectationStore::new(dir.path());
        store.init().unwrap();
        let ds = DatasourceConfig {
            name: "nyc311_csv".into(),
            execution_engine: "csv".into(),
        };
        assert!(store.add_datasource(ds.clone()).unwrap());
        assert!(!store.add_datasource(ds).unwrap());
        assert_eq!(store.load_config().unwrap().datasources.len(), 1);
    }

    #[test]
    fn checkpoints_must_be_deleted_before_re_adding() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExpectationStore::new(dir.path());
        let checkpoint = Checkpoint {
            name: "checkpoint_311".into(),
            config_version: 1.0,
            run_name_template: "nyc311__%Y".into(),
            validations: Vec::new(),
            action_list: Vec::new(),
        };

        store.add_checkpoint(&checkpoint).unwrap();
        assert!(matches!(
            store.add_checkpoint(&checkpoint),
            Err(ExpectationError::CheckpointExists { .. })
        ));
        assert!(store.delete_checkpoint("checkpoint_311").unwrap());
        assert!(!store.delete_checkpoint("checkpoint_311").unwrap());
        store.add_checkpoint(&checkpoint).unwrap();
        assert_eq!(store.load_checkpoint("checkpoint_311").unwrap(), checkpoint);
    }
}
