#![allow(clippy::module_name_repetitions)]
//! Canonical file paths under the project root.
//!
//! Layout:
//!
//! ```text
//! <root>/data/<prefix>_<role>.csv
//! <root>/duckdb/<database>.duckdb
//! <root>/artifacts/metrics.json
//! <root>/gx/
//! ```

use std::path::{Path, PathBuf};

use drift311_snapshot_models::Role;

/// Resolves all pipeline paths relative to one project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    /// Uses `root` as the project root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Uses `explicit` as the root, falling back to the current directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the current directory cannot be read.
    pub fn resolve(explicit: Option<PathBuf>) -> std::io::Result<Self> {
        if let Some(root) = explicit {
            return Ok(Self::new(root));
        }
        Ok(Self::new(std::env::current_dir()?))
    }

    /// Returns the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the `data/` directory for snapshot files.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Returns the snapshot file path for a role.
    #[must_use]
    pub fn snapshot_path(&self, prefix: &str, role: Role) -> PathBuf {
        self.data_dir().join(format!("{prefix}_{role}.csv"))
    }

    /// Returns the `duckdb/` directory.
    #[must_use]
    pub fn duckdb_dir(&self) -> PathBuf {
        self.root.join("duckdb")
    }

    /// Returns the analytical store file path.
    #[must_use]
    pub fn db_path(&self, database: &str) -> PathBuf {
        self.duckdb_dir().join(format!("{database}.duckdb"))
    }

    /// Returns the `artifacts/` directory.
    #[must_use]
    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    /// Returns the metrics report path.
    #[must_use]
    pub fn metrics_path(&self) -> PathBuf {
        self.artifacts_dir().join("metrics.json")
    }

    /// Returns the expectation store directory.
    #[must_use]
    pub fn gx_dir(&self) -> PathBuf {
        self.root.join("gx")
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lays_out_paths_under_root() {
        let paths = ProjectPaths::new("/tmp/proj");
        assert_eq!(
            paths.snapshot_path("311", Role::Recent),
            Path::new("/tmp/proj/data/311_recent.csv")
        );
        assert_eq!(
            paths.snapshot_path("311", Role::Hist),
            Path::new("/tmp/proj/data/311_hist.csv")
        );
        assert_eq!(paths.db_path("nyc"), Path::new("/tmp/proj/duckdb/nyc.duckdb"));
        assert_eq!(paths.metrics_path(), Path::new("/tmp/proj/artifacts/metrics.json"));
        assert_eq!(paths.gx_dir(), Path::new("/tmp/proj/gx"));
    }

    #[test]
    fn explicit_root_wins() {
        let paths = ProjectPaths::resolve(Some(PathBuf::from("/srv/x"))).unwrap();
        assert_eq!(paths.root(), Path::new("/srv/x"));
    }
}
