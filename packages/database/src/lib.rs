#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Snapshot persistence for drift311.
//!
//! Snapshots are written to one CSV file per role (the durable copy that
//! downstream steps read) and mirrored into a `DuckDB` file under the `raw`
//! schema. Both are fully replaced on every run.

pub mod paths;
pub mod snapshot_db;
pub mod snapshot_file;

use std::path::PathBuf;

use drift311_snapshot_models::{Role, Snapshot, Table, TableError};

use crate::paths::ProjectPaths;

/// Errors that can occur during snapshot persistence.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error (including lock contention on open).
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored rows could not form a table.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// A snapshot file has not been written yet.
    #[error("snapshot file not found: {} (run `fetch` first)", path.display())]
    MissingSnapshot {
        /// Expected file location.
        path: PathBuf,
    },

    /// A mirrored table does not exist.
    #[error("table not found: {name}")]
    MissingTable {
        /// Qualified table name.
        name: String,
    },

    /// A configured name is not safe to use as a SQL identifier.
    #[error("invalid identifier: {name:?}")]
    InvalidIdentifier {
        /// The rejected name.
        name: String,
    },
}

/// Where one dataset's snapshots live.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    paths: ProjectPaths,
    snapshot_prefix: String,
    entity: String,
    database: String,
}

impl SnapshotStore {
    /// Creates a store for a dataset.
    #[must_use]
    pub fn new(
        paths: ProjectPaths,
        snapshot_prefix: impl Into<String>,
        entity: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            paths,
            snapshot_prefix: snapshot_prefix.into(),
            entity: entity.into(),
            database: database.into(),
        }
    }

    /// The project paths this store resolves against.
    #[must_use]
    pub const fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Snapshot file for a role.
    #[must_use]
    pub fn snapshot_path(&self, role: Role) -> PathBuf {
        self.paths.snapshot_path(&self.snapshot_prefix, role)
    }

    /// Analytical store file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths.db_path(&self.database)
    }

    /// Writes each snapshot to its role's file.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any write fails.
    pub fn write_files(&self, snapshots: &[&Snapshot]) -> Result<(), DbError> {
        for snapshot in snapshots {
            let path = self.snapshot_path(snapshot.role);
            snapshot_file::write_table(&path, &snapshot.table)?;
            log::info!(
                "Wrote {} rows ({}) to {}",
                snapshot.table.len(),
                snapshot.window,
                path.display()
            );
        }
        Ok(())
    }

    /// Mirrors each snapshot into `raw.<entity>_<role>`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be opened or written.
    pub fn mirror(&self, snapshots: &[&Snapshot]) -> Result<(), DbError> {
        let tables: Vec<(Role, &Table)> = snapshots.iter().map(|s| (s.role, &s.table)).collect();
        snapshot_db::mirror_tables(&self.db_path(), &self.entity, &tables)
    }

    /// Writes the snapshot files and then mirrors them into the store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if either step fails.
    pub fn persist(&self, snapshots: &[&Snapshot]) -> Result<(), DbError> {
        self.write_files(snapshots)?;
        self.mirror(snapshots)
    }

    /// Loads a role's snapshot from its file (not from the analytical store,
    /// which may be locked by another process).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file is missing or unreadable.
    pub fn load(&self, role: Role) -> Result<Table, DbError> {
        snapshot_file::read_table(&self.snapshot_path(role))
    }
}

#[cfg(test)]
mod tests {
    use drift311_snapshot_models::DateWindow;

    use super::*;

    fn window() -> DateWindow {
        DateWindow::new("2024-06-08".parse().unwrap(), "2024-06-14".parse().unwrap()).unwrap()
    }

    fn snapshot(role: Role, keys: &[&str]) -> Snapshot {
        Snapshot {
            role,
            window: window(),
            table: Table::new(
                vec!["unique_key".into(), "borough".into()],
                keys.iter()
                    .map(|k| vec![Some((*k).to_string()), None])
                    .collect(),
            )
            .unwrap(),
        }
    }

    #[test]
    fn persist_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(ProjectPaths::new(dir.path()), "311", "nyc311", "nyc");
        let recent = snapshot(Role::Recent, &["1", "2", "3"]);
        let hist = snapshot(Role::Hist, &["7"]);

        store.persist(&[&recent, &hist]).unwrap();
        store.persist(&[&recent, &hist]).unwrap();

        assert_eq!(store.load(Role::Recent).unwrap(), recent.table);
        assert_eq!(store.load(Role::Hist).unwrap(), hist.table);

        let conn = snapshot_db::open(&store.db_path()).unwrap();
        assert_eq!(
            snapshot_db::read_table(&conn, "nyc311", Role::Recent).unwrap(),
            recent.table
        );
    }

    #[test]
    fn files_are_named_by_role() {
        let store = SnapshotStore::new(ProjectPaths::new("/p"), "311", "nyc311", "nyc");
        assert!(store.snapshot_path(Role::Hist).ends_with("data/311_hist.csv"));
        assert!(store.db_path().ends_with("duckdb/nyc.duckdb"));
    }
}
