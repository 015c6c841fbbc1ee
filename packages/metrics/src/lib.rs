#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Snapshot metrics: row counts, per-column null rates, and the most
//! frequent categories of one column.
//!
//! Both snapshots are read back from their files, so this step can run
//! without a network connection or access to the analytical store.

use std::collections::HashMap;
use std::path::Path;

use drift311_database::{DbError, SnapshotStore};
use drift311_metrics_models::{
    CategoryShare, MetricsReport, NULL_CATEGORY, NullRates, SnapshotMetrics,
};
use drift311_snapshot_models::{Role, Table, is_null};

/// Producer name written into every report.
pub const GENERATED_BY: &str = "drift311_metrics";

/// Errors that can occur while computing or writing metrics.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A requested column is not in the snapshot.
    #[error("column {column:?} not found in {role} snapshot")]
    MissingColumn {
        /// Snapshot the column was looked up in.
        role: Role,
        /// Requested column.
        column: String,
    },

    /// Snapshot files could not be read.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Report serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Report could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which columns to measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Columns to report null rates for, in output order.
    pub null_rate_columns: Vec<String>,
    /// Column whose most frequent values are reported.
    pub category_column: String,
    /// How many categories to report.
    pub top_k: usize,
}

fn column_values<'a>(
    table: &'a Table,
    role: Role,
    column: &str,
) -> Result<Vec<Option<&'a str>>, MetricsError> {
    table.column(column).ok_or_else(|| MetricsError::MissingColumn {
        role,
        column: column.to_string(),
    })
}

/// Rounds to 4 decimal places, resolving exact halves to the even digit.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round_ties_even() / 10_000.0
}

#[allow(clippy::cast_precision_loss)]
fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Fraction of rows whose value in `column` is null, rounded to 4
/// decimals. An empty table has a rate of 0.
///
/// # Errors
///
/// Returns [`MetricsError::MissingColumn`] if the column is absent.
pub fn null_rate(table: &Table, role: Role, column: &str) -> Result<f64, MetricsError> {
    let values = column_values(table, role, column)?;
    let nulls = values.iter().filter(|v| is_null(**v)).count();
    Ok(round4(ratio(nulls, values.len())))
}

/// Null rates for each column in `columns`, keeping their order.
///
/// # Errors
///
/// Returns [`MetricsError::MissingColumn`] for the first absent column.
pub fn null_rates(table: &Table, role: Role, columns: &[String]) -> Result<NullRates, MetricsError> {
    columns
        .iter()
        .map(|column| Ok((column.clone(), null_rate(table, role, column)?)))
        .collect::<Result<Vec<_>, MetricsError>>()
        .map(NullRates)
}

/// The `k` most frequent values of `column` with their share of all rows.
///
/// Nulls are counted under [`NULL_CATEGORY`]. Ties keep the order in which
/// the values first appear. Shares are rounded to 4 decimals.
///
/// # Errors
///
/// Returns [`MetricsError::MissingColumn`] if the column is absent.
pub fn top_shares(
    table: &Table,
    role: Role,
    column: &str,
    k: usize,
) -> Result<Vec<CategoryShare>, MetricsError> {
    let values = column_values(table, role, column)?;

    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in &values {
        let label = if is_null(*value) {
            NULL_CATEGORY
        } else {
            value.unwrap_or(NULL_CATEGORY)
        };
        match positions.get(label) {
            Some(&i) => counts[i].1 += 1,
            None => {
                positions.insert(label, counts.len());
                counts.push((label, 1));
            }
        }
    }

    // stable: equal counts stay in first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(counts
        .into_iter()
        .take(k)
        .map(|(value, count)| CategoryShare {
            value: value.to_string(),
            share: round4(ratio(count, values.len())),
        })
        .collect())
}

/// Computes all metrics for one snapshot.
///
/// # Errors
///
/// Returns [`MetricsError::MissingColumn`] if a configured column is absent.
pub fn snapshot_metrics(
    table: &Table,
    role: Role,
    settings: &MetricsSettings,
) -> Result<SnapshotMetrics, MetricsError> {
    Ok(SnapshotMetrics {
        rows: table.len() as u64,
        nulls: null_rates(table, role, &settings.null_rate_columns)?,
        top_categories: top_shares(table, role, &settings.category_column, settings.top_k)?,
    })
}

/// Builds the report for a recent and a historical snapshot.
///
/// # Errors
///
/// Returns [`MetricsError::MissingColumn`] if a configured column is absent
/// from either snapshot.
pub fn build_report(
    recent: &Table,
    hist: &Table,
    settings: &MetricsSettings,
) -> Result<MetricsReport, MetricsError> {
    Ok(MetricsReport::new(
        snapshot_metrics(recent, Role::Recent, settings)?,
        snapshot_metrics(hist, Role::Hist, settings)?,
        GENERATED_BY,
    ))
}

/// Writes the report as indented JSON, replacing any previous report.
///
/// The document is written to a sibling temp file and renamed into place so
/// a reader never sees a partial report.
///
/// # Errors
///
/// Returns [`MetricsError`] if serialization or the write fails.
pub fn write_report(path: &Path, report: &MetricsReport) -> Result<(), MetricsError> {
    if let Some(parent) = path.parent() {
        drift311_database::paths::ensure_dir(parent)?;
    }
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Loads both snapshot files from `store`, computes the report, and writes
/// it to the project's metrics path.
///
/// # Errors
///
/// Returns [`MetricsError`] if a snapshot is missing, a column is absent,
/// or the report cannot be written.
pub fn run(store: &SnapshotStore, settings: &MetricsSettings) -> Result<MetricsReport, MetricsError> {
    let recent = store.load(Role::Recent)?;
    let hist = store.load(Role::Hist)?;
    let report = build_report(&recent, &hist, settings)?;

    let path = store.paths().metrics_path();
    write_report(&path, &report)?;
    log::info!(
        "Wrote metrics ({} recent rows, {} historical rows) to {}",
        report.rows_recent,
        report.rows_hist,
        path.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use drift311_database::paths::ProjectPaths;
    use drift311_snapshot_models::{DateWindow, Snapshot};

    use super::*;

    fn column_table(name: &str, values: &[Option<&str>]) -> Table {
        Table::new(
            vec![name.to_string()],
            values
                .iter()
                .map(|v| vec![v.map(str::to_string)])
                .collect(),
        )
        .unwrap()
    }

    fn settings() -> MetricsSettings {
        MetricsSettings {
            null_rate_columns: vec![
                "created_date".into(),
                "complaint_type".into(),
                "borough".into(),
            ],
            category_column: "complaint_type".into(),
            top_k: 5,
        }
    }

    fn complaints(rows: &[(&str, Option<&str>, Option<&str>)]) -> Table {
        Table::new(
            vec![
                "created_date".into(),
                "complaint_type".into(),
                "borough".into(),
            ],
            rows.iter()
                .map(|(date, kind, borough)| {
                    vec![
                        Some((*date).to_string()),
                        kind.map(str::to_string),
                        borough.map(str::to_string),
                    ]
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn null_rate_counts_missing_and_empty() {
        let table = column_table("borough", &[Some("a"), None, None, Some("b")]);
        assert!((null_rate(&table, Role::Recent, "borough").unwrap() - 0.5).abs() < f64::EPSILON);

        let table = column_table("borough", &[Some(""), Some("QUEENS")]);
        assert!((null_rate(&table, Role::Recent, "borough").unwrap() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn null_rate_of_empty_table_is_zero() {
        let table = column_table("borough", &[]);
        assert!(null_rate(&table, Role::Hist, "borough").unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn missing_column_is_an_error() {
        let table = column_table("borough", &[Some("a")]);
        let err = null_rate(&table, Role::Hist, "agency").unwrap_err();
        assert!(matches!(err, MetricsError::MissingColumn { role: Role::Hist, .. }));
    }

    #[test]
    fn top_shares_divide_by_all_rows() {
        let table = column_table("complaint_type", &[Some("X"), Some("X"), Some("Y"), None]);
        let top = top_shares(&table, Role::Recent, "complaint_type", 2).unwrap();
        assert_eq!(
            top,
            vec![
                CategoryShare {
                    value: "X".into(),
                    share: 0.5
                },
                CategoryShare {
                    value: "Y".into(),
                    share: 0.25
                },
            ]
        );
    }

    #[test]
    fn top_shares_count_nulls_and_keep_tie_order() {
        let table = column_table("complaint_type", &[None, Some("B"), Some("A"), Some("")]);
        let top = top_shares(&table, Role::Recent, "complaint_type", 5).unwrap();
        let labels: Vec<&str> = top.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(labels, ["NULL", "B", "A"]);
        assert!((top[0].share - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn shares_are_rounded() {
        let table = column_table("c", &[Some("a"), Some("b"), Some("b")]);
        let top = top_shares(&table, Role::Recent, "c", 5).unwrap();
        assert!((top[0].share - 0.6667).abs() < f64::EPSILON);
        assert!((top[1].share - 0.3333).abs() < f64::EPSILON);
    }

    #[test]
    fn exact_halves_round_to_even() {
        let mut values = vec![Some("A")];
        values.extend(std::iter::repeat_n(Some("B"), 31));
        let table = column_table("c", &values);
        let top = top_shares(&table, Role::Recent, "c", 5).unwrap();
        assert_eq!(top[1].value, "A");
        assert!((top[1].share - 0.0312).abs() < f64::EPSILON);

        let mut values = vec![None];
        values.extend(std::iter::repeat_n(Some("QUEENS"), 31));
        let table = column_table("borough", &values);
        assert!((null_rate(&table, Role::Hist, "borough").unwrap() - 0.0312).abs() < f64::EPSILON);

        assert!((round4(5.0 / 32.0) - 0.1562).abs() < f64::EPSILON);
    }

    #[test]
    fn report_is_deterministic() {
        let recent = complaints(&[
            ("2024-06-08T01:00:00.000", Some("Noise"), Some("BRONX")),
            ("2024-06-09T01:00:00.000", Some("Noise"), None),
            ("2024-06-10T01:00:00.000", None, Some("QUEENS")),
        ]);
        let hist = complaints(&[("2019-06-08T01:00:00.000", Some("Heat"), Some("BROOKLYN"))]);

        let first = build_report(&recent, &hist, &settings()).unwrap();
        let second = build_report(&recent, &hist, &settings()).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.rows_recent, 3);
        assert_eq!(first.rows_hist, 1);
        assert_eq!(first.nulls_recent.get("borough"), Some(0.3333));
        assert_eq!(first.top_complaint_type_hist[0].value, "Heat");
        assert_eq!(first.generated_by, GENERATED_BY);
    }

    #[test]
    fn run_writes_report_from_snapshot_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(ProjectPaths::new(dir.path()), "311", "nyc311", "nyc");
        let window = DateWindow::new("2024-06-08".parse().unwrap(), "2024-06-14".parse().unwrap())
            .unwrap();
        let recent = Snapshot {
            role: Role::Recent,
            window,
            table: complaints(&[("2024-06-08T01:00:00.000", Some("Noise"), None)]),
        };
        let hist = Snapshot {
            role: Role::Hist,
            window,
            table: complaints(&[]),
        };
        store.write_files(&[&recent, &hist]).unwrap();

        let report = run(&store, &settings()).unwrap();

        let written = std::fs::read_to_string(dir.path().join("artifacts/metrics.json")).unwrap();
        let parsed: MetricsReport = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, report);
        assert_eq!(parsed.rows_hist, 0);
        assert!(parsed.top_complaint_type_hist.is_empty());
        assert_eq!(parsed.nulls_recent.get("borough"), Some(1.0));
        assert!(!dir.path().join("artifacts/metrics.json.tmp").exists());
    }

    #[test]
    fn run_requires_both_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(ProjectPaths::new(dir.path()), "311", "nyc311", "nyc");
        assert!(matches!(
            run(&store, &settings()),
            Err(MetricsError::Db(DbError::MissingSnapshot { .. }))
        ));
    }
}
