#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Snapshot roles, date windows, and the tabular snapshot value.
//!
//! A [`Snapshot`] is one fetched table of complaint records for a [`Role`]
//! and a [`DateWindow`]. Tables are immutable: every transformation
//! (reshaping, coercion) produces a new [`Table`], and every run replaces
//! the previous snapshot wholesale.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, de};
use strum_macros::{AsRefStr, Display, EnumString};

/// The ten complaint fields carried by every snapshot, in column order.
pub const COMPLAINT_FIELDS: [&str; 10] = [
    "unique_key",
    "created_date",
    "closed_date",
    "agency",
    "complaint_type",
    "descriptor",
    "city",
    "borough",
    "latitude",
    "longitude",
];

/// Which of the two parallel time windows a snapshot belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// The last complete days ending yesterday.
    Recent,
    /// The same calendar span in the comparison year.
    Hist,
}

impl Role {
    /// Both roles, in processing order.
    pub const ALL: [Self; 2] = [Self::Recent, Self::Hist];

    /// Human-readable label for log output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Recent => "RECENT",
            Self::Hist => "HISTORICAL",
        }
    }
}

/// An inclusive `(start, end)` pair of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

/// A window whose end precedes its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("window end {end} precedes start {start}")]
pub struct InvertedWindow {
    /// Requested first day.
    pub start: NaiveDate,
    /// Requested last day.
    pub end: NaiveDate,
}

impl<'de> Deserialize<'de> for DateWindow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Bounds {
            start: NaiveDate,
            end: NaiveDate,
        }

        let Bounds { start, end } = Bounds::deserialize(deserializer)?;
        Self::new(start, end).ok_or_else(|| de::Error::custom(InvertedWindow { start, end }))
    }
}

impl DateWindow {
    /// Creates a window, returning `None` when `end` precedes `start`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// First day of the window.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the window (inclusive).
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, counting both endpoints.
    #[must_use]
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Errors raised when constructing a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// A row does not have one cell per column.
    #[error("row {row} has {actual} cells, expected {expected}")]
    RowWidth {
        /// Zero-based row index.
        row: usize,
        /// Number of columns in the table.
        expected: usize,
        /// Number of cells in the offending row.
        actual: usize,
    },

    /// Replacement values do not have one entry per row.
    #[error("column {column} has {actual} values, expected {expected}")]
    ColumnLength {
        /// Name of the column being replaced.
        column: String,
        /// Number of rows in the table.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// The same column name appears more than once.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    /// A column referenced by name does not exist.
    #[error("unknown column: {0}")]
    UnknownColumn(String),
}

/// An immutable table of optional string cells.
///
/// Every row has exactly one cell per column, so every record exposes all
/// columns as keys even when the value is null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Creates a table after checking column uniqueness and row widths.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if a column name repeats or a row has the
    /// wrong number of cells.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self, TableError> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(TableError::RowWidth {
                    row,
                    expected: columns.len(),
                    actual: cells.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Creates a table with the given columns and no rows.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DuplicateColumn`] if a column name repeats.
    pub fn empty(columns: Vec<String>) -> Result<Self, TableError> {
        Self::new(columns, Vec::new())
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows in order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the named column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell values of the named column, top to bottom.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_deref()).collect())
    }

    /// Returns a record view of row `index`.
    #[must_use]
    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        self.rows.get(index).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    /// Iterates over all records.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    /// Returns a copy of this table with the named column's cells replaced.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if the column is unknown or `values` does not
    /// have one entry per row.
    pub fn with_column(&self, name: &str, values: Vec<Option<String>>) -> Result<Self, TableError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))?;
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, value)| {
                let mut row = row.clone();
                row[idx] = value;
                row
            })
            .collect();
        Ok(Self {
            columns: self.columns.clone(),
            rows,
        })
    }
}

/// A borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Option<String>],
}

impl<'a> Record<'a> {
    /// Value of the named field. `None` means the field does not exist;
    /// `Some(None)` means the field is present but null.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Option<&'a str>> {
        let values = self.values;
        let idx = self.columns.iter().position(|c| c == field)?;
        Some(values[idx].as_deref())
    }

    /// Field names and values in column order.
    pub fn fields(&self) -> impl Iterator<Item = (&'a str, Option<&'a str>)> + use<'a> {
        let Self { columns, values } = *self;
        columns
            .iter()
            .map(String::as_str)
            .zip(values.iter().map(Option::as_deref))
    }
}

/// One fetched table of records for a role and date window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Which window this snapshot covers.
    pub role: Role,
    /// The date range that was requested.
    pub window: DateWindow,
    /// The fetched rows.
    pub table: Table,
}

/// Returns `true` when a cell counts as null: absent or empty text.
#[must_use]
pub fn is_null(value: Option<&str>) -> bool {
    value.is_none_or(str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!(Role::Recent.to_string(), "recent");
        assert_eq!("hist".parse::<Role>().unwrap(), Role::Hist);
        assert_eq!(serde_json::to_string(&Role::Hist).unwrap(), "\"hist\"");
    }

    #[test]
    fn rejects_inverted_window() {
        let a = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert!(DateWindow::new(a, b).is_none());
        let w = DateWindow::new(b, a).unwrap();
        assert_eq!(w.len_days(), 7);
        assert_eq!(w.end(), a);
        assert_eq!(w.to_string(), "2024-03-04..2024-03-10");
    }

    #[test]
    fn deserializing_checks_window_order() {
        let w: DateWindow =
            serde_json::from_str(r#"{"start":"2024-03-04","end":"2024-03-10"}"#).unwrap();
        assert_eq!(w.len_days(), 7);
        assert_eq!(
            serde_json::from_str::<DateWindow>(&serde_json::to_string(&w).unwrap()).unwrap(),
            w
        );

        let err = serde_json::from_str::<DateWindow>(r#"{"start":"2024-03-10","end":"2024-03-04"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("precedes start"));
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Table::new(cols(&["a", "b"]), vec![vec![Some("1".into())]]).unwrap_err();
        assert_eq!(
            err,
            TableError::RowWidth {
                row: 0,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = Table::empty(cols(&["a", "a"])).unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("a".into()));
    }

    #[test]
    fn records_expose_every_column() {
        let table = Table::new(
            cols(&["a", "b"]),
            vec![vec![Some("x".into()), None], vec![None, Some("y".into())]],
        )
        .unwrap();
        let first = table.record(0).unwrap();
        assert_eq!(first.get("a"), Some(Some("x")));
        assert_eq!(first.get("b"), Some(None));
        assert_eq!(first.get("c"), None);
        assert_eq!(table.records().count(), 2);
        assert_eq!(table.column("b").unwrap(), vec![None, Some("y")]);
    }

    #[test]
    fn with_column_leaves_original_untouched() {
        let table = Table::new(cols(&["a"]), vec![vec![Some("1".into())]]).unwrap();
        let replaced = table.with_column("a", vec![Some("2".into())]).unwrap();
        assert_eq!(
            table.with_column("a", vec![]).unwrap_err(),
            TableError::ColumnLength {
                column: "a".into(),
                expected: 1,
                actual: 0,
            }
        );
        assert_eq!(table.column("a").unwrap(), vec![Some("1")]);
        assert_eq!(replaced.column("a").unwrap(), vec![Some("2")]);
    }

    #[test]
    fn empty_text_counts_as_null() {
        assert!(is_null(None));
        assert!(is_null(Some("")));
        assert!(!is_null(Some("BRONX")));
    }
}
