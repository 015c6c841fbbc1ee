#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Metrics report types.
//!
//! The report is written once per run and never mutated. Key order in the
//! serialized document is fixed so identical snapshots produce identical
//! bytes.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Label used for null cells in category counts.
pub const NULL_CATEGORY: &str = "NULL";

/// Null rate per column, in the order the columns were requested.
///
/// Serializes as a JSON object whose keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NullRates(pub Vec<(String, f64)>);

impl NullRates {
    /// Rate for a column, if it was measured.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<f64> {
        self.0
            .iter()
            .find_map(|(name, rate)| (name == column).then_some(*rate))
    }
}

impl Serialize for NullRates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, rate) in &self.0 {
            map.serialize_entry(column, rate)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NullRates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NullRatesVisitor;

        impl<'de> Visitor<'de> for NullRatesVisitor {
            type Value = NullRates;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column name to null rate")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<NullRates, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((column, rate)) = access.next_entry::<String, f64>()? {
                    entries.push((column, rate));
                }
                Ok(NullRates(entries))
            }
        }

        deserializer.deserialize_map(NullRatesVisitor)
    }
}

/// One category and its share of all rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    /// Category value, or [`NULL_CATEGORY`].
    pub value: String,
    /// Fraction of rows, rounded to 4 decimals.
    pub share: f64,
}

/// Metrics for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotMetrics {
    /// Row count.
    pub rows: u64,
    /// Null rate per requested column.
    pub nulls: NullRates,
    /// Most frequent categories.
    pub top_categories: Vec<CategoryShare>,
}

/// The per-run metrics document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Rows in the recent snapshot.
    pub rows_recent: u64,
    /// Rows in the historical snapshot.
    pub rows_hist: u64,
    /// Null rates in the recent snapshot.
    pub nulls_recent: NullRates,
    /// Null rates in the historical snapshot.
    pub nulls_hist: NullRates,
    /// Top complaint types in the recent snapshot.
    pub top_complaint_type_recent: Vec<CategoryShare>,
    /// Top complaint types in the historical snapshot.
    pub top_complaint_type_hist: Vec<CategoryShare>,
    /// Producer of the report.
    pub generated_by: String,
}

impl MetricsReport {
    /// Assembles a report from the two snapshots' metrics.
    #[must_use]
    pub fn new(recent: SnapshotMetrics, hist: SnapshotMetrics, generated_by: &str) -> Self {
        Self {
            rows_recent: recent.rows,
            rows_hist: hist.rows,
            nulls_recent: recent.nulls,
            nulls_hist: hist.nulls,
            top_complaint_type_recent: recent.top_categories,
            top_complaint_type_hist: hist.top_categories,
            generated_by: generated_by.to_string(),
        }
    }
}
