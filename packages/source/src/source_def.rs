//! Config-driven dataset definition.
//!
//! [`DatasetDefinition`] captures everything specific to one remote dataset
//! (endpoint, field list, window settings, declared schema, metric columns)
//! in a serializable struct loaded from an embedded TOML file.

use serde::Deserialize;

use crate::schema::ColumnSchema;
use crate::socrata::SocrataConfig;
use crate::window::HistoricalAnchor;

/// Upper bound on rows requested in a single Socrata call.
pub const MAX_LIMIT: u64 = 3000;

// ── Top-level definition ─────────────────────────────────────────────────

/// A complete, config-driven dataset definition.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetDefinition {
    /// Unique identifier (e.g., `"nyc311"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Entity name used for store tables (`raw.<entity>_<role>`).
    pub entity: String,
    /// Prefix for snapshot files (`<prefix>_<role>.csv`).
    pub snapshot_prefix: String,
    /// File stem of the analytical store (`duckdb/<database>.duckdb`).
    #[serde(default = "default_database")]
    pub database: String,
    /// Ordered list of fields every snapshot carries.
    pub fields: Vec<String>,
    /// How to fetch rows from the remote API.
    pub fetcher: FetcherConfig,
    /// Window sizing and historical offset.
    #[serde(default)]
    pub window: WindowConfig,
    /// Columns summarized by the metrics report.
    pub metrics: MetricsConfig,
    /// Declared column schema for advisory validation.
    #[serde(default)]
    pub schema: Vec<ColumnSchema>,
}

// ── Fetcher config ───────────────────────────────────────────────────────

/// How to fetch raw data from the source API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetcherConfig {
    /// Socrata SODA API (`$select/$where/$order/$limit`).
    Socrata {
        /// Resource endpoint (e.g., `".../resource/erm2-nwe9.json"`).
        api_url: String,
        /// Timestamp column used for the window filter and ordering.
        date_column: String,
        /// Row cap per call.
        limit: u64,
        /// Wall-clock timeout for the request.
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_database() -> String {
    "drift311".to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}

// ── Window config ────────────────────────────────────────────────────────

/// Window sizing.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WindowConfig {
    /// Length of both windows in days.
    pub days: u32,
    /// Where the historical window sits.
    #[serde(default)]
    pub historical: HistoricalAnchor,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            days: 7,
            historical: HistoricalAnchor::default(),
        }
    }
}

// ── Metrics config ───────────────────────────────────────────────────────

/// Which columns the metrics report summarizes.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Columns whose null rate is reported, in output order.
    pub null_rate_columns: Vec<String>,
    /// Categorical column for the top-k share list.
    pub category_column: String,
    /// How many categories to report.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

const fn default_top_k() -> usize {
    5
}

impl DatasetDefinition {
    /// Returns the unique identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the Socrata fetch configuration, capping the row limit at
    /// [`MAX_LIMIT`] and applying an optional override.
    #[must_use]
    pub fn socrata_config(&self, limit_override: Option<u64>) -> SocrataConfig {
        let FetcherConfig::Socrata {
            api_url,
            date_column,
            limit,
            timeout_secs,
        } = &self.fetcher;

        let requested = limit_override.unwrap_or(*limit);
        let limit = if requested > MAX_LIMIT {
            log::warn!("{}: limit {requested} exceeds {MAX_LIMIT}, capping", self.id);
            MAX_LIMIT
        } else {
            requested
        };

        SocrataConfig {
            api_url: api_url.clone(),
            date_column: date_column.clone(),
            limit,
            timeout: std::time::Duration::from_secs(*timeout_secs),
            label: self.name.clone(),
        }
    }
}

/// Parses a [`DatasetDefinition`] from a TOML string and checks the field
/// list.
///
/// # Errors
///
/// Returns [`crate::SourceError`] if the TOML is malformed, the field list
/// is empty or repeats a name, or a metrics column is not a field.
pub fn parse_dataset_toml(toml_str: &str) -> Result<DatasetDefinition, crate::SourceError> {
    let def: DatasetDefinition = toml::from_str(toml_str)?;

    if def.fields.is_empty() {
        return Err(crate::SourceError::Config {
            message: format!("{}: field list is empty", def.id),
        });
    }
    for (i, field) in def.fields.iter().enumerate() {
        if def.fields[..i].contains(field) {
            return Err(crate::SourceError::Config {
                message: format!("{}: duplicate field {field}", def.id),
            });
        }
    }
    let metric_columns = def
        .metrics
        .null_rate_columns
        .iter()
        .chain(std::iter::once(&def.metrics.category_column));
    for column in metric_columns {
        if !def.fields.contains(column) {
            return Err(crate::SourceError::Config {
                message: format!("{}: metrics column {column} is not a field", def.id),
            });
        }
    }

    Ok(def)
}

#[cfg(test)]
mod tests {
    use drift311_snapshot_models::COMPLAINT_FIELDS;

    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn parses_nyc311_toml() {
        let def = parse_dataset_toml(include_str!("../sources/nyc311.toml")).unwrap();
        assert_eq!(def.id(), "nyc311");
        assert_eq!(def.entity, "nyc311");
        assert_eq!(def.database, "nyc");
        assert_eq!(def.fields, COMPLAINT_FIELDS);
        assert_eq!(def.window.days, 7);
        assert_eq!(def.window.historical, HistoricalAnchor::Year { year: 2019 });
        assert_eq!(def.metrics.category_column, "complaint_type");
        assert_eq!(def.metrics.top_k, 5);
        assert_eq!(def.schema.len(), 10);
        assert!(def.schema.iter().all(|c| c.column_type == ColumnType::String));
        assert!(!def.schema[0].nullable);
    }

    #[test]
    fn caps_limit() {
        let def = parse_dataset_toml(include_str!("../sources/nyc311.toml")).unwrap();
        assert_eq!(def.socrata_config(None).limit, 3000);
        assert_eq!(def.socrata_config(Some(10_000)).limit, MAX_LIMIT);
        assert_eq!(def.socrata_config(Some(50)).limit, 50);
        assert_eq!(def.socrata_config(None).timeout.as_secs(), 60);
    }

    #[test]
    fn rejects_duplicate_fields() {
        let toml_str = r#"
            id = "x"
            name = "X"
            entity = "x"
            snapshot_prefix = "x"
            fields = ["a", "a"]

            [fetcher]
            type = "socrata"
            api_url = "http://localhost/x.json"
            date_column = "a"
            limit = 10

            [metrics]
            null_rate_columns = ["a"]
            category_column = "a"
        "#;
        let err = parse_dataset_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("duplicate field a"));
    }

    #[test]
    fn rejects_unknown_metric_column() {
        let toml_str = r#"
            id = "x"
            name = "X"
            entity = "x"
            snapshot_prefix = "x"
            fields = ["a"]

            [fetcher]
            type = "socrata"
            api_url = "http://localhost/x.json"
            date_column = "a"
            limit = 10

            [window]
            days = 3
            historical = { type = "years_back", years = 2 }

            [metrics]
            null_rate_columns = ["a"]
            category_column = "b"
        "#;
        let err = parse_dataset_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("metrics column b"));
    }
}
