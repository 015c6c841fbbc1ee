//! Socrata SODA API slice fetcher.
//!
//! Issues one `$select`/`$where`/`$order`/`$limit` query per date window and
//! reshapes the response so the resulting table has exactly the requested
//! fields, in order, whatever the source actually populated.

use std::time::Duration;

use async_trait::async_trait;
use drift311_snapshot_models::{DateWindow, Table};

use crate::parsing::cell_text;
use crate::{SliceSource, SourceError, http};

/// Configuration for Socrata slice queries.
#[derive(Debug, Clone)]
pub struct SocrataConfig {
    /// Resource URL (e.g., `"https://data.cityofnewyork.us/resource/erm2-nwe9.json"`).
    pub api_url: String,
    /// Timestamp column for the window filter and ordering.
    pub date_column: String,
    /// Row cap per call.
    pub limit: u64,
    /// Wall-clock timeout for the request.
    pub timeout: Duration,
    /// Label for log messages.
    pub label: String,
}

/// Builds the inclusive time predicate for `window`.
#[must_use]
pub fn where_clause(date_column: &str, window: DateWindow) -> String {
    format!(
        "{date_column} >= '{}T00:00:00' AND {date_column} <= '{}T23:59:59'",
        window.start().format("%Y-%m-%d"),
        window.end().format("%Y-%m-%d"),
    )
}

/// Builds the SODA query parameters for one slice.
#[must_use]
pub fn query_params(
    config: &SocrataConfig,
    window: DateWindow,
    fields: &[String],
) -> Vec<(&'static str, String)> {
    vec![
        ("$select", fields.join(",")),
        ("$where", where_clause(&config.date_column, window)),
        ("$order", format!("{} DESC", config.date_column)),
        ("$limit", config.limit.to_string()),
    ]
}

/// Reshapes a JSON array of objects into a table with exactly `fields` as
/// columns. Absent keys become null; keys not in `fields` are dropped.
///
/// # Errors
///
/// Returns [`SourceError::InvalidResponse`] if `body` is not a JSON array,
/// or [`SourceError::Table`] if `fields` repeats a name.
pub fn reshape(body: &serde_json::Value, fields: &[String]) -> Result<Table, SourceError> {
    let records = body.as_array().ok_or_else(|| SourceError::InvalidResponse {
        message: format!("expected a JSON array, got {}", json_kind(body)),
    })?;

    let mut rows = Vec::with_capacity(records.len());
    let mut non_objects = 0usize;

    for record in records {
        let row = if let Some(obj) = record.as_object() {
            fields
                .iter()
                .map(|field| obj.get(field).and_then(cell_text))
                .collect()
        } else {
            non_objects += 1;
            vec![None; fields.len()]
        };
        rows.push(row);
    }

    if non_objects > 0 {
        log::warn!("{non_objects} response element(s) were not objects; kept as all-null rows");
    }

    Ok(Table::new(fields.to_vec(), rows)?)
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// A Socrata dataset queried one slice at a time.
pub struct SocrataSource {
    client: reqwest::Client,
    config: SocrataConfig,
}

impl SocrataSource {
    /// Creates a source with a client that enforces the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(config: SocrataConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SliceSource for SocrataSource {
    fn label(&self) -> &str {
        &self.config.label
    }

    async fn fetch_slice(&self, window: DateWindow, fields: &[String]) -> Result<Table, SourceError> {
        let params = query_params(&self.config, window, fields);
        log::info!(
            "Fetching {} data for {window}: limit={}",
            self.config.label,
            self.config.limit
        );
        log::debug!("Query parameters: {params:?}");

        let body = http::send_json(self.client.get(&self.config.api_url).query(&params)).await?;
        let table = reshape(&body, fields)?;

        log::info!("Downloaded {} {} records", table.len(), self.config.label);
        Ok(table)
    }
}
