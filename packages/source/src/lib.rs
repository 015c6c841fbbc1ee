#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Remote slice fetching for complaint snapshots.
//!
//! A run computes two [`window::Windows`], fetches one slice per window
//! through a [`SliceSource`], and runs the advisory [`schema`] check on each
//! result before it is persisted.

pub mod http;
pub mod parsing;
pub mod progress;
pub mod registry;
pub mod schema;
pub mod socrata;
pub mod source_def;
pub mod window;

use async_trait::async_trait;
use drift311_snapshot_models::{DateWindow, Role, Snapshot, Table, TableError};

use crate::progress::ProgressCallback;
use crate::source_def::DatasetDefinition;

/// Errors that can occur while fetching or configuring a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body_preview}")]
    Status {
        /// Requested URL including query string.
        url: String,
        /// Response status code.
        status: u16,
        /// Leading part of the response body.
        body_preview: String,
    },

    /// The response body was not the expected shape.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of what went wrong.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Dataset definition TOML failed to parse.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Dataset definition is inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Date-window arithmetic failed.
    #[error("Window error: {0}")]
    Window(#[from] window::WindowError),

    /// The fetched rows could not form a table.
    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

/// A remote tabular source that can be queried one date window at a time.
#[async_trait]
pub trait SliceSource: Send + Sync {
    /// Label for log messages.
    fn label(&self) -> &str;

    /// Fetches every row created inside `window`, reshaped to exactly
    /// `fields` in order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the response is
    /// malformed. A single attempt is made.
    async fn fetch_slice(&self, window: DateWindow, fields: &[String]) -> Result<Table, SourceError>;
}

/// Fetches one snapshot and runs the advisory schema check on it.
///
/// Schema violations are logged and the coerced table is kept; they never
/// fail the fetch.
///
/// # Errors
///
/// Returns [`SourceError`] if the fetch fails.
pub async fn fetch_snapshot(
    source: &dyn SliceSource,
    dataset: &DatasetDefinition,
    role: Role,
    window: DateWindow,
    progress: &dyn ProgressCallback,
) -> Result<Snapshot, SourceError> {
    log::info!("Fetching {} {window}", role.label());
    progress.set_message(format!("Fetching {} {window}", role.label()));

    let table = source.fetch_slice(window, &dataset.fields).await?;
    log::info!("Rows {role}: {}", table.len());

    let normalized = schema::normalize(&table, &dataset.schema);
    schema::log_violations(&format!("{} {role}", source.label()), &normalized.violations);

    let rows = normalized.table.len();
    if normalized.is_valid() {
        progress.finish(format!("{} {window}: {rows} rows", role.label()));
    } else {
        progress.finish(format!(
            "{} {window}: {rows} rows ({} schema violation(s))",
            role.label(),
            normalized.violations.len()
        ));
    }

    Ok(Snapshot {
        role,
        window,
        table: normalized.table,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;

    #[derive(Default)]
    struct RecordingProgress {
        finished: Mutex<Vec<String>>,
    }

    impl ProgressCallback for RecordingProgress {
        fn set_message(&self, _msg: String) {}

        fn finish(&self, msg: String) {
            self.finished.lock().unwrap().push(msg);
        }
    }

    struct FakeSource {
        body: serde_json::Value,
        requested: Mutex<Vec<DateWindow>>,
    }

    #[async_trait]
    impl SliceSource for FakeSource {
        fn label(&self) -> &str {
            "fake"
        }

        async fn fetch_slice(
            &self,
            window: DateWindow,
            fields: &[String],
        ) -> Result<Table, SourceError> {
            self.requested.lock().unwrap().push(window);
            socrata::reshape(&self.body, fields)
        }
    }

    #[tokio::test]
    async fn schema_violations_do_not_block_the_snapshot() {
        let dataset = registry::resolve_dataset(Some("nyc311")).unwrap();
        let source = FakeSource {
            // unique_key is declared non-nullable.
            body: serde_json::json!([{"created_date": "2024-06-10T00:00:00.000"}]),
            requested: Mutex::new(Vec::new()),
        };
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 6, 8).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 14).unwrap(),
        )
        .unwrap();

        let progress = RecordingProgress::default();

        let snapshot = fetch_snapshot(&source, &dataset, Role::Recent, window, &progress)
            .await
            .unwrap();

        assert_eq!(snapshot.role, Role::Recent);
        assert_eq!(snapshot.table.len(), 1);
        assert_eq!(snapshot.table.columns(), dataset.fields.as_slice());
        assert_eq!(*source.requested.lock().unwrap(), vec![window]);

        let finished = progress.finished.lock().unwrap();
        assert_eq!(finished.len(), 1);
        assert!(finished[0].contains("1 rows"));
        assert!(finished[0].contains("schema violation(s)"));
    }
}
