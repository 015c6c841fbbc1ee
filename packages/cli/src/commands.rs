//! Subcommand implementations.
//!
//! Each command returns `Ok(true)` on success, `Ok(false)` when the
//! checkpoint reports a failing suite, and `Err` on any fatal error.

use std::path::PathBuf;

use chrono::{Local, Utc};
use drift311_cli_utils::{IndicatifProgress, MultiProgress, steps_bar};
use drift311_database::SnapshotStore;
use drift311_database::paths::ProjectPaths;
use drift311_expectations::checkpoint::run_checkpoint;
use drift311_expectations::store::ExpectationStore;
use drift311_expectations::template::{SuiteTemplate, template_for};
use drift311_expectations_models::CheckpointResult;
use drift311_metrics::MetricsSettings;
use drift311_snapshot_models::Role;
use drift311_source::registry::resolve_dataset;
use drift311_source::socrata::SocrataSource;
use drift311_source::source_def::DatasetDefinition;
use drift311_source::window::{HistoricalAnchor, Windows, compute_windows};
use drift311_source::{SliceSource, fetch_snapshot};

use crate::{Commands, FetchArgs, WindowArgs};

type CmdResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Dataset definition and project paths shared by every command.
pub struct Context {
    pub dataset: DatasetDefinition,
    pub paths: ProjectPaths,
}

impl Context {
    /// Resolves the dataset and the project root.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset is unknown or the current directory
    /// cannot be read.
    pub fn resolve(root: Option<PathBuf>, dataset: Option<&str>) -> CmdResult<Self> {
        Ok(Self {
            dataset: resolve_dataset(dataset)?,
            paths: ProjectPaths::resolve(root)?,
        })
    }

    fn snapshots(&self) -> SnapshotStore {
        SnapshotStore::new(
            self.paths.clone(),
            &self.dataset.snapshot_prefix,
            &self.dataset.entity,
            &self.dataset.database,
        )
    }

    fn expectations(&self) -> ExpectationStore {
        ExpectationStore::new(self.paths.gx_dir())
    }

    fn template(&self) -> CmdResult<SuiteTemplate> {
        Ok(template_for(&self.dataset.id)?)
    }

    fn metrics_settings(&self) -> MetricsSettings {
        MetricsSettings {
            null_rate_columns: self.dataset.metrics.null_rate_columns.clone(),
            category_column: self.dataset.metrics.category_column.clone(),
            top_k: self.dataset.metrics.top_k,
        }
    }
}

/// Dispatches one subcommand.
///
/// # Errors
///
/// Returns an error if the command fails for any reason other than a
/// failing expectation suite.
pub async fn execute(ctx: &Context, command: Commands, multi: &MultiProgress) -> CmdResult<bool> {
    match command {
        Commands::Fetch(args) => fetch(ctx, &args, multi).await.map(|()| true),
        Commands::Setup => setup(ctx).map(|()| true),
        Commands::Metrics => metrics(ctx).map(|()| true),
        Commands::Checkpoint { name } => checkpoint(ctx, name.as_deref()),
        Commands::Run(args) => run(ctx, &args, multi).await,
        Commands::Windows(args) => {
            let windows = windows(ctx, &args)?;
            println!("recent: {} ({} days)", windows.recent, windows.recent.len_days());
            println!("hist:   {} ({} days)", windows.hist, windows.hist.len_days());
            Ok(true)
        }
    }
}

/// Computes the windows, applying command-line overrides over the dataset's
/// window settings.
fn windows(ctx: &Context, args: &WindowArgs) -> CmdResult<Windows> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let days = args.days.unwrap_or(ctx.dataset.window.days);
    let anchor = match (args.hist_year, args.years_back) {
        (Some(year), _) => HistoricalAnchor::Year { year },
        (None, Some(years)) => HistoricalAnchor::YearsBack { years },
        (None, None) => ctx.dataset.window.historical,
    };
    Ok(compute_windows(today, days, anchor)?)
}

async fn fetch(ctx: &Context, args: &FetchArgs, multi: &MultiProgress) -> CmdResult<()> {
    let windows = windows(ctx, &args.window)?;
    log::info!("Recent window: {}", windows.recent);
    log::info!("Historical window: {}", windows.hist);

    let source = SocrataSource::new(ctx.dataset.socrata_config(args.limit))?;
    log::debug!("Querying {} as {}", ctx.dataset.name(), source.label());

    let mut snapshots = Vec::with_capacity(Role::ALL.len());
    for (role, window) in [(Role::Recent, windows.recent), (Role::Hist, windows.hist)] {
        let progress = IndicatifProgress::spinner(multi, &format!("Fetching {}", role.label()));
        snapshots.push(fetch_snapshot(&source, &ctx.dataset, role, window, progress.as_ref()).await?);
    }

    let store = ctx.snapshots();
    let refs: Vec<_> = snapshots.iter().collect();
    store.write_files(&refs)?;
    if args.skip_db {
        log::info!("Skipping DuckDB mirror");
    } else {
        store.mirror(&refs)?;
    }

    for snapshot in &snapshots {
        println!("Rows {}: {}", snapshot.role, snapshot.table.len());
    }
    Ok(())
}

fn setup(ctx: &Context) -> CmdResult<()> {
    let summary = drift311_expectations::setup(&ctx.expectations(), &ctx.template()?)?;
    for (suite, added) in &summary.suites {
        println!("Saved suite: {suite} ({added} new expectations)");
    }
    println!("Checkpoint '{}' ready.", summary.checkpoint);
    Ok(())
}

fn metrics(ctx: &Context) -> CmdResult<()> {
    drift311_metrics::run(&ctx.snapshots(), &ctx.metrics_settings())?;
    println!("Wrote {}", ctx.paths.metrics_path().display());
    Ok(())
}

fn checkpoint(ctx: &Context, name: Option<&str>) -> CmdResult<bool> {
    let name = match name {
        Some(name) => name.to_string(),
        None => ctx.template()?.checkpoint.name,
    };
    let result = run_checkpoint(
        &ctx.expectations(),
        &ctx.snapshots(),
        &name,
        Utc::now().naive_utc(),
    )?;
    print_report(&result);
    Ok(result.success)
}

/// Runs every step in order, stopping at the first fatal error.
async fn run(ctx: &Context, args: &FetchArgs, multi: &MultiProgress) -> CmdResult<bool> {
    let steps = steps_bar(multi, "Pipeline", 4);

    steps.set_message("Fetching snapshots");
    fetch(ctx, args, multi).await?;
    steps.inc(1);

    steps.set_message("Declaring expectations");
    setup(ctx)?;
    steps.inc(1);

    steps.set_message("Building metrics");
    metrics(ctx)?;
    steps.inc(1);

    steps.set_message("Running checkpoint");
    let success = checkpoint(ctx, None)?;
    steps.inc(1);

    steps.finish_with_message(if success {
        "Pipeline complete"
    } else {
        "Pipeline complete (validation failed)"
    });
    Ok(success)
}

const fn status(success: bool) -> &'static str {
    if success { "PASS" } else { "FAIL" }
}

fn dataset_label(role: Role) -> &'static str {
    match role {
        Role::Recent => "Recent",
        Role::Hist => "Historical",
    }
}

/// Prints per-suite status and, on failure, every failing rule with its
/// result payload.
fn print_report(result: &CheckpointResult) {
    println!();
    println!("Validation complete!");
    for validation in &result.validations {
        println!(
            "{} data: {}",
            dataset_label(validation.role),
            status(validation.success)
        );
    }
    println!("Overall success: {}", result.success);

    if result.success {
        return;
    }

    println!();
    println!("Validation failures:");
    for validation in result.validations.iter().filter(|v| !v.success) {
        println!();
        println!("{} dataset failures:", dataset_label(validation.role));
        for failure in validation.failures() {
            println!("  - {}", failure.expectation_config.expectation_type());
            if let Some(message) = &failure.exception_message {
                println!("    {message}");
            }
            if !failure.result.is_empty()
                && let Ok(payload) = serde_json::to_string(&failure.result)
            {
                println!("    {payload}");
            }
        }
    }
}
