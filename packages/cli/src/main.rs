#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `drift311`: fetches a recent and a historical slice of NYC 311 service
//! requests, persists them, and checks them with metrics and expectation
//! suites.
//!
//! Exit status: `0` on success, `1` when the checkpoint reports a failing
//! suite, `2` on any other error.
//!
//! Running with no subcommand opens an interactive menu. Uses
//! `indicatif-log-bridge` (via [`drift311_cli_utils::init_logger`]) so log
//! lines and spinners never fight for the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "drift311", about = "NYC 311 snapshot drift pipeline")]
struct Cli {
    /// Project root holding `data/`, `duckdb/`, `artifacts/` and `gx/`
    /// (defaults to the current directory)
    #[arg(long, global = true, env = "DRIFT311_ROOT")]
    root: Option<PathBuf>,

    /// Dataset identifier (defaults to `nyc311`)
    #[arg(long, global = true, env = "DRIFT311_DATASET")]
    dataset: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Overrides for the window computation.
#[derive(Args, Clone, Debug, Default)]
pub struct WindowArgs {
    /// Treat this date as today (YYYY-MM-DD) for reproducible windows
    #[arg(long)]
    pub today: Option<NaiveDate>,
    /// Length of both windows in days
    #[arg(long)]
    pub days: Option<u32>,
    /// Place the historical window in this year
    #[arg(long, conflicts_with = "years_back")]
    pub hist_year: Option<i32>,
    /// Place the historical window this many years back
    #[arg(long)]
    pub years_back: Option<u32>,
}

/// Options for fetching snapshots.
#[derive(Args, Clone, Debug, Default)]
pub struct FetchArgs {
    #[command(flatten)]
    pub window: WindowArgs,
    /// Maximum rows per snapshot (capped at 3000)
    #[arg(long)]
    pub limit: Option<u64>,
    /// Skip mirroring the snapshots into `DuckDB`
    #[arg(long)]
    pub skip_db: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Fetch both snapshots and persist them
    Fetch(FetchArgs),
    /// Declare the expectation suites and the checkpoint
    Setup,
    /// Compute the metrics report from the snapshot files
    Metrics,
    /// Run the checkpoint against the snapshot files
    Checkpoint {
        /// Checkpoint name (defaults to the dataset's checkpoint)
        #[arg(long)]
        name: Option<String>,
    },
    /// Run fetch, setup, metrics and checkpoint in order
    Run(FetchArgs),
    /// Print both windows without fetching
    Windows(WindowArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let multi = drift311_cli_utils::init_logger();
    let cli = Cli::parse();

    let ctx = match commands::Context::resolve(cli.root, cli.dataset.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(2);
        }
    };

    let command = match cli.command {
        Some(command) => command,
        None => match interactive::choose(&ctx) {
            Ok(Some(command)) => command,
            Ok(None) => return ExitCode::SUCCESS,
            Err(e) => {
                log::error!("{e}");
                return ExitCode::from(2);
            }
        },
    };

    match commands::execute(&ctx, command, &multi).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(2)
        }
    }
}
