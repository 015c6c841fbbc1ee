//! Interactive menu shown when `drift311` runs without a subcommand.

use dialoguer::{Confirm, Input, Select};
use drift311_source::source_def::MAX_LIMIT;

use crate::commands::Context;
use crate::{Commands, FetchArgs};

/// Top-level menu entries.
enum Action {
    RunPipeline,
    Fetch,
    Setup,
    Metrics,
    Checkpoint,
    Windows,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::RunPipeline,
        Self::Fetch,
        Self::Setup,
        Self::Metrics,
        Self::Checkpoint,
        Self::Windows,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunPipeline => "Run full pipeline",
            Self::Fetch => "Fetch snapshots",
            Self::Setup => "Set up expectation suites",
            Self::Metrics => "Build metrics report",
            Self::Checkpoint => "Run checkpoint",
            Self::Windows => "Show windows",
            Self::Quit => "Quit",
        }
    }
}

/// Prompts for the fetch options that are most often changed.
fn prompt_fetch_args(ctx: &Context) -> Result<FetchArgs, dialoguer::Error> {
    let limit: u64 = Input::new()
        .with_prompt(format!("Row limit per snapshot (max {MAX_LIMIT})"))
        .default(ctx.dataset.socrata_config(None).limit)
        .interact_text()?;

    let skip_db = Confirm::new()
        .with_prompt("Skip the DuckDB mirror?")
        .default(false)
        .interact()?;

    Ok(FetchArgs {
        limit: Some(limit),
        skip_db,
        ..FetchArgs::default()
    })
}

/// Shows the menu and returns the chosen command, or `None` to quit.
///
/// # Errors
///
/// Returns an error if the terminal prompt fails.
pub fn choose(ctx: &Context) -> Result<Option<Commands>, dialoguer::Error> {
    println!("drift311: {}", ctx.dataset.name());
    println!("Project root: {}", ctx.paths.root().display());
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(match Action::ALL[idx] {
        Action::RunPipeline => Some(Commands::Run(prompt_fetch_args(ctx)?)),
        Action::Fetch => Some(Commands::Fetch(prompt_fetch_args(ctx)?)),
        Action::Setup => Some(Commands::Setup),
        Action::Metrics => Some(Commands::Metrics),
        Action::Checkpoint => Some(Commands::Checkpoint { name: None }),
        Action::Windows => Some(Commands::Windows(crate::WindowArgs::default())),
        Action::Quit => None,
    })
}
