//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for topdown using clap's
//! derive API. Each command has its own argument struct with validation and
//! helpful error messages.
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! topdown add "Fetch sources" --id fetch --scope ci
//! topdown add "Build" --id build --depends fetch --args "--release"
//! topdown impact fetch
//! topdown history --kind row.add
//! topdown restore 0
//! ```

mod args;
mod execute;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use args::{
    AddArgs, BookmarkAction, BookmarkArgs, HistoryArgs, IndexArgs, InitArgs, ListArgs,
    PlayheadAction, PlayheadArgs, RowArgs, SetArgs, ValidateArgs,
};

pub use validators::{validate_name, validate_prefix, validate_row_id};

/// Topdown - configuration rows with a dependency graph and restorable history
///
/// Rows live in `.topdown/config.json`. Every change is recorded as a
/// snapshot that can be diffed against, restored or undone.
#[derive(Parser, Debug)]
#[command(name = "topdown")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a topdown project
    ///
    /// Creates `.topdown/` with an empty row store, default settings and a
    /// `.gitignore`.
    Init(InitArgs),

    /// Add a row
    Add(AddArgs),

    /// Show one row
    Get(RowArgs),

    /// List rows
    List(ListArgs),

    /// Update a row
    ///
    /// Only the given fields change. A locked row's name, args, expr and
    /// dependencies can only change together with `--unlock`.
    Set(SetArgs),

    /// Delete a row
    Delete(RowArgs),

    /// Duplicate a row as an unlocked variant
    Duplicate(RowArgs),

    /// Pin a row
    Pin(RowArgs),

    /// Unpin a row
    Unpin(RowArgs),

    /// Show direct and transitive dependencies of a row
    Deps(RowArgs),

    /// Show which rows are affected by changing a row, level by level
    Impact(RowArgs),

    /// Show rows in dependency order
    Order,

    /// Report dependency cycles
    Cycles,

    /// Validate all rows
    ///
    /// Exits with status 1 on any error (cycles, missing dependencies,
    /// argument errors). `--strict` also fails on warnings.
    Validate(ValidateArgs),

    /// Show the history log
    History(HistoryArgs),

    /// Show or move the playhead
    Playhead(PlayheadArgs),

    /// Restore the rows recorded at a history entry
    ///
    /// The restore is appended as a new entry; nothing is discarded.
    Restore(IndexArgs),

    /// Restore the state before the last change
    Undo,

    /// Compare the current rows with a history entry
    Diff(IndexArgs),

    /// Manage bookmarks
    Bookmark(BookmarkArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    #[must_use]
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments.
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or, for `validate`, if the
    /// findings violate the policy.
    pub async fn execute(&self) -> Result<()> {
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        match &self.command {
            Some(Commands::Init(args)) => execute::execute_init(args).await,
            Some(Commands::Add(args)) => {
                execute::execute_add(&mut open_app().await?, args, output_mode).await
            }
            Some(Commands::Get(args)) => execute::execute_get(&open_app().await?, args, output_mode),
            Some(Commands::List(args)) => {
                execute::execute_list(&open_app().await?, args, output_mode)
            }
            Some(Commands::Set(args)) => {
                execute::execute_set(&mut open_app().await?, args, output_mode).await
            }
            Some(Commands::Delete(args)) => {
                execute::execute_delete(&mut open_app().await?, args, output_mode).await
            }
            Some(Commands::Duplicate(args)) => {
                execute::execute_duplicate(&mut open_app().await?, args, output_mode).await
            }
            Some(Commands::Pin(args)) => {
                execute::execute_pin(&mut open_app().await?, args, true, output_mode).await
            }
            Some(Commands::Unpin(args)) => {
                execute::execute_pin(&mut open_app().await?, args, false, output_mode).await
            }
            Some(Commands::Deps(args)) => {
                execute::execute_deps(&open_app().await?, args, output_mode)
            }
            Some(Commands::Impact(args)) => {
                execute::execute_impact(&open_app().await?, args, output_mode)
            }
            Some(Commands::Order) => execute::execute_order(&open_app().await?, output_mode),
            Some(Commands::Cycles) => execute::execute_cycles(&open_app().await?, output_mode),
            Some(Commands::Validate(args)) => {
                execute::execute_validate(&open_app().await?, args, output_mode)
            }
            Some(Commands::History(args)) => {
                execute::execute_history(&open_app().await?, args, output_mode)
            }
            Some(Commands::Playhead(args)) => {
                execute::execute_playhead(&mut open_app().await?, args, output_mode).await
            }
            Some(Commands::Restore(args)) => {
                execute::execute_restore(&mut open_app().await?, args, output_mode).await
            }
            Some(Commands::Undo) => execute::execute_undo(&mut open_app().await?, output_mode).await,
            Some(Commands::Diff(args)) => {
                execute::execute_diff(&open_app().await?, args, output_mode)
            }
            Some(Commands::Bookmark(args)) => {
                execute::execute_bookmark(&mut open_app().await?, args, output_mode).await
            }
            None => {
                println!("Topdown configuration rows");
                println!("Use --help for more information");
                Ok(())
            }
        }
    }
}

/// Open the project that contains the working directory.
async fn open_app() -> Result<crate::app::App> {
    Ok(crate::app::App::from_directory(&std::env::current_dir()?).await?)
}
