//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::{ArgGroup, Parser, Subcommand};

use super::validators::{validate_name, validate_prefix, validate_row_id};

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Prefix for generated row ids (e.g., "cfg" for "cfg-a1b2")
    ///
    /// Must be 2-20 alphanumeric characters starting with a letter.
    #[arg(short, long, value_parser = validate_prefix)]
    pub prefix: Option<String>,

    /// Replace an existing store with an empty one
    #[arg(short, long)]
    pub force: bool,

    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `add` command
#[derive(Parser, Debug, Clone)]
pub struct AddArgs {
    /// Row name
    #[arg(value_parser = validate_name)]
    pub name: String,

    /// Row id (generated from the configured prefix if omitted)
    #[arg(long, value_parser = validate_row_id)]
    pub id: Option<String>,

    /// Grouping label
    #[arg(short, long)]
    pub scope: Option<String>,

    /// Argument string
    #[arg(short, long, default_value = "", allow_hyphen_values = true)]
    pub args: String,

    /// Expression or command text
    #[arg(short, long, default_value = "", allow_hyphen_values = true)]
    pub expr: String,

    /// Rows this row depends on (comma-separated ids)
    #[arg(short, long, value_delimiter = ',')]
    pub depends: Vec<String>,

    /// Source file globs (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Create the row locked
    #[arg(long)]
    pub locked: bool,
}

/// Arguments for commands that take a single row id
#[derive(Parser, Debug, Clone)]
pub struct RowArgs {
    /// Row ID
    #[arg(value_parser = validate_row_id)]
    pub id: String,
}

/// Arguments for the `list` command
#[derive(Parser, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only rows in this scope
    #[arg(short, long)]
    pub scope: Option<String>,

    /// Only pinned rows
    #[arg(long)]
    pub pinned: bool,

    /// Only locked rows
    #[arg(long)]
    pub locked: bool,
}

/// Arguments for the `set` command
#[derive(Parser, Debug, Clone)]
#[command(group(ArgGroup::new("lock_state").args(["lock", "unlock"])))]
#[command(group(ArgGroup::new("scope_change").args(["scope", "clear_scope"])))]
#[command(group(ArgGroup::new("notes_change").args(["notes", "clear_notes"])))]
#[command(group(ArgGroup::new("depends_change").args(["depends", "clear_depends"])))]
#[allow(clippy::struct_excessive_bools)]
pub struct SetArgs {
    /// Row ID to update
    #[arg(value_parser = validate_row_id)]
    pub id: String,

    /// New name
    #[arg(long, value_parser = validate_name)]
    pub name: Option<String>,

    /// New argument string
    #[arg(short, long, allow_hyphen_values = true)]
    pub args: Option<String>,

    /// New expression
    #[arg(short, long, allow_hyphen_values = true)]
    pub expr: Option<String>,

    /// New scope
    #[arg(short, long)]
    pub scope: Option<String>,

    /// Remove the scope
    #[arg(long)]
    pub clear_scope: bool,

    /// Replace dependencies (comma-separated ids)
    #[arg(short, long, value_delimiter = ',')]
    pub depends: Option<Vec<String>>,

    /// Remove all dependencies
    #[arg(long)]
    pub clear_depends: bool,

    /// Replace source globs (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub sources: Option<Vec<String>>,

    /// New notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Remove the notes
    #[arg(long)]
    pub clear_notes: bool,

    /// Lock the row
    #[arg(long)]
    pub lock: bool,

    /// Unlock the row
    #[arg(long)]
    pub unlock: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Also fail on warnings (argument warnings, unused locked rows)
    #[arg(long)]
    pub strict: bool,

    /// Fail when a dependency cycle exists (always on; errors always fail)
    #[arg(long)]
    pub fail_on_cycle: bool,

    /// Fail when a row depends on a missing row (always on; errors always fail)
    #[arg(long)]
    pub fail_on_missing_deps: bool,
}

/// Arguments for the `history` command
#[derive(Parser, Debug, Clone, Default)]
pub struct HistoryArgs {
    /// Only entries with this kind tag (e.g. row.add, undo)
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Only entries whose label or kind contains this text (case-insensitive)
    #[arg(short, long)]
    pub search: Option<String>,

    /// Show at most this many of the most recent matches
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Arguments for the `playhead` command
#[derive(Parser, Debug, Clone)]
pub struct PlayheadArgs {
    /// Playhead action (shows the playhead when omitted)
    #[command(subcommand)]
    pub action: Option<PlayheadAction>,
}

/// Playhead movements
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PlayheadAction {
    /// Point at a history index (-1 for latest)
    Set {
        /// History index
        #[arg(allow_negative_numbers = true)]
        index: i64,
    },

    /// Point back at the latest entry
    Clear,

    /// Step one entry back
    Prev,

    /// Step one entry forward
    Next,
}

/// Arguments for commands that take a history index
#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    /// History index
    pub index: usize,
}

/// Arguments for the `bookmark` command
#[derive(Parser, Debug, Clone)]
pub struct BookmarkArgs {
    /// Bookmark subcommand
    #[command(subcommand)]
    pub action: BookmarkAction,
}

/// Bookmark management actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum BookmarkAction {
    /// Bookmark the current rows
    Add {
        /// Bookmark name
        name: String,
    },

    /// List bookmarks
    List,

    /// Replace the rows with a bookmark's snapshot
    Restore {
        /// Bookmark ID
        id: String,
    },

    /// Delete a bookmark
    Delete {
        /// Bookmark ID
        id: String,
    },
}
