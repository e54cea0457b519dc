//! Error and outcome types for core operations.
//!
//! Two kinds of failure exist:
//!
//! - **[`Error`]**: the caller asked for something invalid (unknown row,
//!   duplicate id, edit of a locked row, commit rejected by policy).
//! - **[`NoOpReason`]**: the operation was valid but had nothing to act on
//!   (restore of an entry without a snapshot, undo with no earlier state).
//!   These are reported through [`Outcome::NoOp`] and leave the store unchanged.

use crate::domain::RowId;
use crate::id_generation::IdGenerationError;
use crate::validation::ValidationReport;
use thiserror::Error;

/// The error type for core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Row not found.
    #[error("Row not found: {0}")]
    RowNotFound(RowId),

    /// A row with this id already exists.
    #[error("Duplicate row id: {0}")]
    DuplicateId(RowId),

    /// The id does not satisfy the id grammar.
    #[error("Invalid row id '{0}': expected a letter or '_' followed by letters, digits, '_', '.' or '-' (max {max} chars)", max = crate::id_generation::MAX_ID_LENGTH)]
    InvalidId(String),

    /// The operation would rewrite or remove a locked row.
    #[error("Row {id} is locked; unlock it before {operation}")]
    RowLocked {
        /// The locked row
        id: RowId,
        /// What was attempted
        operation: &'static str,
    },

    /// The commit policy refused the candidate row set.
    #[error("Commit rejected: {}", .0.summary())]
    CommitRejected(Box<ValidationReport>),

    /// No unique generated id could be found.
    #[error("ID generation failed: {0}")]
    IdGeneration(#[from] IdGenerationError),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an operation left the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoOpReason {
    /// The history log has no entries.
    #[error("history is empty")]
    EmptyHistory,

    /// The requested history index does not exist.
    #[error("history index {index} is out of range ({len} entries)")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Current history length
        len: usize,
    },

    /// The entry exists but carries no usable snapshot.
    #[error("no snapshot available for history entry {0}")]
    NoSnapshot(usize),

    /// No earlier entry with a snapshot exists.
    #[error("nothing to undo")]
    NothingToUndo,

    /// No bookmark with this id exists.
    #[error("bookmark not found: {0}")]
    BookmarkNotFound(String),
}

/// Result of an operation that may legitimately do nothing.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation ran and produced a value.
    Applied(T),
    /// The operation had nothing to act on; the store is unchanged.
    NoOp(NoOpReason),
}

impl<T> Outcome<T> {
    /// Whether the operation ran.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Whether the operation was a no-op.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp(_))
    }

    /// The produced value, if the operation ran.
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::NoOp(_) => None,
        }
    }

    /// The no-op reason, if the operation did nothing.
    #[must_use]
    pub fn noop_reason(&self) -> Option<&NoOpReason> {
        match self {
            Self::Applied(_) => None,
            Self::NoOp(reason) => Some(reason),
        }
    }
}
