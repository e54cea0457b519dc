//! Topdown core - dependency graph engine and snapshot timeline for
//! configuration rows.
//!
//! This crate is synchronous and performs no I/O. Callers load a [`Store`]
//! (see [`Store::from_json_str`]), query or mutate it, and persist it again.
//!
//! ```
//! use topdown_core::{CommitPolicy, Row, Store};
//!
//! let policy = CommitPolicy::lenient();
//! let mut store = Store::new();
//! store.add_row(Row::new("a", "A"), &policy).unwrap();
//! store.add_row(Row::new("b", "B").with_depends(["a"]), &policy).unwrap();
//!
//! let graph = store.graph();
//! assert_eq!(graph.affected_downstream("a").len(), 1);
//! assert_eq!(store.history().len(), 2);
//! ```

#![forbid(unsafe_code)]

pub mod domain;
pub mod error;
pub mod graph;
pub mod id_generation;
pub mod store;
pub mod validation;

pub use domain::{
    ArgsSchema, ArgsType, Bookmark, HistoryEntry, Row, RowId, RowStatus, Schema, Snapshot,
};
pub use error::{Error, NoOpReason, Outcome, Result};
pub use graph::{DependencyGraph, DependencyNode, TopologicalOrder};
pub use store::{LoadWarning, Store};
pub use validation::{speculative_validate, validate_args, CommitPolicy, ValidationReport};
