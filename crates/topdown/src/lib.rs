//! Topdown - configuration rows with a dependency graph and restorable history.
//!
//! This crate provides the `topdown` CLI and the pieces behind it: settings,
//! storage backends and output formatting. The row model, graph engine and
//! snapshot timeline live in `topdown-core`.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod app;
pub mod config;
pub mod error;
pub mod output;
pub mod storage;

// Public CLI module (needed by binary)
pub mod cli;

// Command implementations
pub mod commands;
