//! Error types for topdown CLI operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The error type for topdown CLI operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A core store operation failed.
    #[error(transparent)]
    Core(#[from] topdown_core::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Problems with the `.topdown/` layout or `settings.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `.topdown/` directory was found.
    #[error("Not a topdown repository (or any parent directory). Run 'topdown init' first.")]
    NotInitialized,

    /// `init` found an existing layout.
    #[error("topdown is already initialized in this directory. Found existing '{}'", .0.display())]
    AlreadyInitialized(PathBuf),

    /// The id prefix is unusable.
    #[error("{0}")]
    InvalidPrefix(String),

    /// `settings.yaml` could not be parsed or written.
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_yaml::Error),
}

/// Problems encoding the row store for a backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be encoded.
    #[error("failed to encode store: {0}")]
    Encode(String),

    /// The target path has no parent directory or file name.
    #[error("invalid store path: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// A specialized Result type for topdown operations.
pub type Result<T> = std::result::Result<T, Error>;
