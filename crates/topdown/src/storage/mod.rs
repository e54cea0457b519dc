//! Persistence backends for the row store.
//!
//! The core crate is synchronous and never touches the file system; this
//! layer moves a [`Store`] between memory and its persisted form. Backends
//! are async so callers can share one runtime with other I/O.
//!
//! - **JSON file**: the `.topdown/config.json` document, written atomically
//! - **In-memory**: an encoded document held in a mutex, for tests and embedding
//!
//! # Example
//!
//! ```no_run
//! use topdown::storage::{create_backend, StorageBackend};
//! use topdown_core::{CommitPolicy, Row};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = create_backend(StorageBackend::InMemory);
//!     let (mut store, _warnings) = backend.load().await?;
//!     store.add_row(Row::new("build", "Build"), &CommitPolicy::lenient())?;
//!     backend.save(&store).await?;
//!     Ok(())
//! }
//! ```

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use topdown_core::{LoadWarning, Store};

mod in_memory;
mod json_file;

pub use in_memory::InMemoryBackend;
pub use json_file::JsonFileBackend;

/// Loads and saves a whole [`Store`].
///
/// Loading is fail-soft: an unusable document yields an empty store and
/// warnings, never an error. Only I/O failures are errors.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Load the store, reporting anything that had to be dropped.
    async fn load(&self) -> Result<(Store, Vec<LoadWarning>)>;

    /// Replace the persisted store with `store`.
    async fn save(&self, store: &Store) -> Result<()>;
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Ephemeral storage
    InMemory,

    /// A JSON document on disk
    JsonFile(PathBuf),
}

impl StorageBackend {
    /// Returns the data file path for file-based backends.
    #[must_use]
    pub fn data_path(&self) -> Option<&Path> {
        match self {
            Self::JsonFile(path) => Some(path),
            Self::InMemory => None,
        }
    }
}

/// Create a backend from its configuration.
#[must_use]
pub fn create_backend(backend: StorageBackend) -> Box<dyn StoreBackend> {
    match backend {
        StorageBackend::InMemory => Box::new(InMemoryBackend::new()),
        StorageBackend::JsonFile(path) => Box::new(JsonFileBackend::new(path)),
    }
}

/// Decode a persisted document, logging each warning.
pub(crate) fn decode(text: &str, source: &str) -> (Store, Vec<LoadWarning>) {
    let (store, warnings) = Store::from_json_str(text);
    for warning in &warnings {
        tracing::warn!(source, %warning, "Store load warning");
    }
    (store, warnings)
}
