//! Application context for CLI command execution.
//!
//! [`App`] finds the project, loads settings and the row store, and hands
//! commands a [`Store`] to work on. Mutating commands call [`App::save`]
//! once they are done; nothing is persisted implicitly.
//!
//! # Example
//!
//! ```no_run
//! use topdown::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_directory(Path::new(".")).await?;
//!     println!("{} rows", app.store().rows().len());
//!     Ok(())
//! }
//! ```

use crate::config::{find_topdown_root, Settings, SETTINGS_FILE_NAME, STORE_FILE_NAME, TOPDOWN_DIR_NAME};
use crate::error::{ConfigError, Result};
use crate::storage::{create_backend, StorageBackend, StoreBackend};
use std::path::{Path, PathBuf};
use topdown_core::{CommitPolicy, LoadWarning, Store};

/// Application context for CLI operations.
pub struct App {
    /// Where the store is persisted
    backend: Box<dyn StoreBackend>,

    /// The loaded row store
    store: Store,

    /// Settings from `settings.yaml`
    settings: Settings,

    /// Path to the `.topdown` directory
    topdown_dir: PathBuf,

    /// What the decoder dropped while loading
    load_warnings: Vec<LoadWarning>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("topdown_dir", &self.topdown_dir)
            .field("settings", &self.settings)
            .field("rows", &self.store.rows().len())
            .field("backend", &"<dyn StoreBackend>")
            .finish_non_exhaustive()
    }
}

impl App {
    /// Create an App for the project containing `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No topdown project is found (see [`find_topdown_root`])
    /// - Settings cannot be loaded
    /// - The store file cannot be read
    pub async fn from_directory(working_dir: &Path) -> Result<Self> {
        let root_dir = find_topdown_root(working_dir).ok_or(ConfigError::NotInitialized)?;
        let topdown_dir = root_dir.join(TOPDOWN_DIR_NAME);

        let settings = Settings::load(&topdown_dir.join(SETTINGS_FILE_NAME)).await?;
        let backend = create_backend(StorageBackend::JsonFile(topdown_dir.join(STORE_FILE_NAME)));

        Self::open(backend, settings, topdown_dir).await
    }

    /// Create an App over an explicit backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to load.
    pub async fn open(
        backend: Box<dyn StoreBackend>,
        settings: Settings,
        topdown_dir: PathBuf,
    ) -> Result<Self> {
        let (store, load_warnings) = backend.load().await?;
        tracing::debug!(
            dir = %topdown_dir.display(),
            rows = store.rows().len(),
            history = store.history().len(),
            warnings = load_warnings.len(),
            "Loaded store"
        );

        Ok(Self {
            backend,
            store,
            settings,
            topdown_dir,
            load_warnings,
        })
    }

    /// The loaded store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The loaded store, for mutation. Call [`App::save`] afterwards.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Settings in effect.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The default commit policy from settings.
    #[must_use]
    pub fn policy(&self) -> CommitPolicy {
        self.settings.commit_policy()
    }

    /// Path to the `.topdown` directory.
    #[must_use]
    pub fn topdown_dir(&self) -> &Path {
        &self.topdown_dir
    }

    /// Warnings reported while loading the store.
    #[must_use]
    pub fn load_warnings(&self) -> &[LoadWarning] {
        &self.load_warnings
    }

    /// Persist the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub async fn save(&self) -> Result<()> {
        self.backend.save(&self.store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;
    use crate::storage::InMemoryBackend;
    use tempfile::TempDir;
    use topdown_core::Row;

    #[tokio::test]
    async fn test_app_from_initialized_directory() {
        let temp_dir = TempDir::new().unwrap();
        init::init(temp_dir.path(), Some("cfg"), false).await.unwrap();

        let app = App::from_directory(temp_dir.path()).await.unwrap();

        assert_eq!(app.settings().id_prefix, "cfg");
        assert!(app.topdown_dir().ends_with(".topdown"));
        assert!(app.store().rows().is_empty());
        assert!(app.load_warnings().is_empty());
    }

    #[tokio::test]
    async fn test_app_from_subdirectory() {
        let temp_dir = TempDir::new().unwrap();
        init::init(temp_dir.path(), None, false).await.unwrap();
        let sub_dir = temp_dir.path().join("src").join("lib");
        std::fs::create_dir_all(&sub_dir).unwrap();

        let app = App::from_directory(&sub_dir).await.unwrap();
        assert_eq!(app.topdown_dir(), temp_dir.path().join(".topdown"));
    }

    #[tokio::test]
    async fn test_app_from_uninitialized_directory() {
        let temp_dir = TempDir::new().unwrap();

        let err = App::from_directory(temp_dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Not a topdown repository"));
    }

    #[tokio::test]
    async fn test_app_save_persists_mutations() {
        let temp_dir = TempDir::new().unwrap();
        init::init(temp_dir.path(), None, false).await.unwrap();

        let mut app = App::from_directory(temp_dir.path()).await.unwrap();
        let policy = app.policy();
        app.store_mut()
            .add_row(Row::new("a", "A"), &policy)
            .unwrap();
        app.save().await.unwrap();

        let reopened = App::from_directory(temp_dir.path()).await.unwrap();
        assert_eq!(reopened.store(), app.store());
        assert_eq!(reopened.store().history().len(), 1);
    }

    #[tokio::test]
    async fn test_app_keeps_load_warnings() {
        let backend = InMemoryBackend::with_document(r#"{"version": 1, "rows": [{"name": "no id"}]}"#);

        let app = App::open(Box::new(backend), Settings::default(), PathBuf::from(".topdown"))
            .await
            .unwrap();

        assert!(app.store().rows().is_empty());
        assert_eq!(app.load_warnings().len(), 1);
    }
}
