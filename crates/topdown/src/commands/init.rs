//! Implementation of the `init` command.
//!
//! Creates the `.topdown/` layout: an empty version-1 row store, default
//! settings and a `.gitignore`.

use crate::config::{
    validate_prefix, Settings, GITIGNORE_FILE_NAME, SETTINGS_FILE_NAME, STORE_FILE_NAME,
    TOPDOWN_DIR_NAME,
};
use crate::error::{ConfigError, Result};
use crate::storage::{JsonFileBackend, StoreBackend};
use std::path::{Path, PathBuf};
use tokio::fs;
use topdown_core::Store;

const GITIGNORE_CONTENT: &str = "\
# Atomic-write leftovers; config.json and settings.yaml should be tracked
*.tmp
";

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created topdown directory
    pub topdown_dir: PathBuf,
    /// Path to the created row store
    pub store_file: PathBuf,
    /// Path to the created settings file
    pub settings_file: PathBuf,
    /// Path to the created gitignore file
    pub gitignore_file: PathBuf,
    /// The prefix used for generated row ids
    pub id_prefix: String,
}

/// Initialize a topdown project in `base_dir`.
///
/// With `force`, an existing store is replaced by an empty one; settings
/// are rewritten as well.
///
/// # Errors
///
/// Returns an error if:
/// - The project is already initialized and `force` is not set
/// - The prefix is invalid
/// - File system operations fail
pub async fn init(base_dir: &Path, id_prefix: Option<&str>, force: bool) -> Result<InitResult> {
    let settings = match id_prefix {
        Some(prefix) => {
            let prefix = prefix.trim();
            validate_prefix(prefix)?;
            Settings {
                id_prefix: prefix.to_string(),
                ..Settings::default()
            }
        }
        None => Settings::default(),
    };

    let topdown_dir = base_dir.join(TOPDOWN_DIR_NAME);
    let store_file = topdown_dir.join(STORE_FILE_NAME);

    if store_file.exists() && !force {
        return Err(ConfigError::AlreadyInitialized(topdown_dir).into());
    }

    fs::create_dir_all(&topdown_dir).await?;

    JsonFileBackend::new(&store_file).save(&Store::new()).await?;

    let settings_file = topdown_dir.join(SETTINGS_FILE_NAME);
    settings.save(&settings_file).await?;

    let gitignore_file = topdown_dir.join(GITIGNORE_FILE_NAME);
    fs::write(&gitignore_file, GITIGNORE_CONTENT).await?;

    tracing::info!(dir = %topdown_dir.display(), force, "Initialized topdown project");

    Ok(InitResult {
        topdown_dir,
        store_file,
        settings_file,
        gitignore_file,
        id_prefix: settings.id_prefix,
    })
}
