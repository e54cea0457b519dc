//! Project layout, settings and root discovery.
//!
//! A topdown project keeps everything under `.topdown/`:
//!
//! - `config.json`: the row store (rows, history, bookmarks, schema)
//! - `settings.yaml`: tool settings, all keys optional
//! - `.gitignore`

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use topdown_core::CommitPolicy;

/// Name of the topdown directory
pub const TOPDOWN_DIR_NAME: &str = ".topdown";

/// Name of the row store file
pub const STORE_FILE_NAME: &str = "config.json";

/// Name of the settings file
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

/// Name of the gitignore file within .topdown
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Environment variable naming the project root explicitly
pub const ROOT_ENV_VAR: &str = "TOPDOWN_ROOT";

/// Default prefix for generated row ids
pub const DEFAULT_ID_PREFIX: &str = "td";

/// Minimum prefix length
pub const MIN_PREFIX_LENGTH: usize = 2;

/// Maximum prefix length
pub const MAX_PREFIX_LENGTH: usize = 20;

/// Maximum directory depth to traverse when searching for the project root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Tool settings read from `.topdown/settings.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// Prefix for generated row ids (`<prefix>-xxxx`)
    pub id_prefix: String,

    /// Whether edits are checked by the lock guard
    pub enforce_locks: bool,

    /// Which findings block a commit by default
    pub validation: ValidationSettings,
}

/// The `validation:` section of the settings file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ValidationSettings {
    /// Reject commits containing a cycle
    pub fail_on_cycle: bool,
    /// Reject commits with dangling dependencies
    pub fail_on_missing_deps: bool,
    /// Reject commits with argument errors
    pub fail_on_args_errors: bool,
    /// Reject commits with argument warnings
    pub fail_on_warnings: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            enforce_locks: true,
            validation: ValidationSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// names an invalid id prefix.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        // An empty document deserializes as unit, not as a mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Self = serde_yaml::from_str(&content).map_err(ConfigError::from)?;
        validate_prefix(&settings.id_prefix)?;
        Ok(settings)
    }

    /// Save settings to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(ConfigError::from)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// The default commit policy these settings describe.
    #[must_use]
    pub fn commit_policy(&self) -> CommitPolicy {
        CommitPolicy {
            fail_on_cycle: self.validation.fail_on_cycle,
            fail_on_missing_deps: self.validation.fail_on_missing_deps,
            fail_on_args_errors: self.validation.fail_on_args_errors,
            fail_on_warnings: self.validation.fail_on_warnings,
            enforce_locks: self.enforce_locks,
        }
    }
}

/// Validate a generated-id prefix.
///
/// Requirements:
/// - 2-20 characters
/// - ASCII letters and digits only
/// - starts with a letter, so generated ids are valid row ids
///
/// Expects pre-trimmed input.
///
/// # Errors
///
/// Returns `ConfigError::InvalidPrefix` describing the first violated rule.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    let invalid = |msg: String| -> Result<()> { Err(ConfigError::InvalidPrefix(msg).into()) };

    if prefix.len() < MIN_PREFIX_LENGTH {
        return invalid(format!(
            "Prefix must be at least {MIN_PREFIX_LENGTH} characters"
        ));
    }
    if prefix.len() > MAX_PREFIX_LENGTH {
        return invalid(format!("Prefix cannot exceed {MAX_PREFIX_LENGTH} characters"));
    }
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return invalid("Prefix must contain only alphanumeric characters".to_string());
    }
    if !prefix.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return invalid("Prefix must start with a letter".to_string());
    }
    Ok(())
}

/// Whether `dir` contains an initialized `.topdown/` layout.
#[must_use]
pub fn is_initialized(dir: &Path) -> bool {
    dir.join(TOPDOWN_DIR_NAME).join(STORE_FILE_NAME).is_file()
}

/// Find the project root for `start_dir`.
///
/// `TOPDOWN_ROOT` wins when it points at an initialized project; otherwise
/// the directory tree is searched upward from `start_dir`.
#[must_use]
pub fn find_topdown_root(start_dir: &Path) -> Option<PathBuf> {
    let env_root = std::env::var_os(ROOT_ENV_VAR).map(PathBuf::from);
    find_root_from(env_root.as_deref(), start_dir)
}

/// Root discovery with the environment override passed in explicitly.
pub(crate) fn find_root_from(env_root: Option<&Path>, start_dir: &Path) -> Option<PathBuf> {
    if let Some(root) = env_root {
        if is_initialized(root) {
            return Some(root.to_path_buf());
        }
        tracing::warn!(
            env_var = ROOT_ENV_VAR,
            path = %root.display(),
            "Ignoring root override without an initialized project"
        );
    }

    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if is_initialized(&current) {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
