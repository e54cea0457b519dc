//! The `.topdown/config.json` backend.
//!
//! Writes use the temp-file-then-rename pattern: the document is written
//! and flushed to `<file>.tmp`, then renamed over the target. On POSIX
//! file systems the rename is atomic, so readers see either the old or the
//! new store, never a partial one.

use super::{decode, StoreBackend};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use topdown_core::{LoadWarning, Store};

/// A store persisted as one pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Backend for the document at `path`. Nothing is read until `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StoreBackend for JsonFileBackend {
    async fn load(&self) -> Result<(Store, Vec<LoadWarning>)> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => {
                let source = self.path.display().to_string();
                Ok(decode(&text, &source))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Store file missing, starting empty");
                Ok((Store::new(), Vec::new()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, store: &Store) -> Result<()> {
        let text = store
            .to_json_string()
            .map_err(|e| StorageError::Encode(e.to_string()))?;
        write_atomic(&self.path, text.as_bytes()).await?;
        tracing::debug!(
            path = %self.path.display(),
            rows = store.rows().len(),
            history = store.history().len(),
            "Saved store"
        );
        Ok(())
    }
}

/// Write `contents` to `path` through a sibling temp file.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = make_temp_path(path)?;

    if let Err(e) = write_temp_file(&temp_path, contents).await {
        // Best-effort cleanup of temp file
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    fs::rename(&temp_path, path).await?;
    Ok(())
}

/// `<file>.<ext>.tmp`, or `<file>.tmp` without an extension.
fn make_temp_path(path: &Path) -> Result<PathBuf> {
    if path.file_name().is_none() {
        return Err(StorageError::InvalidPath(path.to_path_buf()).into());
    }

    let mut temp_path = path.to_path_buf();
    let new_extension = match path.extension() {
        Some(ext) => {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".tmp");
            new_ext
        }
        None => std::ffi::OsString::from("tmp"),
    };
    temp_path.set_extension(new_extension);
    Ok(temp_path)
}

async fn write_temp_file(temp_path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = File::create(temp_path).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;
    use topdown_core::{CommitPolicy, Row};

    #[rstest]
    #[case::json("/p/config.json", "/p/config.json.tmp")]
    #[case::no_extension("/p/store", "/p/store.tmp")]
    #[case::relative("config.json", "config.json.tmp")]
    fn test_make_temp_path(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(
            make_temp_path(Path::new(path)).unwrap(),
            PathBuf::from(expected)
        );
    }

    #[test]
    fn test_make_temp_path_rejects_root() {
        assert!(make_temp_path(Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(temp_dir.path().join("config.json"));

        let (store, warnings) = backend.load().await.unwrap();

        assert_eq!(store, Store::new());
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        let backend = JsonFileBackend::new(&path);

        let mut store = Store::new();
        store
            .add_row(Row::new("a", "A"), &CommitPolicy::lenient())
            .unwrap();
        backend.save(&store).await.unwrap();

        assert!(path.is_file());
        assert!(!temp_dir.path().join("config.json.tmp").exists());

        let (loaded, warnings) = backend.load().await.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(loaded, store);
    }

    #[tokio::test]
    async fn test_wrong_version_loads_empty_with_warning() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"version": 2, "rows": []}"#)
            .await
            .unwrap();

        let (store, warnings) = JsonFileBackend::new(&path).load().await.unwrap();

        assert!(store.rows().is_empty());
        assert!(matches!(
            warnings.as_slice(),
            [LoadWarning::UnsupportedVersion(_)]
        ));
    }

    #[tokio::test]
    async fn test_save_into_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(temp_dir.path().join("nope").join("config.json"));

        assert!(backend.save(&Store::new()).await.is_err());
    }
}
