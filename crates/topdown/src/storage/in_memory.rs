//! Ephemeral backend holding the encoded store.

use super::{decode, StoreBackend};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use tokio::sync::Mutex;
use topdown_core::{LoadWarning, Store};

/// Keeps the last saved document in memory.
///
/// The store is kept in its encoded form, so a load goes through the same
/// decoder as a file and returns an independent copy.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    document: Mutex<Option<String>>,
}

impl InMemoryBackend {
    /// An empty backend; the first load returns an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend pre-loaded with a raw document, which need not be valid.
    #[must_use]
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
        }
    }

    /// The currently held document, if any.
    pub async fn document(&self) -> Option<String> {
        self.document.lock().await.clone()
    }
}

#[async_trait]
impl StoreBackend for InMemoryBackend {
    async fn load(&self) -> Result<(Store, Vec<LoadWarning>)> {
        match self.document.lock().await.as_deref() {
            Some(text) => Ok(decode(text, "memory")),
            None => Ok((Store::new(), Vec::new())),
        }
    }

    async fn save(&self, store: &Store) -> Result<()> {
        let text = store
            .to_json_string()
            .map_err(|e| StorageError::Encode(e.to_string()))?;
        *self.document.lock().await = Some(text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topdown_core::{CommitPolicy, Row};

    #[tokio::test]
    async fn test_save_then_load_returns_equal_store() {
        let backend = InMemoryBackend::new();
        let mut store = Store::new();
        store
            .add_row(Row::new("a", "A"), &CommitPolicy::lenient())
            .unwrap();

        backend.save(&store).await.unwrap();
        let (loaded, warnings) = backend.load().await.unwrap();

        assert!(warnings.is_empty());
        assert_eq!(loaded, store);
    }

    #[tokio::test]
    async fn test_corrupt_document_loads_empty_with_warning() {
        let backend = InMemoryBackend::with_document("{ not json");

        let (store, warnings) = backend.load().await.unwrap();

        assert!(store.rows().is_empty());
        assert!(matches!(warnings.as_slice(), [LoadWarning::MalformedJson(_)]));
    }

    #[tokio::test]
    async fn test_save_replaces_document() {
        let backend = InMemoryBackend::with_document("[]");
        backend.save(&Store::new()).await.unwrap();

        let document = backend.document().await.unwrap();
        assert!(document.contains("\"version\": 1"));
    }
}
