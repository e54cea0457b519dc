//! Named snapshots kept outside the linear history.

use super::{kind, Store};
use crate::domain::{Bookmark, Snapshot};
use crate::error::{NoOpReason, Outcome, Result};
use crate::id_generation::IdGenerator;
use tracing::info;

const BOOKMARK_PREFIX: &str = "bm";
const BOOKMARK_ID_LENGTH: usize = 6;

impl Store {
    /// Bookmark the current rows under `name`.
    ///
    /// Bookmarks do not touch the history log.
    ///
    /// # Errors
    ///
    /// Returns an error if no unique bookmark id could be generated.
    pub fn add_bookmark(&mut self, name: impl Into<String>) -> Result<Bookmark> {
        let name = name.into();
        let mut generator = IdGenerator::new(BOOKMARK_PREFIX, BOOKMARK_ID_LENGTH);
        for bookmark in &self.bookmarks {
            generator.register_id(bookmark.id.as_str());
        }

        let bookmark = Bookmark {
            id: generator.generate(&name)?,
            name,
            ts: self.next_ts(),
            rows_snapshot: Snapshot::capture(&self.rows),
        };
        info!(id = %bookmark.id, name = %bookmark.name, rows = bookmark.rows_snapshot.len(), "Added bookmark");
        self.bookmarks.push(bookmark.clone());
        Ok(bookmark)
    }

    /// Look up a bookmark by id.
    #[must_use]
    pub fn bookmark(&self, id: &str) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|b| b.id == id)
    }

    /// Replace the live rows with a bookmark's snapshot.
    ///
    /// Appends a `bookmark.restore` entry and returns its index. The
    /// bookmark itself is left in place.
    pub fn restore_bookmark(&mut self, id: &str) -> Outcome<usize> {
        let Some(bookmark) = self.bookmark(id) else {
            return Outcome::NoOp(NoOpReason::BookmarkNotFound(id.to_string()));
        };
        let rows = bookmark.rows_snapshot.to_rows();
        let label = format!("Restored bookmark '{}'", bookmark.name);

        self.rows = rows;
        let index = self.append_history(kind::BOOKMARK_RESTORE, label);
        info!(id, entry = index, "Restored bookmark");
        Outcome::Applied(index)
    }

    /// Remove a bookmark. History is not affected.
    pub fn delete_bookmark(&mut self, id: &str) -> Outcome<Bookmark> {
        match self.bookmarks.iter().position(|b| b.id == id) {
            Some(index) => {
                let removed = self.bookmarks.remove(index);
                info!(id, name = %removed.name, "Deleted bookmark");
                Outcome::Applied(removed)
            }
            None => Outcome::NoOp(NoOpReason::BookmarkNotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Row;
    use crate::validation::CommitPolicy;

    #[test]
    fn test_add_bookmark_captures_rows_without_history() {
        let mut store = Store::new();
        store.add_row(Row::new("a", "A"), &CommitPolicy::lenient()).unwrap();

        let bookmark = store.add_bookmark("Before refactor").unwrap();

        assert!(bookmark.id.starts_with("bm-"));
        assert_eq!(bookmark.id.len(), "bm-".len() + BOOKMARK_ID_LENGTH);
        assert_eq!(bookmark.name, "Before refactor");
        assert_eq!(bookmark.rows_snapshot.len(), 1);
        assert_eq!(store.bookmarks().len(), 1);
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_restore_bookmark_appends_entry_and_keeps_bookmark() {
        let mut store = Store::new();
        let policy = CommitPolicy::lenient();
        store.add_row(Row::new("a", "A"), &policy).unwrap();
        let bookmark = store.add_bookmark("one row").unwrap();
        store.add_row(Row::new("b", "B"), &policy).unwrap();

        let index = store.restore_bookmark(&bookmark.id).applied().unwrap();

        assert_eq!(index, 2);
        assert_eq!(store.rows().len(), 1);
        let entry = store.entry(index).unwrap();
        assert_eq!(entry.kind, kind::BOOKMARK_RESTORE);
        assert_eq!(entry.label, "Restored bookmark 'one row'");
        assert_eq!(store.bookmark(&bookmark.id), Some(&bookmark));
        assert!(store.is_at_latest());
    }

    #[test]
    fn test_unknown_bookmark_is_noop() {
        let mut store = Store::new();
        assert_eq!(
            store.restore_bookmark("bm-nope"),
            Outcome::NoOp(NoOpReason::BookmarkNotFound("bm-nope".to_string()))
        );
        assert!(store.delete_bookmark("bm-nope").is_noop());
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_delete_bookmark_leaves_history() {
        let mut store = Store::new();
        store.add_row(Row::new("a", "A"), &CommitPolicy::lenient()).unwrap();
        let first = store.add_bookmark("first").unwrap();
        let second = store.add_bookmark("second").unwrap();
        assert_ne!(first.id, second.id);

        let removed = store.delete_bookmark(&first.id).applied().unwrap();
        assert_eq!(removed.name, "first");
        assert_eq!(store.bookmarks(), &[second]);
        assert_eq!(store.history().len(), 1);
    }
}
