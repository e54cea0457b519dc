//! The persisted row store and its append-only history.
//!
//! [`Store`] owns the live rows, the history log, the playhead, bookmarks and
//! the argument schema. Every row-mutating method appends exactly one
//! [`HistoryEntry`] carrying a [`Snapshot`] of the post-mutation rows; no
//! method ever edits or removes an entry once appended.
//!
//! ## Structural sharing
//!
//! Live rows are `Vec<Arc<Row>>`. A snapshot copies pointers only, and a
//! mutation replaces the touched row through [`Arc::make_mut`], so the rows
//! held by earlier snapshots are never written to.
//!
//! ## Submodules
//!
//! - `mutations`: add, update, delete, table save, bulk actions, import, rewrites
//! - `timeline`: playhead, restore, diff, undo and history queries
//! - `bookmarks`: named snapshots outside the timeline
//! - `load`: fail-soft decoding of persisted stores

mod bookmarks;
mod load;
mod mutations;
mod timeline;

pub use load::LoadWarning;
pub use mutations::{
    BulkAction, BulkSummary, ImportMode, ImportSummary, RewritePolicy, RewriteSummary, RowUpdate,
};
pub use timeline::{ModifiedRow, RowDiff};

use crate::domain::{
    Bookmark, HistoryEntry, Row, RowId, RowStatus, Schema, Snapshot, STORE_VERSION,
};
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::id_generation::IdGenerator;
use crate::validation::{speculative_validate, ValidationReport};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Status message written on rows that take part in a dependency cycle.
pub const CIRCULAR_STATUS_MESSAGE: &str = "Circular dependency";

/// History `kind` tags written by the store.
pub mod kind {
    /// A row was added
    pub const ROW_ADD: &str = "row.add";
    /// A row's fields were updated
    pub const ROW_UPDATE: &str = "row.update";
    /// A row was deleted
    pub const ROW_DELETE: &str = "row.delete";
    /// The whole table was saved
    pub const TABLE_SAVE: &str = "table.save";
    /// Rows were reordered
    pub const ROWS_REORDER: &str = "rows.reorder";
    /// A row was duplicated as a variant
    pub const ROW_DUPLICATE: &str = "row.duplicate";
    /// A row was pinned
    pub const ROW_PIN: &str = "row.pin";
    /// A row was unpinned
    pub const ROW_UNPIN: &str = "row.unpin";
    /// Rows were imported
    pub const IMPORT: &str = "import";
    /// Rows were rewritten by an automated pass
    pub const ROWS_REWRITE: &str = "rows.rewrite";
    /// A bookmark was restored
    pub const BOOKMARK_RESTORE: &str = "bookmark.restore";
    /// A history entry was restored
    pub const PLAYHEAD_RESTORE: &str = "playhead.restore";
    /// An earlier state was restored by undo
    pub const UNDO: &str = "undo";
}

/// The persisted aggregate: rows, history, playhead, bookmarks and schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    version: u64,
    rows: Vec<Arc<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    playhead_index: Option<i64>,
    history: Vec<HistoryEntry>,
    bookmarks: Vec<Bookmark>,
    #[serde(skip_serializing_if = "Schema::is_empty")]
    schema: Schema,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store: no rows, no history, playhead at "latest".
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            rows: Vec::new(),
            playhead_index: None,
            history: Vec::new(),
            bookmarks: Vec::new(),
            schema: Schema::new(),
        }
    }

    /// Create a store holding `rows` with an empty history.
    ///
    /// Rows are taken as-is; use [`Store::import_rows`] for validated input.
    #[must_use]
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter().map(Arc::new).collect(),
            ..Self::new()
        }
    }

    /// Persisted format version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Live rows in order.
    #[must_use]
    pub fn rows(&self) -> &[Arc<Row>] {
        &self.rows
    }

    /// Look up a live row by id.
    #[must_use]
    pub fn row(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id).map(Arc::as_ref)
    }

    /// Whether a live row with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// The append-only history log.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Bookmarks in insertion order.
    #[must_use]
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    /// Argument schemas keyed by row id.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Replace the argument schema. Schema edits are not recorded in history.
    pub fn set_schema(&mut self, schema: Schema) {
        self.schema = schema;
    }

    /// Build the dependency graph of the live rows.
    #[must_use]
    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::build(&self.rows)
    }

    /// Validate the live rows against the store's schema.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        speculative_validate(&self.rows, Some(&self.schema))
    }

    /// Validate a candidate row set against the store's schema without applying it.
    #[must_use]
    pub fn validate_candidate<R: AsRef<Row>>(&self, candidate: &[R]) -> ValidationReport {
        speculative_validate(candidate, Some(&self.schema))
    }

    /// Generate an unused row id of the form `{prefix}-xxxx`.
    ///
    /// # Errors
    ///
    /// Returns an error if no unique id could be generated.
    pub fn generate_row_id(&self, prefix: &str, seed: &str) -> Result<RowId> {
        let mut generator = IdGenerator::new(prefix, 4);
        for row in &self.rows {
            generator.register_id(row.id.as_str());
        }
        Ok(RowId::new(generator.generate(seed)?))
    }

    /// Encode as pretty-printed JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    /// Next history timestamp: wall-clock millis, never earlier than the last entry.
    pub(crate) fn next_ts(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.history.last().map_or(now, |last| now.max(last.ts))
    }

    /// Refresh cycle markers, then append a history entry for the current rows.
    pub(crate) fn record(&mut self, kind: &str, label: impl Into<String>) -> usize {
        self.refresh_cycle_status();
        self.append_history(kind, label)
    }

    /// Append a history entry snapshotting the current rows; the playhead moves to it.
    pub(crate) fn append_history(&mut self, kind: &str, label: impl Into<String>) -> usize {
        let entry = HistoryEntry {
            ts: self.next_ts(),
            kind: kind.to_string(),
            label: label.into(),
            rows_snapshot: Some(Snapshot::capture(&self.rows)),
        };
        self.history.push(entry);
        let index = self.history.len() - 1;
        self.playhead_index = Some(to_i64(index));

        info!(kind, index, rows = self.rows.len(), "Appended history entry");
        index
    }

    /// Mark rows on a cycle with an error status and clear stale markers.
    ///
    /// Only rows whose status actually changes are copied.
    pub(crate) fn refresh_cycle_status(&mut self) {
        let in_cycle: HashSet<RowId> = self.graph().rows_in_cycles().into_iter().collect();

        for row in &mut self.rows {
            let marked = row.status == Some(RowStatus::Error)
                && row.status_message.as_deref() == Some(CIRCULAR_STATUS_MESSAGE);

            if in_cycle.contains(&row.id) && !marked {
                debug!(row_id = %row.id, "Marking row as part of a dependency cycle");
                let row = Arc::make_mut(row);
                row.status = Some(RowStatus::Error);
                row.status_message = Some(CIRCULAR_STATUS_MESSAGE.to_string());
            } else if !in_cycle.contains(&row.id) && marked {
                debug!(row_id = %row.id, "Clearing cycle marker");
                let row = Arc::make_mut(row);
                row.status = None;
                row.status_message = None;
            }
        }
    }
}

pub(crate) fn to_i64(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        let store = Store::new();
        assert_eq!(store.version(), 1);
        assert!(store.rows().is_empty());
        assert!(store.history().is_empty());
        assert!(store.bookmarks().is_empty());
        assert_eq!(store.playhead(), None);
    }

    #[test]
    fn test_serializes_persisted_shape() {
        let store = Store::with_rows(vec![Row::new("a", "A")]);
        let value = serde_json::to_value(&store).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["rows"][0]["id"], "a");
        assert!(value.get("playheadIndex").is_none());
        assert!(value.get("schema").is_none());
        assert_eq!(value["history"], serde_json::json!([]));
    }

    #[test]
    fn test_to_json_string_ends_with_newline() {
        let json = Store::new().to_json_string().unwrap();
        assert!(json.ends_with("}\n"));
    }

    #[test]
    fn test_refresh_marks_and_clears_cycle_status() {
        let mut store = Store::with_rows(vec![
            Row::new("a", "A").with_depends(["b"]),
            Row::new("b", "B").with_depends(["a"]),
            Row::new("c", "C"),
        ]);

        store.refresh_cycle_status();
        assert_eq!(store.row("a").unwrap().status, Some(RowStatus::Error));
        assert_eq!(
            store.row("b").unwrap().status_message.as_deref(),
            Some(CIRCULAR_STATUS_MESSAGE)
        );
        assert_eq!(store.row("c").unwrap().status, None);

        Arc::make_mut(&mut store.rows[1]).depends.clear();
        store.refresh_cycle_status();
        assert_eq!(store.row("a").unwrap().status, None);
        assert_eq!(store.row("b").unwrap().status_message, None);
    }

    #[test]
    fn test_refresh_keeps_foreign_error_status() {
        let mut row = Row::new("a", "A");
        row.status = Some(RowStatus::Error);
        row.status_message = Some("Compile failed".to_string());
        let mut store = Store::with_rows(vec![row]);

        store.refresh_cycle_status();
        assert_eq!(
            store.row("a").unwrap().status_message.as_deref(),
            Some("Compile failed")
        );
    }

    #[test]
    fn test_history_timestamps_never_decrease() {
        let mut store = Store::new();
        store.history.push(HistoryEntry {
            ts: i64::MAX - 1,
            kind: "future".to_string(),
            label: String::new(),
            rows_snapshot: None,
        });

        store.append_history(kind::TABLE_SAVE, "save");
        assert_eq!(store.history()[1].ts, i64::MAX - 1);
    }

    #[test]
    fn test_generate_row_id_avoids_existing() {
        let store = Store::with_rows(vec![Row::new("td-aaaa", "A")]);
        let id = store.generate_row_id("td", "New row").unwrap();
        assert!(id.as_str().starts_with("td-"));
        assert!(!store.contains(id.as_str()));
    }
}
