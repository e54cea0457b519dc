//! Playhead navigation, restore, diff and undo over the history log.
//!
//! The playhead is a view pointer: moving it never changes rows or history.
//! Restore and undo replace the live rows with a snapshot and then append a
//! new entry, so the log only ever grows.

use super::{kind, to_i64, Store};
use crate::domain::{HistoryEntry, Row, RowId, Snapshot};
use crate::error::{NoOpReason, Outcome};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A row present in both states whose compared fields differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedRow {
    /// Row id
    pub id: RowId,
    /// Names of the differing fields, in comparison order
    pub fields: Vec<&'static str>,
}

/// Difference between the live rows and a history snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowDiff {
    /// Present now, absent in the snapshot (live row order)
    pub added: Vec<RowId>,
    /// Absent now, present in the snapshot (snapshot order)
    pub removed: Vec<RowId>,
    /// Present in both with at least one changed field (live row order)
    pub modified: Vec<ModifiedRow>,
}

impl RowDiff {
    /// Whether the two states are equal in every compared field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Fields compared by [`Store::diff`]. `depends` and `sources` compare as
/// ordered sequences.
fn changed_fields(now: &Row, then: &Row) -> Vec<&'static str> {
    let checks = [
        ("name", now.name != then.name),
        ("args", now.args != then.args),
        ("expr", now.expr != then.expr),
        ("locked", now.locked != then.locked),
        ("depends", now.depends != then.depends),
        ("sources", now.sources != then.sources),
    ];
    checks
        .into_iter()
        .filter_map(|(field, differs)| differs.then_some(field))
        .collect()
}

fn diff_rows(live: &[Arc<Row>], snapshot: &Snapshot) -> RowDiff {
    let then: HashMap<&RowId, &Row> = snapshot
        .rows()
        .iter()
        .map(|r| (&r.id, Arc::as_ref(r)))
        .collect();
    let now: HashMap<&RowId, &Row> = live.iter().map(|r| (&r.id, Arc::as_ref(r))).collect();

    let mut diff = RowDiff::default();
    for row in live {
        match then.get(&row.id) {
            None => diff.added.push(row.id.clone()),
            Some(old) => {
                let fields = changed_fields(row, old);
                if !fields.is_empty() {
                    diff.modified.push(ModifiedRow {
                        id: row.id.clone(),
                        fields,
                    });
                }
            }
        }
    }
    diff.removed = snapshot
        .rows()
        .iter()
        .filter(|r| !now.contains_key(&r.id))
        .map(|r| r.id.clone())
        .collect();
    diff
}

impl Store {
    /// Raw persisted playhead value.
    #[must_use]
    pub fn playhead_index(&self) -> Option<i64> {
        self.playhead_index
    }

    /// The history index currently viewed, or `None` for an empty history.
    ///
    /// An unset playhead, `-1`, and any out-of-range value all resolve to
    /// the latest entry.
    #[must_use]
    pub fn playhead(&self) -> Option<usize> {
        let latest = self.history.len().checked_sub(1)?;
        let resolved = self
            .playhead_index
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i <= latest)
            .unwrap_or(latest);
        Some(resolved)
    }

    /// Whether the playhead shows the latest entry.
    #[must_use]
    pub fn is_at_latest(&self) -> bool {
        self.playhead() == self.history.len().checked_sub(1)
    }

    /// Move the playhead, clamping into `[-1, len - 1]`.
    ///
    /// Returns the resolved index now viewed.
    pub fn set_playhead(&mut self, index: i64) -> Outcome<usize> {
        let Some(latest) = self.history.len().checked_sub(1) else {
            return Outcome::NoOp(NoOpReason::EmptyHistory);
        };
        let clamped = index.clamp(-1, to_i64(latest));
        self.playhead_index = Some(clamped);
        debug!(requested = index, playhead = clamped, "Moved playhead");
        self.playhead().map_or(Outcome::NoOp(NoOpReason::EmptyHistory), Outcome::Applied)
    }

    /// Point the playhead back at the latest entry.
    pub fn clear_playhead(&mut self) -> Outcome<usize> {
        let len = to_i64(self.history.len());
        self.set_playhead(len - 1)
    }

    /// Step the playhead one entry back, stopping at 0.
    pub fn prev_entry(&mut self) -> Outcome<usize> {
        let Some(current) = self.playhead() else {
            return Outcome::NoOp(NoOpReason::EmptyHistory);
        };
        self.set_playhead(to_i64(current.saturating_sub(1)))
    }

    /// Step the playhead one entry forward, stopping at the latest entry.
    pub fn next_entry(&mut self) -> Outcome<usize> {
        let Some(current) = self.playhead() else {
            return Outcome::NoOp(NoOpReason::EmptyHistory);
        };
        self.set_playhead(to_i64(current + 1))
    }

    /// The history entry at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.history.get(index)
    }

    fn snapshot_at(&self, index: usize) -> Result<&Snapshot, NoOpReason> {
        let entry = self.history.get(index).ok_or(NoOpReason::IndexOutOfRange {
            index,
            len: self.history.len(),
        })?;
        entry
            .rows_snapshot
            .as_ref()
            .ok_or(NoOpReason::NoSnapshot(index))
    }

    /// Replace the rows with entry `index`'s snapshot, append a `kind`
    /// entry and point the playhead at `index`.
    fn restore_from(&mut self, index: usize, kind: &str) -> Outcome<usize> {
        let snapshot = match self.snapshot_at(index) {
            Ok(snapshot) => snapshot.clone(),
            Err(reason) => {
                debug!(index, %reason, "Restore skipped");
                return Outcome::NoOp(reason);
            }
        };
        let source_label = self.history[index].label.clone();

        self.rows = snapshot.to_rows();
        let appended = self.append_history(kind, format!("Restored #{index}: {source_label}"));
        self.playhead_index = Some(to_i64(index));

        info!(from = index, entry = appended, kind, "Restored history snapshot");
        Outcome::Applied(appended)
    }

    /// Restore the live rows to history entry `index`.
    ///
    /// Appends a `playhead.restore` entry holding the restored rows and
    /// leaves entry `index` untouched. Returns the index of the new entry.
    pub fn restore_to_index(&mut self, index: usize) -> Outcome<usize> {
        self.restore_from(index, kind::PLAYHEAD_RESTORE)
    }

    /// Restore the nearest earlier entry that carries a snapshot.
    ///
    /// The scan starts at the second-to-last entry. Without such an entry
    /// this is a no-op. There is no redo.
    pub fn undo(&mut self) -> Outcome<usize> {
        let len = self.history.len();
        if len < 2 {
            return Outcome::NoOp(NoOpReason::NothingToUndo);
        }
        let target = (0..len - 1)
            .rev()
            .find(|&i| self.history[i].rows_snapshot.is_some());

        match target {
            Some(index) => self.restore_from(index, kind::UNDO),
            None => Outcome::NoOp(NoOpReason::NothingToUndo),
        }
    }

    /// Compare the live rows against entry `index`'s snapshot.
    pub fn diff(&self, index: usize) -> Outcome<RowDiff> {
        match self.snapshot_at(index) {
            Ok(snapshot) => Outcome::Applied(diff_rows(&self.rows, snapshot)),
            Err(reason) => Outcome::NoOp(reason),
        }
    }

    /// Entries with exactly this kind tag, with their indices.
    #[must_use]
    pub fn history_by_kind(&self, kind: &str) -> Vec<(usize, &HistoryEntry)> {
        self.history
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.kind == kind)
            .collect()
    }

    /// Entries whose label or kind contains `text`, ignoring case.
    #[must_use]
    pub fn search_history(&self, text: &str) -> Vec<(usize, &HistoryEntry)> {
        let needle = text.to_lowercase();
        self.history
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry.label.to_lowercase().contains(&needle)
                    || entry.kind.to_lowercase().contains(&needle)
            })
            .collect()
    }
}
