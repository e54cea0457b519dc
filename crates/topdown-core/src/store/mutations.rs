//! Row-mutating store operations.
//!
//! Every successful mutation appends one history entry. Explicit edits
//! (`add_row`, `update_row`, `delete_row`, `save_table`) run the lock guard
//! and the commit policy against the candidate row set before anything is
//! applied, so a rejected edit leaves the store untouched. Automated paths
//! (`bulk_action`, `import_rows`, `rewrite_rows`) never rewrite a locked
//! row's code-facing fields; they skip it or fork a variant instead.

use super::{kind, Store};
use crate::domain::{Row, RowId, RowStatus};
use crate::error::{Error, Result};
use crate::id_generation::{is_valid_id, next_variant_id};
use crate::validation::{CommitPolicy, ValidationReport};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Partial update of a row; `None` leaves a field unchanged.
///
/// Optional fields use `Option<Option<_>>`: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowUpdate {
    /// New name
    pub name: Option<String>,
    /// New argument string
    pub args: Option<String>,
    /// New expression
    pub expr: Option<String>,
    /// New scope, `Some(None)` to clear
    pub scope: Option<Option<String>>,
    /// New dependency list
    pub depends: Option<Vec<RowId>>,
    /// New source globs
    pub sources: Option<Vec<String>>,
    /// Lock or unlock
    pub locked: Option<bool>,
    /// Pin or unpin
    pub pinned: Option<bool>,
    /// New notes, `Some(None)` to clear
    pub notes: Option<Option<String>>,
    /// New status, `Some(None)` to clear
    pub status: Option<Option<RowStatus>>,
    /// New status message, `Some(None)` to clear
    pub status_message: Option<Option<String>>,
}

impl RowUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply_to(&self, row: &mut Row) {
        if let Some(name) = &self.name {
            row.name.clone_from(name);
        }
        if let Some(args) = &self.args {
            row.args.clone_from(args);
        }
        if let Some(expr) = &self.expr {
            row.expr.clone_from(expr);
        }
        if let Some(scope) = &self.scope {
            row.scope.clone_from(scope);
        }
        if let Some(depends) = &self.depends {
            row.depends.clone_from(depends);
        }
        if let Some(sources) = &self.sources {
            row.sources.clone_from(sources);
        }
        if let Some(locked) = self.locked {
            row.locked = locked;
        }
        if let Some(pinned) = self.pinned {
            row.pinned = pinned;
        }
        if let Some(notes) = &self.notes {
            row.notes.clone_from(notes);
        }
        if let Some(status) = self.status {
            row.status = status;
        }
        if let Some(message) = &self.status_message {
            row.status_message.clone_from(message);
        }
    }
}

/// An action applied to a selection of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkAction {
    /// Delete the rows
    Delete,
    /// Lock the rows
    Lock,
    /// Unlock the rows
    Unlock,
    /// Pin the rows
    Pin,
    /// Unpin the rows
    Unpin,
    /// Set or clear the scope label
    SetScope(Option<String>),
}

impl BulkAction {
    /// History kind tag for this action.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delete => "bulk.delete",
            Self::Lock => "bulk.lock",
            Self::Unlock => "bulk.unlock",
            Self::Pin => "bulk.pin",
            Self::Unpin => "bulk.unpin",
            Self::SetScope(_) => "bulk.scope",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Delete => "Deleted",
            Self::Lock => "Locked",
            Self::Unlock => "Unlocked",
            Self::Pin => "Pinned",
            Self::Unpin => "Unpinned",
            Self::SetScope(_) => "Re-scoped",
        }
    }

    /// Whether locked rows are left alone by this action.
    fn skips_locked(&self) -> bool {
        matches!(self, Self::Delete | Self::SetScope(_))
    }

    /// Apply to one row; returns whether anything changed.
    fn apply(&self, row: &mut Arc<Row>) -> bool {
        let changed = match self {
            Self::Delete => return false,
            Self::Lock => !row.locked,
            Self::Unlock => row.locked,
            Self::Pin => !row.pinned,
            Self::Unpin => row.pinned,
            Self::SetScope(scope) => row.scope != *scope,
        };
        if changed {
            let row = Arc::make_mut(row);
            match self {
                Self::Lock => row.locked = true,
                Self::Unlock => row.locked = false,
                Self::Pin => row.pinned = true,
                Self::Unpin => row.pinned = false,
                Self::SetScope(scope) => row.scope.clone_from(scope),
                Self::Delete => {}
            }
        }
        changed
    }
}

/// What a bulk action did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSummary {
    /// Rows the action was applied to
    pub applied: Vec<RowId>,
    /// Locked rows left untouched
    pub skipped_locked: Vec<RowId>,
    /// Requested ids that matched no row
    pub not_found: Vec<RowId>,
    /// Index of the appended history entry, if anything changed
    pub history_index: Option<usize>,
}

/// How imported rows combine with the live rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Update rows with matching ids and append new ones
    #[default]
    Merge,
    /// Replace the row set; locked rows survive unchanged
    Replace,
}

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Ids that did not exist before
    pub added: Vec<RowId>,
    /// Existing ids whose content changed
    pub updated: Vec<RowId>,
    /// Locked rows left untouched
    pub skipped_locked: Vec<RowId>,
    /// Incoming ids rejected as invalid or repeated
    pub rejected: Vec<String>,
    /// Index of the appended history entry
    pub history_index: usize,
}

/// What an automated rewrite does with a locked row it wants to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewritePolicy {
    /// Leave the locked row alone
    #[default]
    Skip,
    /// Keep the locked row and insert a rewritten, unlocked variant after it
    Fork,
}

/// What an automated rewrite did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteSummary {
    /// Rows rewritten in place
    pub rewritten: Vec<RowId>,
    /// Locked rows skipped
    pub skipped_locked: Vec<RowId>,
    /// `(locked row, new variant)` pairs
    pub forked: Vec<(RowId, RowId)>,
    /// Index of the appended history entry, if anything changed
    pub history_index: Option<usize>,
}

fn check_new_ids<'a>(rows: impl IntoIterator<Item = &'a Row>) -> Result<()> {
    let mut seen = HashSet::new();
    for row in rows {
        if !is_valid_id(row.id.as_str()) {
            return Err(Error::InvalidId(row.id.to_string()));
        }
        if !seen.insert(&row.id) {
            return Err(Error::DuplicateId(row.id.clone()));
        }
    }
    Ok(())
}

impl Store {
    /// Refuse candidates that rewrite or drop a row that is locked now.
    ///
    /// A candidate that also sets `locked = false` on the row is allowed.
    fn check_locks(&self, candidate: &[Arc<Row>], operation: &'static str) -> Result<()> {
        let by_id: HashMap<&RowId, &Row> = candidate.iter().map(|r| (&r.id, Arc::as_ref(r))).collect();

        for current in self.rows.iter().filter(|r| r.locked) {
            let allowed = match by_id.get(&current.id) {
                None => false,
                Some(next) => !next.locked || !current.code_fields_differ(next),
            };
            if !allowed {
                warn!(row_id = %current.id, operation, "Refusing to modify locked row");
                return Err(Error::RowLocked {
                    id: current.id.clone(),
                    operation,
                });
            }
        }
        Ok(())
    }

    /// Lock guard plus commit policy for a candidate row set.
    fn check_commit(
        &self,
        candidate: &[Arc<Row>],
        policy: &CommitPolicy,
        operation: &'static str,
    ) -> Result<ValidationReport> {
        if policy.enforce_locks {
            self.check_locks(candidate, operation)?;
        }
        let report = self.validate_candidate(candidate);
        if report.blocks(policy) {
            warn!(operation, summary = %report.summary(), "Commit rejected by policy");
            return Err(Error::CommitRejected(Box::new(report)));
        }
        Ok(report)
    }

    fn require_position(&self, id: &str) -> Result<usize> {
        self.position(id)
            .ok_or_else(|| Error::RowNotFound(RowId::new(id)))
    }

    /// Append a new row.
    ///
    /// # Errors
    ///
    /// Fails on an invalid or duplicate id, or when `policy` rejects the result.
    pub fn add_row(&mut self, row: Row, policy: &CommitPolicy) -> Result<ValidationReport> {
        if !is_valid_id(row.id.as_str()) {
            return Err(Error::InvalidId(row.id.to_string()));
        }
        if self.contains(row.id.as_str()) {
            return Err(Error::DuplicateId(row.id));
        }

        let id = row.id.clone();
        let mut candidate = self.rows.clone();
        candidate.push(Arc::new(row));
        let report = self.check_commit(&candidate, policy, "adding rows")?;

        self.rows = candidate;
        self.record(kind::ROW_ADD, format!("Added row {id}"));
        Ok(report)
    }

    /// Apply a partial update to one row.
    ///
    /// # Errors
    ///
    /// Fails when the row does not exist, when it is locked and the update
    /// touches a code-facing field without unlocking it, or when `policy`
    /// rejects the result.
    pub fn update_row(
        &mut self,
        id: &str,
        update: &RowUpdate,
        policy: &CommitPolicy,
    ) -> Result<ValidationReport> {
        let index = self.require_position(id)?;

        let mut candidate = self.rows.clone();
        update.apply_to(Arc::make_mut(&mut candidate[index]));
        let report = self.check_commit(&candidate, policy, "updating it")?;

        self.rows = candidate;
        self.record(kind::ROW_UPDATE, format!("Updated row {id}"));
        Ok(report)
    }

    /// Remove one row.
    ///
    /// # Errors
    ///
    /// Fails when the row does not exist or is locked, or when `policy`
    /// rejects the result (for example a now-dangling dependency under a
    /// structural policy).
    pub fn delete_row(&mut self, id: &str, policy: &CommitPolicy) -> Result<ValidationReport> {
        let index = self.require_position(id)?;

        let mut candidate = self.rows.clone();
        candidate.remove(index);
        let report = self.check_commit(&candidate, policy, "deleting it")?;

        self.rows = candidate;
        self.record(kind::ROW_DELETE, format!("Deleted row {id}"));
        Ok(report)
    }

    /// Replace the whole row set with an edited table.
    ///
    /// Unchanged rows keep sharing storage with earlier snapshots. The
    /// returned report lists non-blocking findings.
    ///
    /// # Errors
    ///
    /// Fails on invalid or repeated ids, on edits to locked rows when the
    /// policy enforces locks, or when `policy` rejects the candidate.
    pub fn save_table(
        &mut self,
        candidate: Vec<Row>,
        label: impl Into<String>,
        policy: &CommitPolicy,
    ) -> Result<ValidationReport> {
        check_new_ids(&candidate)?;

        let existing: HashMap<&RowId, &Arc<Row>> =
            self.rows.iter().map(|r| (&r.id, r)).collect();
        let candidate: Vec<Arc<Row>> = candidate
            .into_iter()
            .map(|row| match existing.get(&row.id) {
                Some(current) if ***current == row => Arc::clone(current),
                _ => Arc::new(row),
            })
            .collect();
        let report = self.check_commit(&candidate, policy, "saving the table")?;

        self.rows = candidate;
        self.record(kind::TABLE_SAVE, label);
        Ok(report)
    }

    /// Apply `action` to every row in `ids`.
    ///
    /// Delete and scope changes skip locked rows. No history entry is
    /// appended when nothing changed.
    pub fn bulk_action(&mut self, ids: &[RowId], action: &BulkAction) -> BulkSummary {
        let wanted: HashSet<&RowId> = ids.iter().collect();
        let mut reported = HashSet::new();
        let mut summary = BulkSummary {
            not_found: ids
                .iter()
                .filter(|id| !self.contains(id.as_str()) && reported.insert(*id))
                .cloned()
                .collect(),
            ..BulkSummary::default()
        };

        let skips_locked = action.skips_locked();
        let mut kept = Vec::with_capacity(self.rows.len());
        for mut row in std::mem::take(&mut self.rows) {
            if !wanted.contains(&row.id) {
                kept.push(row);
                continue;
            }
            if skips_locked && row.locked {
                info!(row_id = %row.id, action = action.kind(), "Skipping locked row");
                summary.skipped_locked.push(row.id.clone());
                kept.push(row);
                continue;
            }
            match action {
                BulkAction::Delete => summary.applied.push(row.id.clone()),
                _ => {
                    if action.apply(&mut row) {
                        summary.applied.push(row.id.clone());
                    }
                    kept.push(row);
                }
            }
        }
        self.rows = kept;

        if !summary.applied.is_empty() {
            let label = format!("{} {} row(s)", action.verb(), summary.applied.len());
            summary.history_index = Some(self.record(action.kind(), label));
        }
        summary
    }

    /// Move the listed rows to the front, in the given order.
    ///
    /// Unlisted rows follow in their current relative order; repeated ids
    /// are taken once.
    ///
    /// # Errors
    ///
    /// Fails if any listed id does not exist.
    pub fn reorder_rows(&mut self, order: &[RowId]) -> Result<usize> {
        let mut placed: HashSet<&RowId> = HashSet::with_capacity(order.len());
        let mut reordered = Vec::with_capacity(self.rows.len());

        for id in order {
            let index = self.require_position(id.as_str())?;
            if placed.insert(id) {
                reordered.push(Arc::clone(&self.rows[index]));
            }
        }
        reordered.extend(
            self.rows
                .iter()
                .filter(|r| !placed.contains(&r.id))
                .cloned(),
        );

        self.rows = reordered;
        Ok(self.record(kind::ROWS_REORDER, format!("Reordered {} row(s)", order.len())))
    }

    /// Copy a row under a fresh `-N` id, inserted right after the source.
    ///
    /// The variant is unlocked, unpinned and has no status.
    ///
    /// # Errors
    ///
    /// Fails if the source row does not exist.
    pub fn duplicate_as_variant(&mut self, id: &str) -> Result<RowId> {
        let index = self.require_position(id)?;
        let variant_id = RowId::new(next_variant_id(
            id,
            self.rows.iter().map(|r| r.id.as_str()),
        ));

        let mut variant = Row::clone(&self.rows[index]);
        variant.id = variant_id.clone();
        variant.locked = false;
        variant.pinned = false;
        variant.status = None;
        variant.status_message = None;

        self.rows.insert(index + 1, Arc::new(variant));
        self.record(
            kind::ROW_DUPLICATE,
            format!("Duplicated {id} as {variant_id}"),
        );
        Ok(variant_id)
    }

    /// Pin or unpin one row.
    ///
    /// # Errors
    ///
    /// Fails if the row does not exist.
    pub fn set_pinned(&mut self, id: &str, pinned: bool) -> Result<usize> {
        let index = self.require_position(id)?;
        if self.rows[index].pinned != pinned {
            Arc::make_mut(&mut self.rows[index]).pinned = pinned;
        }
        let (tag, verb) = if pinned {
            (kind::ROW_PIN, "Pinned")
        } else {
            (kind::ROW_UNPIN, "Unpinned")
        };
        Ok(self.record(tag, format!("{verb} row {id}")))
    }

    /// Import rows from an external source.
    ///
    /// Incoming rows with an invalid id, or an id already seen in the same
    /// batch, are rejected. Locked rows are never changed by an import.
    pub fn import_rows(&mut self, incoming: Vec<Row>, mode: ImportMode) -> ImportSummary {
        let mut summary = ImportSummary::default();
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(incoming.len());
        for row in incoming {
            if !is_valid_id(row.id.as_str()) || !seen.insert(row.id.clone()) {
                summary.rejected.push(row.id.to_string());
                continue;
            }
            accepted.push(row);
        }

        let existing: HashMap<RowId, Arc<Row>> = self
            .rows
            .iter()
            .map(|r| (r.id.clone(), Arc::clone(r)))
            .collect();

        // Resolve each accepted row against the current one with the same id.
        let mut resolved: Vec<Arc<Row>> = Vec::with_capacity(accepted.len());
        for row in accepted {
            match existing.get(&row.id) {
                None => {
                    summary.added.push(row.id.clone());
                    resolved.push(Arc::new(row));
                }
                Some(current) if **current == row => resolved.push(Arc::clone(current)),
                Some(current) if current.locked => {
                    info!(row_id = %row.id, "Import left locked row unchanged");
                    summary.skipped_locked.push(row.id.clone());
                    resolved.push(Arc::clone(current));
                }
                Some(_) => {
                    summary.updated.push(row.id.clone());
                    resolved.push(Arc::new(row));
                }
            }
        }

        self.rows = match mode {
            ImportMode::Merge => {
                let mut by_id: HashMap<RowId, Arc<Row>> =
                    resolved.iter().map(|r| (r.id.clone(), Arc::clone(r))).collect();
                let mut merged: Vec<Arc<Row>> = self
                    .rows
                    .iter()
                    .map(|r| by_id.remove(&r.id).unwrap_or_else(|| Arc::clone(r)))
                    .collect();
                merged.extend(resolved.into_iter().filter(|r| by_id.contains_key(&r.id)));
                merged
            }
            ImportMode::Replace => {
                let incoming_ids: HashSet<RowId> = resolved.iter().map(|r| r.id.clone()).collect();
                for survivor in self
                    .rows
                    .iter()
                    .filter(|r| r.locked && !incoming_ids.contains(&r.id))
                {
                    info!(row_id = %survivor.id, "Replace import kept locked row");
                    summary.skipped_locked.push(survivor.id.clone());
                    resolved.push(Arc::clone(survivor));
                }
                resolved
            }
        };

        let label = format!(
            "Imported {} row(s) ({} added, {} updated)",
            summary.added.len() + summary.updated.len(),
            summary.added.len(),
            summary.updated.len()
        );
        summary.history_index = self.record(kind::IMPORT, label);
        summary
    }

    /// Run an automated rewrite over every row.
    ///
    /// `rewrite` returns the new content for rows it wants to change (the
    /// id is always kept). Locked rows whose code-facing fields would change
    /// are handled per `policy`. No history entry is appended when nothing
    /// changed.
    pub fn rewrite_rows<F>(
        &mut self,
        policy: RewritePolicy,
        label: impl Into<String>,
        mut rewrite: F,
    ) -> RewriteSummary
    where
        F: FnMut(&Row) -> Option<Row>,
    {
        let mut summary = RewriteSummary::default();
        let mut ids: Vec<String> = self.rows.iter().map(|r| r.id.to_string()).collect();
        let mut next = Vec::with_capacity(self.rows.len());

        for row in &self.rows {
            let Some(mut rewritten) = rewrite(row) else {
                next.push(Arc::clone(row));
                continue;
            };
            rewritten.id = row.id.clone();
            if rewritten == **row {
                next.push(Arc::clone(row));
                continue;
            }

            if row.locked && row.code_fields_differ(&rewritten) {
                next.push(Arc::clone(row));
                match policy {
                    RewritePolicy::Skip => {
                        info!(row_id = %row.id, "Rewrite skipped locked row");
                        summary.skipped_locked.push(row.id.clone());
                    }
                    RewritePolicy::Fork => {
                        let variant_id = next_variant_id(row.id.as_str(), &ids);
                        ids.push(variant_id.clone());
                        rewritten.id = RowId::new(variant_id);
                        rewritten.locked = false;
                        info!(row_id = %row.id, variant = %rewritten.id, "Rewrite forked locked row");
                        summary.forked.push((row.id.clone(), rewritten.id.clone()));
                        next.push(Arc::new(rewritten));
                    }
                }
                continue;
            }

            summary.rewritten.push(row.id.clone());
            next.push(Arc::new(rewritten));
        }

        if summary.rewritten.is_empty() && summary.forked.is_empty() {
            return summary;
        }
        self.rows = next;
        summary.history_index = Some(self.record(kind::ROWS_REWRITE, label));
        summary
    }
}
