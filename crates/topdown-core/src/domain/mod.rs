//! Domain types for configuration rows.
//!
//! This module contains the record types shared by every subsystem: the
//! [`Row`] itself, history entries, bookmarks, per-row argument schemas and
//! the [`Snapshot`] type that backs both history and bookmarks.

mod serde_helpers;

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Persisted store format version understood by this crate.
pub const STORE_VERSION: u64 = 1;

/// Unique identifier for a row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub String);

impl RowId {
    /// Create a new row ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for RowId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RowId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for RowId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RowId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Externally computed row health, carried as payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    /// No known problems
    Ok,
    /// Advisory diagnostics
    Warning,
    /// Failing diagnostics or a dependency cycle
    Error,
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single configuration row.
///
/// Decoding is lenient: `null` text fields become empty strings, and
/// `depends`/`sources` may be given as a comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Unique, user-chosen identifier
    pub id: RowId,

    /// Automated subsystems must not rewrite code-facing fields of a locked row
    #[serde(default, deserialize_with = "serde_helpers::null_as_default")]
    pub locked: bool,

    /// Display name
    #[serde(default, deserialize_with = "serde_helpers::null_as_default")]
    pub name: String,

    /// Argument string, checked by the validation engine
    #[serde(default, deserialize_with = "serde_helpers::null_as_default")]
    pub args: String,

    /// Expression or value
    #[serde(default, deserialize_with = "serde_helpers::null_as_default")]
    pub expr: String,

    /// Optional free-form scope label (e.g. a source location)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Ids this row depends on, in declaration order
    #[serde(
        default,
        deserialize_with = "serde_helpers::list_or_csv",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub depends: Vec<RowId>,

    /// File globs consumed by the file-watch collaborator
    #[serde(
        default,
        deserialize_with = "serde_helpers::list_or_csv",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub sources: Vec<String>,

    /// Externally computed status
    #[serde(
        default,
        deserialize_with = "serde_helpers::lenient_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<RowStatus>,

    /// Message accompanying `status`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,

    /// Pinned rows are shown first by editors
    #[serde(
        default,
        deserialize_with = "serde_helpers::null_as_default",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub pinned: bool,

    /// Free-form notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Row {
    /// Create an unlocked row with the given id and name and no other content.
    pub fn new(id: impl Into<RowId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locked: false,
            name: name.into(),
            args: String::new(),
            expr: String::new(),
            scope: None,
            depends: Vec::new(),
            sources: Vec::new(),
            status: None,
            status_message: None,
            pinned: false,
            notes: None,
        }
    }

    /// Builder-style helper replacing `depends`.
    #[must_use]
    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RowId>,
    {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style helper replacing `args`.
    #[must_use]
    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }

    /// Builder-style helper setting `locked`.
    #[must_use]
    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Whether the code-facing fields (`name`, `args`, `expr`, `depends`) differ.
    #[must_use]
    pub fn code_fields_differ(&self, other: &Row) -> bool {
        self.name != other.name
            || self.args != other.args
            || self.expr != other.expr
            || self.depends != other.depends
    }
}

impl AsRef<Row> for Row {
    fn as_ref(&self) -> &Row {
        self
    }
}

/// An immutable, fully materialised copy of a row set.
///
/// Rows are shared by pointer with the live row set and with other
/// snapshots; a row is only copied when it is later mutated through
/// [`Arc::make_mut`]. Cloning a snapshot is O(1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Arc<[Arc<Row>]>);

impl Snapshot {
    /// Capture the given rows.
    #[must_use]
    pub fn capture(rows: &[Arc<Row>]) -> Self {
        Self(rows.iter().cloned().collect())
    }

    /// Rows contained in the snapshot, in order.
    #[must_use]
    pub fn rows(&self) -> &[Arc<Row>] {
        &self.0
    }

    /// Copy the snapshot into a new live row vector (pointer copies only).
    #[must_use]
    pub fn to_rows(&self) -> Vec<Arc<Row>> {
        self.0.to_vec()
    }

    /// Number of rows in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Row>> for Snapshot {
    fn from(rows: Vec<Row>) -> Self {
        Self(rows.into_iter().map(Arc::new).collect())
    }
}

/// One append-only history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Wall-clock timestamp in milliseconds, non-decreasing along the log
    pub ts: i64,

    /// Machine-readable tag such as `table.save` or `undo`
    pub kind: String,

    /// Human-readable description
    pub label: String,

    /// Post-mutation rows; absent on lightweight or unusable entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_snapshot: Option<Snapshot>,
}

/// A named snapshot pointer outside the linear history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    /// Generated identifier
    pub id: String,

    /// User-supplied name
    pub name: String,

    /// Creation timestamp in milliseconds
    pub ts: i64,

    /// Rows at the time the bookmark was taken
    pub rows_snapshot: Snapshot,
}

/// How a row's `args` string is interpreted by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgsType {
    /// Command-line style flags
    Flags,
    /// `key=value` pairs
    #[serde(rename = "keyvalue")]
    KeyValue,
    /// A JSON document
    Json,
    /// Unchecked text
    Free,
}

/// Per-row argument rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgsSchema {
    /// Regular expression the whole `args` string should match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_pattern: Option<String>,

    /// Expected shape of `args`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_type: Option<ArgsType>,

    /// Tokens that should appear in `args`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_args: Vec<String>,
}

/// Argument schemas keyed by row id.
pub type Schema = BTreeMap<String, ArgsSchema>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_id_as_ref_str() {
        fn joined<T: AsRef<str>>(ids: &[T]) -> String {
            ids.iter().map(AsRef::<str>::as_ref).collect::<Vec<_>>().join(",")
        }
        assert_eq!(joined(&[RowId::new("a"), RowId::new("b")]), "a,b");
    }

    #[test]
    fn test_row_decodes_with_defaults() {
        let row: Row = serde_json::from_value(json!({"id": "a"})).unwrap();
        assert_eq!(row, Row::new("a", ""));
    }

    #[test]
    fn test_row_decodes_nulls_and_csv_lists() {
        let row: Row = serde_json::from_value(json!({
            "id": "a",
            "name": null,
            "locked": null,
            "depends": "b, c,,",
            "sources": "src/**/*.rs",
            "status": "mystery"
        }))
        .unwrap();

        assert_eq!(row.name, "");
        assert!(!row.locked);
        assert_eq!(row.depends, vec![RowId::new("b"), RowId::new("c")]);
        assert_eq!(row.sources, vec!["src/**/*.rs".to_string()]);
        assert_eq!(row.status, None);
    }

    #[test]
    fn test_row_serializes_camel_case_and_skips_empty() {
        let mut row = Row::new("a", "Alpha");
        row.status = Some(RowStatus::Error);
        row.status_message = Some("boom".to_string());

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "a",
                "locked": false,
                "name": "Alpha",
                "args": "",
                "expr": "",
                "status": "error",
                "statusMessage": "boom"
            })
        );
    }

    #[test]
    fn test_row_rejects_non_string_id() {
        let result: Result<Row, _> = serde_json::from_value(json!({"id": 7}));
        assert!(result.is_err());
    }

    #[test]
    fn test_snapshot_shares_rows() {
        let rows = vec![Arc::new(Row::new("a", "A"))];
        let snapshot = Snapshot::capture(&rows);

        assert!(Arc::ptr_eq(&rows[0], &snapshot.rows()[0]));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_code_fields_differ_ignores_metadata() {
        let a = Row::new("a", "A");
        let mut b = a.clone();
        b.pinned = true;
        b.notes = Some("note".to_string());
        assert!(!a.code_fields_differ(&b));

        b.args = "--x".to_string();
        assert!(a.code_fields_differ(&b));
    }

    #[test]
    fn test_args_schema_decodes() {
        let schema: ArgsSchema = serde_json::from_value(json!({
            "argsPattern": "^--",
            "argsType": "keyvalue",
            "requiredArgs": ["--port"]
        }))
        .unwrap();

        assert_eq!(schema.args_type, Some(ArgsType::KeyValue));
        assert_eq!(schema.required_args, vec!["--port".to_string()]);
    }
}
