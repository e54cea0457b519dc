//! Fail-soft decoding of persisted stores.
//!
//! Decoding never fails. A document that is not a version-1 store with a
//! `rows` array becomes an empty store; individual records that cannot be
//! used are dropped (rows, bookmarks, schema entries) or degraded (history
//! entries keep their position with no snapshot). Every such decision is
//! reported as a [`LoadWarning`].

use super::Store;
use crate::domain::{ArgsSchema, Bookmark, HistoryEntry, Row, RowId, Schema, Snapshot, STORE_VERSION};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Non-fatal problems found while decoding a persisted store.
///
/// The affected data is skipped or sanitized; the rest of the store loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// The document is not valid JSON. The store loads empty.
    MalformedJson(String),

    /// The document is not a JSON object. The store loads empty.
    NotAnObject,

    /// `version` is missing or not 1. The store loads empty.
    UnsupportedVersion(String),

    /// There is no `rows` array. The store loads empty.
    MissingRows,

    /// A row lacks a string id or has a field of the wrong type; it is dropped.
    InvalidRow {
        /// Where the row was found, e.g. `rows` or `history[3]`
        location: String,
        /// Position within that row list
        index: usize,
        /// Decoder message
        error: String,
    },

    /// A row repeats an earlier id in the same list; the later one is dropped.
    DuplicateRow {
        /// Where the row was found
        location: String,
        /// Position within that row list
        index: usize,
        /// The repeated id
        id: RowId,
    },

    /// `playheadIndex` is not an integer; it is ignored.
    InvalidPlayhead(String),

    /// A history entry is malformed; it keeps its position with defaults.
    InvalidHistoryEntry {
        /// Position in the history log
        index: usize,
        /// What was wrong
        error: String,
    },

    /// A history entry's `rowsSnapshot` is not a row list; it is treated as absent.
    UnusableSnapshot {
        /// Position in the history log
        index: usize,
    },

    /// A bookmark is malformed; it is dropped.
    InvalidBookmark {
        /// Position in the bookmark list
        index: usize,
        /// What was wrong
        error: String,
    },

    /// A schema entry is malformed; it is dropped.
    InvalidSchema {
        /// Schema key, or `schema` for the whole section
        key: String,
        /// What was wrong
        error: String,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson(error) => write!(f, "malformed JSON, loaded empty store: {error}"),
            Self::NotAnObject => write!(f, "store is not a JSON object, loaded empty store"),
            Self::UnsupportedVersion(found) => {
                write!(f, "unsupported store version {found}, loaded empty store")
            }
            Self::MissingRows => write!(f, "store has no rows array, loaded empty store"),
            Self::InvalidRow {
                location,
                index,
                error,
            } => write!(f, "dropped invalid row {location}[{index}]: {error}"),
            Self::DuplicateRow {
                location,
                index,
                id,
            } => write!(f, "dropped duplicate row '{id}' at {location}[{index}]"),
            Self::InvalidPlayhead(found) => write!(f, "ignored invalid playheadIndex {found}"),
            Self::InvalidHistoryEntry { index, error } => {
                write!(f, "history entry {index} is malformed: {error}")
            }
            Self::UnusableSnapshot { index } => {
                write!(f, "history entry {index} has an unusable snapshot")
            }
            Self::InvalidBookmark { index, error } => {
                write!(f, "dropped invalid bookmark {index}: {error}")
            }
            Self::InvalidSchema { key, error } => write!(f, "dropped schema entry '{key}': {error}"),
        }
    }
}

/// Decode a row list, dropping unusable rows and repeated ids.
fn decode_rows(items: &[Value], location: &str, warnings: &mut Vec<LoadWarning>) -> Vec<Arc<Row>> {
    let mut seen: HashSet<RowId> = HashSet::with_capacity(items.len());
    let mut rows = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let row = match serde_json::from_value::<Row>(item.clone()) {
            Ok(row) if row.id.as_str().is_empty() => {
                warnings.push(LoadWarning::InvalidRow {
                    location: location.to_string(),
                    index,
                    error: "empty id".to_string(),
                });
                continue;
            }
            Ok(row) => row,
            Err(e) => {
                warnings.push(LoadWarning::InvalidRow {
                    location: location.to_string(),
                    index,
                    error: e.to_string(),
                });
                continue;
            }
        };
        if !seen.insert(row.id.clone()) {
            warnings.push(LoadWarning::DuplicateRow {
                location: location.to_string(),
                index,
                id: row.id,
            });
            continue;
        }
        rows.push(Arc::new(row));
    }

    rows
}

fn describe(value: Option<&Value>) -> String {
    value.map_or_else(|| "missing".to_string(), Value::to_string)
}

fn decode_playhead(value: Option<&Value>, warnings: &mut Vec<LoadWarning>) -> Option<i64> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => v.as_i64().or_else(|| {
            warnings.push(LoadWarning::InvalidPlayhead(v.to_string()));
            None
        }),
    }
}

fn decode_history(value: Option<&Value>, warnings: &mut Vec<LoadWarning>) -> Vec<HistoryEntry> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            warnings.push(LoadWarning::InvalidHistoryEntry {
                index: 0,
                error: format!("history is not an array: {other}"),
            });
            return Vec::new();
        }
    };

    let mut history: Vec<HistoryEntry> = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let previous_ts = history.last().map_or(0, |e| e.ts);
        let empty = Map::new();
        let obj = item.as_object().unwrap_or_else(|| {
            warnings.push(LoadWarning::InvalidHistoryEntry {
                index,
                error: "entry is not an object".to_string(),
            });
            &empty
        });

        let ts = match obj.get("ts").and_then(Value::as_i64) {
            Some(ts) => ts,
            None => {
                if item.is_object() {
                    warnings.push(LoadWarning::InvalidHistoryEntry {
                        index,
                        error: format!("invalid ts {}", describe(obj.get("ts"))),
                    });
                }
                previous_ts
            }
        };
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let rows_snapshot = match obj.get("rowsSnapshot") {
            None | Some(Value::Null) => None,
            Some(Value::Array(rows)) => Some(Snapshot::capture(&decode_rows(
                rows,
                &format!("history[{index}]"),
                warnings,
            ))),
            Some(_) => {
                warnings.push(LoadWarning::UnusableSnapshot { index });
                None
            }
        };

        history.push(HistoryEntry {
            ts,
            kind: text("kind"),
            label: text("label"),
            rows_snapshot,
        });
    }
    history
}

fn decode_bookmark(index: usize, item: &Value, warnings: &mut Vec<LoadWarning>) -> Option<Bookmark> {
    let invalid = |error: &str| LoadWarning::InvalidBookmark {
        index,
        error: error.to_string(),
    };

    let Some(obj) = item.as_object() else {
        warnings.push(invalid("bookmark is not an object"));
        return None;
    };
    let Some(id) = obj.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) else {
        warnings.push(invalid("missing id"));
        return None;
    };
    let Some(Value::Array(rows)) = obj.get("rowsSnapshot") else {
        warnings.push(invalid("missing rowsSnapshot"));
        return None;
    };

    Some(Bookmark {
        id: id.to_string(),
        name: obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string(),
        ts: obj.get("ts").and_then(Value::as_i64).unwrap_or_default(),
        rows_snapshot: Snapshot::capture(&decode_rows(
            rows,
            &format!("bookmarks[{index}]"),
            warnings,
        )),
    })
}

fn decode_bookmarks(value: Option<&Value>, warnings: &mut Vec<LoadWarning>) -> Vec<Bookmark> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            warnings.push(LoadWarning::InvalidBookmark {
                index: 0,
                error: "bookmarks is not an array".to_string(),
            });
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| decode_bookmark(index, item, warnings))
        .filter(|bookmark| seen.insert(bookmark.id.clone()))
        .collect()
}

fn decode_schema(value: Option<&Value>, warnings: &mut Vec<LoadWarning>) -> Schema {
    let entries = match value {
        None | Some(Value::Null) => return Schema::new(),
        Some(Value::Object(entries)) => entries,
        Some(other) => {
            warnings.push(LoadWarning::InvalidSchema {
                key: "schema".to_string(),
                error: format!("expected an object, found {other}"),
            });
            return Schema::new();
        }
    };

    entries
        .iter()
        .filter_map(|(key, entry)| match serde_json::from_value::<ArgsSchema>(entry.clone()) {
            Ok(schema) => Some((key.clone(), schema)),
            Err(e) => {
                warnings.push(LoadWarning::InvalidSchema {
                    key: key.clone(),
                    error: e.to_string(),
                });
                None
            }
        })
        .collect()
}

impl Store {
    /// Decode a persisted store from JSON text.
    ///
    /// Never fails: malformed input yields an empty store plus warnings.
    #[must_use]
    pub fn from_json_str(text: &str) -> (Self, Vec<LoadWarning>) {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_json_value(&value),
            Err(e) => {
                warn!(error = %e, "Store is not valid JSON, starting empty");
                (Self::new(), vec![LoadWarning::MalformedJson(e.to_string())])
            }
        }
    }

    /// Decode a persisted store from a JSON value.
    ///
    /// Never fails: anything but a version-1 object with a `rows` array
    /// yields an empty store; unusable records are dropped or degraded.
    #[must_use]
    pub fn from_json_value(value: &Value) -> (Self, Vec<LoadWarning>) {
        let Some(obj) = value.as_object() else {
            return (Self::new(), vec![LoadWarning::NotAnObject]);
        };

        let version = obj.get("version");
        if version.and_then(Value::as_u64) != Some(STORE_VERSION) {
            let found = describe(version);
            warn!(version = %found, "Unsupported store version, starting empty");
            return (Self::new(), vec![LoadWarning::UnsupportedVersion(found)]);
        }

        let Some(Value::Array(row_items)) = obj.get("rows") else {
            warn!("Store has no rows array, starting empty");
            return (Self::new(), vec![LoadWarning::MissingRows]);
        };

        let mut warnings = Vec::new();
        let mut store = Self {
            version: STORE_VERSION,
            rows: decode_rows(row_items, "rows", &mut warnings),
            playhead_index: decode_playhead(obj.get("playheadIndex"), &mut warnings),
            history: decode_history(obj.get("history"), &mut warnings),
            bookmarks: decode_bookmarks(obj.get("bookmarks"), &mut warnings),
            schema: decode_schema(obj.get("schema"), &mut warnings),
        };
        store.refresh_cycle_status();

        for warning in &warnings {
            warn!(%warning, "Store load warning");
        }
        (store, warnings)
    }
}
