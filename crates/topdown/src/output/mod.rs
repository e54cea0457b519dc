//! Output formatting for CLI commands.
//!
//! Every printer comes in two flavors: human-readable text (optionally
//! colored) and JSON for programmatic use. Text printers write to any
//! [`Write`] so they can be tested without a terminal.

pub mod color;

use chrono::DateTime;
use serde::Serialize;
use std::env;
use std::io::{self, Write};
use std::sync::Arc;
use topdown_core::store::RowDiff;
use topdown_core::{Bookmark, HistoryEntry, NoOpReason, Row, RowId, ValidationReport};

pub use color::{error, info, success, warning};

use color::{bold, colorize_id, colorize_scope, colorize_status, dimmed, row_flags};

// ============================================================================
// Output Configuration
// ============================================================================

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use ASCII-only markers instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new `OutputConfig` with explicit values.
    #[must_use]
    pub fn new(use_ascii: bool, use_colors: bool) -> Self {
        Self {
            use_ascii,
            use_colors,
        }
    }

    /// Create an `OutputConfig` by reading from environment variables.
    ///
    /// Reads:
    /// - `TOPDOWN_ASCII`: Set to "1" or "true" for ASCII-only markers (default: false)
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `TOPDOWN_COLOR`: Set to "0" or "false" to disable colors (default: true)
    #[must_use]
    pub fn from_env() -> Self {
        let use_ascii = match env::var("TOPDOWN_ASCII") {
            Ok(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
            Ok(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.is_empty() => false,
            Ok(v) => {
                tracing::warn!(
                    env_var = "TOPDOWN_ASCII",
                    value = %v,
                    "Invalid value (expected '1', 'true', '0', or 'false'), using default"
                );
                false
            }
            Err(_) => false,
        };

        // Respect NO_COLOR standard (https://no-color.org/)
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("TOPDOWN_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self {
            use_ascii,
            use_colors,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::new(false, true)
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// One history entry as listed by `topdown history`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryLine<'a> {
    /// Position in the log
    pub index: usize,
    /// Milliseconds since the epoch
    pub ts: i64,
    /// Kind tag
    pub kind: &'a str,
    /// Label
    pub label: &'a str,
    /// Row count of the snapshot, `None` when there is no usable snapshot
    pub rows: Option<usize>,
    /// Whether the playhead points here
    pub playhead: bool,
}

impl<'a> HistoryLine<'a> {
    /// Describe `entry` at `index`.
    #[must_use]
    pub fn new(index: usize, entry: &'a HistoryEntry, playhead: Option<usize>) -> Self {
        Self {
            index,
            ts: entry.ts,
            kind: &entry.kind,
            label: &entry.label,
            rows: entry.rows_snapshot.as_ref().map(topdown_core::Snapshot::len),
            playhead: playhead == Some(index),
        }
    }
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

/// Print a single row with all fields.
pub fn print_row(row: &Row, mode: OutputMode) -> io::Result<()> {
    let mut handle = io::stdout().lock();
    match mode {
        OutputMode::Text => write_row_text(&mut handle, row, &OutputConfig::from_env()),
        OutputMode::Json => write_json(&mut handle, row),
    }
}

/// Print rows as a table.
pub fn print_rows(rows: &[Arc<Row>], mode: OutputMode) -> io::Result<()> {
    let mut handle = io::stdout().lock();
    match mode {
        OutputMode::Text => write_rows_text(&mut handle, rows, &OutputConfig::from_env()),
        OutputMode::Json => write_json(&mut handle, &rows),
    }
}

/// Print a validation report plus the locked rows nothing depends on.
pub fn print_report(
    report: &ValidationReport,
    unused_locked: &[RowId],
    mode: OutputMode,
) -> io::Result<()> {
    let mut handle = io::stdout().lock();
    match mode {
        OutputMode::Text => write_report_text(
            &mut handle,
            report,
            unused_locked,
            &OutputConfig::from_env(),
        ),
        OutputMode::Json => {
            let mut value = serde_json::to_value(report)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            if let Some(map) = value.as_object_mut() {
                map.insert("unusedLocked".to_string(), serde_json::json!(unused_locked));
            }
            write_json(&mut handle, &value)
        }
    }
}

/// Print history entries.
pub fn print_history(lines: &[HistoryLine<'_>], mode: OutputMode) -> io::Result<()> {
    let mut handle = io::stdout().lock();
    match mode {
        OutputMode::Text => write_history_text(&mut handle, lines, &OutputConfig::from_env()),
        OutputMode::Json => write_json(&mut handle, &lines),
    }
}

/// Print the difference between the live rows and entry `index`.
pub fn print_diff(index: usize, diff: &RowDiff, mode: OutputMode) -> io::Result<()> {
    let mut handle = io::stdout().lock();
    match mode {
        OutputMode::Text => write_diff_text(&mut handle, index, diff, &OutputConfig::from_env()),
        OutputMode::Json => write_json(
            &mut handle,
            &serde_json::json!({ "index": index, "diff": diff }),
        ),
    }
}

/// Print bookmarks.
pub fn print_bookmarks(bookmarks: &[Bookmark], mode: OutputMode) -> io::Result<()> {
    let mut handle = io::stdout().lock();
    match mode {
        OutputMode::Text => write_bookmarks_text(&mut handle, bookmarks, &OutputConfig::from_env()),
        OutputMode::Json => {
            let summary: Vec<_> = bookmarks
                .iter()
                .map(|b| {
                    serde_json::json!({
                        "id": b.id,
                        "name": b.name,
                        "ts": b.ts,
                        "rows": b.rows_snapshot.len(),
                    })
                })
                .collect();
            write_json(&mut handle, &summary)
        }
    }
}

/// Report an operation that had nothing to act on.
pub fn print_noop(action: &str, reason: &NoOpReason, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            let mut handle = io::stdout().lock();
            writeln!(
                handle,
                "{} {action}: {reason}",
                warning("Nothing to do.", &config)
            )
        }
        OutputMode::Json => print_json(&serde_json::json!({
            "action": action,
            "applied": false,
            "reason": reason.to_string(),
        })),
    }
}

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    write_json(&mut io::stdout().lock(), value)
}

// ============================================================================
// Writers
// ============================================================================

fn write_json<W: Write, T: Serialize + ?Sized>(w: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(w, "{json}")
}

fn format_ts(ts: i64) -> String {
    DateTime::from_timestamp_millis(ts).map_or_else(
        || ts.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

fn join_ids<T: AsRef<str>>(ids: &[T]) -> String {
    ids.iter().map(AsRef::<str>::as_ref).collect::<Vec<_>>().join(", ")
}

pub(crate) fn write_row_text<W: Write>(w: &mut W, row: &Row, config: &OutputConfig) -> io::Result<()> {
    writeln!(
        w,
        "{} {} {}",
        row_flags(row.locked, row.pinned, config),
        colorize_id(row.id.as_str(), config),
        bold(&row.name, config)
    )?;

    let field = |label: &str| dimmed(&format!("{label:<10}"), config);
    if let Some(scope) = &row.scope {
        writeln!(w, "  {} {}", field("Scope:"), colorize_scope(scope, config))?;
    }
    if !row.args.is_empty() {
        writeln!(w, "  {} {}", field("Args:"), row.args)?;
    }
    if !row.expr.is_empty() {
        writeln!(w, "  {} {}", field("Expr:"), row.expr)?;
    }
    if !row.depends.is_empty() {
        writeln!(w, "  {} {}", field("Depends:"), join_ids(&row.depends))?;
    }
    if !row.sources.is_empty() {
        writeln!(w, "  {} {}", field("Sources:"), row.sources.join(", "))?;
    }
    if row.status.is_some() || row.status_message.is_some() {
        write!(w, "  {} {}", field("Status:"), colorize_status(row.status, config))?;
        match &row.status_message {
            Some(message) => writeln!(w, " ({message})")?,
            None => writeln!(w)?,
        }
    }
    if let Some(notes) = &row.notes {
        writeln!(w, "  {} {}", field("Notes:"), notes)?;
    }
    Ok(())
}

pub(crate) fn write_rows_text<W: Write>(
    w: &mut W,
    rows: &[Arc<Row>],
    config: &OutputConfig,
) -> io::Result<()> {
    if rows.is_empty() {
        return writeln!(w, "No rows found.");
    }

    writeln!(w, "{} row(s):", rows.len())?;
    writeln!(w)?;
    for row in rows {
        let scope = row
            .scope
            .as_deref()
            .map(|s| format!(" [{}]", colorize_scope(s, config)))
            .unwrap_or_default();
        let depends = if row.depends.is_empty() {
            String::new()
        } else {
            format!(" {} {}", dimmed("<-", config), join_ids(&row.depends))
        };
        writeln!(
            w,
            "{} {}  {}{}  {}{}",
            row_flags(row.locked, row.pinned, config),
            colorize_id(row.id.as_str(), config),
            row.name,
            scope,
            colorize_status(row.status, config),
            depends
        )?;
    }
    Ok(())
}

pub(crate) fn write_report_text<W: Write>(
    w: &mut W,
    report: &ValidationReport,
    unused_locked: &[RowId],
    config: &OutputConfig,
) -> io::Result<()> {
    if report.is_clean() {
        if unused_locked.is_empty() {
            return writeln!(w, "{}", success("Validation passed: no issues", config));
        }
        writeln!(w, "{}", warning("Validation: no errors", config))?;
        return write_unused_locked(w, unused_locked, config);
    }

    let headline = format!("Validation: {}", report.summary());
    if report.has_issues {
        writeln!(w, "{}", error(&headline, config))?;
    } else {
        writeln!(w, "{}", warning(&headline, config))?;
    }

    for line in &report.cycle_warnings {
        writeln!(w, "  {} {line}", error("cycle", config))?;
    }
    for line in &report.missing_deps {
        writeln!(w, "  {} {line}", error("missing", config))?;
    }
    for row in &report.args_errors {
        for message in &row.errors {
            writeln!(
                w,
                "  {} {}: {message}",
                error("args", config),
                colorize_id(row.row_id.as_str(), config)
            )?;
        }
        for message in &row.warnings {
            writeln!(
                w,
                "  {} {}: {message}",
                warning("args", config),
                colorize_id(row.row_id.as_str(), config)
            )?;
        }
    }
    writeln!(
        w,
        "  {} {}",
        dimmed("Affected:", config),
        join_ids(&report.affected_rows)
    )?;
    write_unused_locked(w, unused_locked, config)
}

fn write_unused_locked<W: Write>(
    w: &mut W,
    unused_locked: &[RowId],
    config: &OutputConfig,
) -> io::Result<()> {
    for id in unused_locked {
        writeln!(
            w,
            "  {} Locked row '{}' has no dependents",
            warning("locked", config),
            colorize_id(id.as_str(), config)
        )?;
    }
    Ok(())
}

pub(crate) fn write_history_text<W: Write>(
    w: &mut W,
    lines: &[HistoryLine<'_>],
    config: &OutputConfig,
) -> io::Result<()> {
    if lines.is_empty() {
        return writeln!(w, "No history entries.");
    }

    for line in lines {
        let marker = if line.playhead { ">" } else { " " };
        let rows = line
            .rows
            .map_or_else(|| "no snapshot".to_string(), |n| format!("{n} rows"));
        writeln!(
            w,
            "{marker} {:>4}  {}  {:<16} {}  {}",
            info(&format!("#{}", line.index), config),
            dimmed(&format_ts(line.ts), config),
            line.kind,
            line.label,
            dimmed(&format!("({rows})"), config)
        )?;
    }
    Ok(())
}

pub(crate) fn write_diff_text<W: Write>(
    w: &mut W,
    index: usize,
    diff: &RowDiff,
    config: &OutputConfig,
) -> io::Result<()> {
    if diff.is_empty() {
        return writeln!(w, "No differences from entry #{index}.");
    }

    writeln!(w, "{}", bold(&format!("Changes since entry #{index}:"), config))?;
    for id in &diff.added {
        writeln!(w, "  {} {}", success("+", config), colorize_id(id.as_str(), config))?;
    }
    for id in &diff.removed {
        writeln!(w, "  {} {}", error("-", config), colorize_id(id.as_str(), config))?;
    }
    for modified in &diff.modified {
        writeln!(
            w,
            "  {} {} {}",
            warning("~", config),
            colorize_id(modified.id.as_str(), config),
            dimmed(&format!("({})", modified.fields.join(", ")), config)
        )?;
    }
    Ok(())
}

pub(crate) fn write_bookmarks_text<W: Write>(
    w: &mut W,
    bookmarks: &[Bookmark],
    config: &OutputConfig,
) -> io::Result<()> {
    if bookmarks.is_empty() {
        return writeln!(w, "No bookmarks.");
    }

    for bookmark in bookmarks {
        writeln!(
            w,
            "{}  {}  {}  {}",
            colorize_id(&bookmark.id, config),
            dimmed(&format_ts(bookmark.ts), config),
            bookmark.name,
            dimmed(&format!("({} rows)", bookmark.rows_snapshot.len()), config)
        )?;
    }
    Ok(())
}
