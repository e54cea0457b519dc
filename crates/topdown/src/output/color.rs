//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success/Ok:     green   (ok status, applied actions, clean reports)
//!   - Warning:        yellow  (warning status, no-op outcomes, locks)
//!   - Error/Cycle:    red     (error status, cycles, rejected commits)
//!   - Info/Reference: cyan    (row ids, history indices)
//!   - Accent:         magenta (scopes)
//!   - Muted:          dimmed  (field labels, timestamps)
//!   - Emphasis:       bold    (section headers)

use colored::Colorize;
use topdown_core::RowStatus;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Apply semantic "info" color (cyan) to text.
pub fn info(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}

/// Status text, colored by severity. Rows without a status show `-`.
pub(crate) fn colorize_status(status: Option<RowStatus>, config: &OutputConfig) -> String {
    let Some(status) = status else {
        return "-".to_string();
    };
    let text = status.to_string();
    if !config.use_colors {
        return text;
    }
    match status {
        RowStatus::Ok => text.green().to_string(),
        RowStatus::Warning => text.yellow().to_string(),
        RowStatus::Error => text.red().to_string(),
    }
}

/// Colorize a row id (cyan).
pub(crate) fn colorize_id(id: &str, config: &OutputConfig) -> String {
    info(id, config)
}

/// Colorize a scope (magenta).
pub(crate) fn colorize_scope(scope: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return scope.to_string();
    }
    scope.magenta().to_string()
}

/// Marker for locked and pinned rows, with ASCII fallback support.
pub(crate) fn row_flags(locked: bool, pinned: bool, config: &OutputConfig) -> String {
    let (lock, pin) = if config.use_ascii {
        ("L", "P")
    } else {
        ("🔒", "📌")
    };
    let lock = if locked { warning(lock, config) } else { " ".to_string() };
    let pin = if pinned { pin.to_string() } else { " ".to_string() };
    format!("{lock}{pin}")
}

/// Apply dimmed style to text (for labels/field names).
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Apply bold style to text (for section headers).
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}
