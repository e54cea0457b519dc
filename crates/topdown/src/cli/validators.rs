//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.

use topdown_core::id_generation::{is_valid_id, MAX_ID_LENGTH};

/// Validate a generated-id prefix.
///
/// Delegates to [`crate::config::validate_prefix`] so the rules live in
/// one place.
pub fn validate_prefix(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    crate::config::validate_prefix(trimmed).map_err(|e| e.to_string())?;
    Ok(trimmed.to_string())
}

/// Validate a row id.
///
/// A letter or `_`, then letters, digits, `_`, `.` or `-`; at most
/// [`MAX_ID_LENGTH`] characters.
///
/// Examples: `build`, `build-2`, `_private`, `api.v2`
pub fn validate_row_id(s: &str) -> Result<String, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Row ID cannot be empty".to_string());
    }

    if s.len() > MAX_ID_LENGTH {
        return Err(format!(
            "Row ID cannot exceed {MAX_ID_LENGTH} characters, got {}",
            s.len()
        ));
    }

    if !is_valid_id(s) {
        return Err(format!(
            "Invalid row ID '{s}': must start with a letter or '_' and contain only letters, digits, '_', '.' or '-'"
        ));
    }

    Ok(s.to_string())
}

/// Validate a row name: non-empty, single line.
pub fn validate_name(s: &str) -> Result<String, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    if s.contains(['\n', '\r']) {
        return Err("Name cannot contain newline characters".to_string());
    }

    Ok(s.to_string())
}
