//! Per-row argument checks.

use crate::domain::{ArgsSchema, ArgsType};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// `-x` / `--long-flag` tokens at the start of the string or after whitespace.
static FLAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(-{1,2}[A-Za-z_][A-Za-z0-9_-]*)").unwrap_or_else(|_| unreachable!())
});

/// One or more `key=value` pairs separated by commas and/or whitespace.
static KEY_VALUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z_][\w.-]*\s*=\s*[^,\s]*(?:\s*,?\s*[A-Za-z_][\w.-]*\s*=\s*[^,\s]*)*\s*,?$",
    )
    .unwrap_or_else(|_| unreachable!())
});

/// Result of checking one `args` string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArgsValidation {
    /// False only when `errors` is non-empty
    pub valid: bool,
    /// Problems that make the arguments unusable
    pub errors: Vec<String>,
    /// Advisory mismatches against the schema
    pub warnings: Vec<String>,
}

impl ArgsValidation {
    /// Whether any error or warning was produced.
    #[must_use]
    pub fn has_findings(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }
}

/// Extract `-x` / `--flag` tokens from an argument string, in order.
#[must_use]
pub fn extract_flags(args: &str) -> Vec<&str> {
    FLAG_PATTERN
        .captures_iter(args)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Check an argument string against the optional schema.
///
/// Blank strings are always valid. Unbalanced quotes and invalid JSON
/// (under `argsType: json`) are errors. Missing required tokens, a pattern
/// mismatch and malformed `key=value` input are warnings. An invalid
/// `argsPattern` is ignored.
#[must_use]
pub fn validate_args(args: &str, schema: Option<&ArgsSchema>) -> ArgsValidation {
    let mut result = ArgsValidation {
        valid: true,
        ..ArgsValidation::default()
    };

    if args.trim().is_empty() {
        return result;
    }

    if args.matches('\'').count() % 2 != 0 {
        result.errors.push("Unbalanced single quotes".to_string());
    }
    if args.matches('"').count() % 2 != 0 {
        result.errors.push("Unbalanced double quotes".to_string());
    }

    if let Some(schema) = schema {
        check_required(args, schema, &mut result);
        check_pattern(args, schema, &mut result);
        check_type(args, schema, &mut result);
    }

    result.valid = result.errors.is_empty();
    result
}

fn check_required(args: &str, schema: &ArgsSchema, result: &mut ArgsValidation) {
    if schema.required_args.is_empty() {
        return;
    }
    let flags = extract_flags(args);
    for required in &schema.required_args {
        let present = flags.iter().any(|flag| flag == required) || args.contains(required.as_str());
        if !present {
            result
                .warnings
                .push(format!("Missing required argument: {required}"));
        }
    }
}

fn check_pattern(args: &str, schema: &ArgsSchema, result: &mut ArgsValidation) {
    let Some(pattern) = schema.args_pattern.as_deref() else {
        return;
    };
    // A pattern that does not compile is a schema problem, not an args problem.
    let Ok(regex) = Regex::new(&format!("^(?:{pattern})$")) else {
        tracing::debug!(pattern, "Ignoring invalid argsPattern");
        return;
    };
    if !regex.is_match(args) {
        result
            .warnings
            .push(format!("Args do not match pattern: {pattern}"));
    }
}

fn check_type(args: &str, schema: &ArgsSchema, result: &mut ArgsValidation) {
    match schema.args_type {
        Some(ArgsType::Json) => {
            if let Err(e) = serde_json::from_str::<serde_json::Value>(args) {
                result.errors.push(format!("Invalid JSON: {e}"));
            }
        }
        Some(ArgsType::KeyValue) => {
            if !KEY_VALUE_PATTERN.is_match(args.trim()) {
                result
                    .warnings
                    .push("Expected key=value pairs".to_string());
            }
        }
        Some(ArgsType::Flags | ArgsType::Free) | None => {}
    }
}
