//! Speculative validation of candidate row sets.
//!
//! [`speculative_validate`] is pure: it builds a throwaway graph over the
//! candidate rows and reports cycles, dangling references and per-row
//! argument findings without touching any store. Whether a report blocks a
//! commit is decided separately by a [`CommitPolicy`].

mod args;

pub use args::{extract_flags, validate_args, ArgsValidation};

use crate::domain::{Row, RowId, Schema};
use crate::graph::DependencyGraph;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Argument findings for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowArgsReport {
    /// The row the findings belong to
    pub row_id: RowId,
    /// False iff `errors` is non-empty
    pub valid: bool,
    /// Argument errors
    pub errors: Vec<String>,
    /// Argument warnings
    pub warnings: Vec<String>,
}

/// Diagnostic report for a candidate row set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Set by cycles, missing dependencies and argument errors (not warnings)
    pub has_issues: bool,
    /// One `Circular: a → b → a` line per detected cycle
    pub cycle_warnings: Vec<String>,
    /// One `<row> depends on missing '<dep>'` line per dangling reference
    pub missing_deps: Vec<String>,
    /// Rows with at least one argument error or warning
    pub args_errors: Vec<RowArgsReport>,
    /// Every row with a finding of any kind, in row order
    pub affected_rows: Vec<RowId>,
    /// Raw cycles, each closed by repeating its first id
    pub cycles: Vec<Vec<RowId>>,
}

impl ValidationReport {
    /// Number of rows with at least one argument error.
    #[must_use]
    pub fn args_error_count(&self) -> usize {
        self.args_errors.iter().filter(|r| !r.valid).count()
    }

    /// Number of argument warnings across all rows.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.args_errors.iter().map(|r| r.warnings.len()).sum()
    }

    /// Whether the report contains nothing at all.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.has_issues && self.args_errors.is_empty()
    }

    /// One-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_clean() {
            return "no issues".to_string();
        }

        let mut parts = Vec::new();
        let cycles = self.cycle_warnings.len();
        if cycles > 0 {
            parts.push(plural(cycles, "cycle", "cycles"));
        }
        let missing = self.missing_deps.len();
        if missing > 0 {
            parts.push(plural(missing, "missing dependency", "missing dependencies"));
        }
        let errors = self.args_error_count();
        if errors > 0 {
            parts.push(plural(
                errors,
                "row with argument errors",
                "rows with argument errors",
            ));
        }
        let warnings = self.warning_count();
        if warnings > 0 {
            parts.push(plural(warnings, "argument warning", "argument warnings"));
        }
        parts.join(", ")
    }

    /// Whether this report violates `policy`.
    #[must_use]
    pub fn blocks(&self, policy: &CommitPolicy) -> bool {
        (policy.fail_on_cycle && !self.cycle_warnings.is_empty())
            || (policy.fail_on_missing_deps && !self.missing_deps.is_empty())
            || (policy.fail_on_args_errors && self.args_error_count() > 0)
            || (policy.fail_on_warnings && self.warning_count() > 0)
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("1 {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Decides which findings block a commit, and whether the lock guard runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CommitPolicy {
    /// Reject candidates containing a cycle
    pub fail_on_cycle: bool,
    /// Reject candidates with dangling `depends` references
    pub fail_on_missing_deps: bool,
    /// Reject candidates with argument errors
    pub fail_on_args_errors: bool,
    /// Reject candidates with argument warnings
    pub fail_on_warnings: bool,
    /// Refuse edits to locked rows' code-facing fields
    pub enforce_locks: bool,
}

impl CommitPolicy {
    /// Never block on findings; locks are still enforced.
    #[must_use]
    pub const fn lenient() -> Self {
        Self {
            fail_on_cycle: false,
            fail_on_missing_deps: false,
            fail_on_args_errors: false,
            fail_on_warnings: false,
            enforce_locks: true,
        }
    }

    /// Block on cycles and missing dependencies.
    #[must_use]
    pub const fn structural() -> Self {
        Self {
            fail_on_cycle: true,
            fail_on_missing_deps: true,
            ..Self::lenient()
        }
    }

    /// Block on any finding, warnings included.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            fail_on_cycle: true,
            fail_on_missing_deps: true,
            fail_on_args_errors: true,
            fail_on_warnings: true,
            enforce_locks: true,
        }
    }

    /// Same policy with the lock guard switched on or off.
    #[must_use]
    pub const fn with_locks(mut self, enforce_locks: bool) -> Self {
        self.enforce_locks = enforce_locks;
        self
    }
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self::lenient()
    }
}

/// Validate a candidate row set against an optional argument schema.
///
/// Never fails and never mutates anything; the same input always yields
/// the same report.
#[must_use]
pub fn speculative_validate<R: AsRef<Row>>(rows: &[R], schema: Option<&Schema>) -> ValidationReport {
    let graph = DependencyGraph::build(rows);
    let mut flagged: HashSet<RowId> = HashSet::new();

    let cycles = graph.detect_cycles();
    let cycle_warnings = cycles
        .iter()
        .map(|cycle| {
            flagged.extend(cycle.iter().cloned());
            let path: Vec<&str> = cycle.iter().map(RowId::as_str).collect();
            format!("Circular: {}", path.join(" → "))
        })
        .collect::<Vec<_>>();

    let missing_deps = graph
        .dangling_dependencies()
        .into_iter()
        .map(|(row, dep)| {
            let line = format!("{row} depends on missing '{dep}'");
            flagged.insert(row);
            line
        })
        .collect::<Vec<_>>();

    let mut args_errors = Vec::new();
    for row in rows {
        let row = row.as_ref();
        let rule = schema.and_then(|s| s.get(row.id.as_str()));
        let result = validate_args(&row.args, rule);
        if result.has_findings() {
            flagged.insert(row.id.clone());
            args_errors.push(RowArgsReport {
                row_id: row.id.clone(),
                valid: result.valid,
                errors: result.errors,
                warnings: result.warnings,
            });
        }
    }

    let has_issues = !cycle_warnings.is_empty()
        || !missing_deps.is_empty()
        || args_errors.iter().any(|r| !r.valid);

    let mut seen = HashSet::new();
    let affected_rows = rows
        .iter()
        .map(|row| &row.as_ref().id)
        .filter(|id| flagged.contains(*id) && seen.insert(*id))
        .cloned()
        .collect();

    let report = ValidationReport {
        has_issues,
        cycle_warnings,
        missing_deps,
        args_errors,
        affected_rows,
        cycles,
    };
    debug!(rows = rows.len(), summary = %report.summary(), "Validated candidate rows");
    report
}
