//! Integration tests for the topdown CLI.
//!
//! These tests verify the end-to-end behavior of the CLI commands against a
//! real `.topdown/` directory.

use rstest::{fixture, rstest};
use tempfile::TempDir;

mod common;
use common::{run_json, run_ok, run_topdown_in_dir};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Provides a fresh temporary directory for each test
#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Provides a temporary directory with an initialized topdown project
#[fixture]
fn initialized_dir() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    run_ok(temp.path(), &["init", "--prefix", "test", "--quiet"]);
    temp
}

/// Provides a project holding `fetch <- build <- test`
#[fixture]
fn chain_dir(initialized_dir: TempDir) -> TempDir {
    let dir = initialized_dir.path();
    run_ok(dir, &["add", "Fetch", "--id", "fetch", "--scope", "ci"]);
    run_ok(dir, &["add", "Build", "--id", "build", "--depends", "fetch", "--scope", "ci"]);
    run_ok(dir, &["add", "Test", "--id", "test", "--depends", "build"]);
    initialized_dir
}

fn row_ids(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .expect("expected a JSON array")
        .iter()
        .map(|row| row["id"].as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[rstest]
fn test_cli_help_shows_all_commands(temp_dir: TempDir) {
    let stdout = run_ok(temp_dir.path(), &["--help"]);

    assert!(stdout.contains("Usage:"));
    for command in [
        "init", "add", "get", "list", "set", "delete", "duplicate", "pin", "unpin", "deps",
        "impact", "order", "cycles", "validate", "history", "playhead", "restore", "undo",
        "diff", "bookmark",
    ] {
        assert!(stdout.contains(command), "Help should show '{command}' command");
    }
}

#[rstest]
fn test_cli_version(temp_dir: TempDir) {
    let stdout = run_ok(temp_dir.path(), &["--version"]);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[rstest]
fn test_cli_no_args(temp_dir: TempDir) {
    let stdout = run_ok(temp_dir.path(), &[]);
    assert!(stdout.contains("--help"));
}

// ============================================================================
// Init Command Tests
// ============================================================================

#[rstest]
fn test_cli_init_creates_project(temp_dir: TempDir) {
    let stdout = run_ok(temp_dir.path(), &["init", "--prefix", "myproj"]);

    assert!(stdout.contains("Initialized topdown"));
    assert!(stdout.contains("myproj"));
    assert!(temp_dir.path().join(".topdown/config.json").is_file());
    assert!(temp_dir.path().join(".topdown/settings.yaml").is_file());
}

#[rstest]
fn test_cli_init_twice_fails_without_force(initialized_dir: TempDir) {
    let output = run_topdown_in_dir(initialized_dir.path(), &["init"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already initialized"), "stderr: {stderr}");

    run_ok(initialized_dir.path(), &["init", "--force", "--quiet"]);
}

#[rstest]
fn test_cli_init_invalid_prefix(temp_dir: TempDir) {
    let output = run_topdown_in_dir(temp_dir.path(), &["init", "--prefix", "a"]);
    assert!(!output.status.success());
    assert!(!temp_dir.path().join(".topdown").exists());
}

#[rstest]
fn test_cli_command_outside_project_fails(temp_dir: TempDir) {
    let output = run_topdown_in_dir(temp_dir.path(), &["list"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Not a topdown repository"), "stderr: {stderr}");
}

#[rstest]
fn test_cli_finds_project_from_subdirectory(chain_dir: TempDir) {
    let nested = chain_dir.path().join("src/deep");
    std::fs::create_dir_all(&nested).unwrap();

    let rows = run_json(&nested, &["list"]);
    assert_eq!(row_ids(&rows), vec!["fetch", "build", "test"]);
}

// ============================================================================
// Row Command Tests
// ============================================================================

#[rstest]
fn test_cli_add_and_get(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    let stdout = run_ok(
        dir,
        &["add", "Build", "--id", "build", "--args", "--release", "--expr", "cargo build"],
    );
    assert!(stdout.contains("Added row: build"));

    let row = run_json(dir, &["get", "build"]);
    assert_eq!(row["name"], "Build");
    assert_eq!(row["args"], "--release");
    assert_eq!(row["expr"], "cargo build");
    assert_eq!(row["locked"], false);
}

#[rstest]
fn test_cli_add_generates_prefixed_id(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    let result = run_json(dir, &["add", "Generated"]);
    let id = result["added"].as_str().unwrap();
    assert!(id.starts_with("test-"), "generated id {id} should use the prefix");

    let rows = run_json(dir, &["list"]);
    assert_eq!(row_ids(&rows), vec![id.to_string()]);
}

#[rstest]
fn test_cli_add_duplicate_id_fails(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    run_ok(dir, &["add", "Build", "--id", "build"]);

    let output = run_topdown_in_dir(dir, &["add", "Other", "--id", "build"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Duplicate row id"));
}

#[rstest]
fn test_cli_add_missing_dependency_warns(initialized_dir: TempDir) {
    let stdout = run_ok(initialized_dir.path(), &["add", "Build", "--id", "build", "--depends", "ghost"]);
    assert!(stdout.contains("Added row: build"));
    assert!(stdout.contains("missing dependency"), "stdout: {stdout}");
}

#[rstest]
fn test_cli_get_unknown_row_fails(initialized_dir: TempDir) {
    let output = run_topdown_in_dir(initialized_dir.path(), &["get", "nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Row not found: nope"));
}

#[rstest]
fn test_cli_list_empty(initialized_dir: TempDir) {
    let stdout = run_ok(initialized_dir.path(), &["list"]);
    assert!(stdout.contains("No rows found."));
}

#[rstest]
fn test_cli_list_filters(chain_dir: TempDir) {
    let dir = chain_dir.path();
    run_ok(dir, &["pin", "test"]);

    assert_eq!(row_ids(&run_json(dir, &["list", "--scope", "ci"])), vec!["fetch", "build"]);
    assert_eq!(row_ids(&run_json(dir, &["list", "--pinned"])), vec!["test"]);
    assert!(row_ids(&run_json(dir, &["list", "--locked"])).is_empty());
}

#[rstest]
fn test_cli_set_updates_fields(chain_dir: TempDir) {
    let dir = chain_dir.path();
    let stdout = run_ok(dir, &["set", "test", "--name", "Unit tests", "--clear-depends", "--notes", "fast"]);
    assert!(stdout.contains("Updated row: test"));

    let row = run_json(dir, &["get", "test"]);
    assert_eq!(row["name"], "Unit tests");
    assert_eq!(row["notes"], "fast");
    assert!(row.get("depends").is_none());
}

#[rstest]
fn test_cli_set_without_changes_fails(chain_dir: TempDir) {
    let output = run_topdown_in_dir(chain_dir.path(), &["set", "test"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No changes specified"));
}

#[rstest]
fn test_cli_locked_row_guard(chain_dir: TempDir) {
    let dir = chain_dir.path();
    run_ok(dir, &["set", "build", "--lock"]);

    let output = run_topdown_in_dir(dir, &["set", "build", "--args", "--verbose"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("locked"));

    let output = run_topdown_in_dir(dir, &["delete", "build"]);
    assert!(!output.status.success());

    // Unlocking in the same edit lifts the guard.
    run_ok(dir, &["set", "build", "--args", "--verbose", "--unlock"]);
    let row = run_json(dir, &["get", "build"]);
    assert_eq!(row["args"], "--verbose");
    assert_eq!(row["locked"], false);
}

#[rstest]
fn test_cli_delete_row(chain_dir: TempDir) {
    let dir = chain_dir.path();
    let stdout = run_ok(dir, &["delete", "test"]);
    assert!(stdout.contains("Deleted row: test"));
    assert_eq!(row_ids(&run_json(dir, &["list"])), vec!["fetch", "build"]);
}

#[rstest]
fn test_cli_duplicate_creates_variant(chain_dir: TempDir) {
    let dir = chain_dir.path();
    run_ok(dir, &["set", "build", "--lock"]);

    let result = run_json(dir, &["duplicate", "build"]);
    assert_eq!(result["created"], "build-2");

    let copy = run_json(dir, &["get", "build-2"]);
    assert_eq!(copy["name"], "Build");
    assert_eq!(copy["locked"], false);
}

// ============================================================================
// Graph Command Tests
// ============================================================================

#[rstest]
fn test_cli_deps(chain_dir: TempDir) {
    let deps = run_json(chain_dir.path(), &["deps", "test"]);
    assert_eq!(deps["direct"], serde_json::json!(["build"]));
    assert_eq!(deps["transitive"], serde_json::json!(["build", "fetch"]));
    assert_eq!(deps["missing"], serde_json::json!([]));
}

#[rstest]
fn test_cli_impact_levels(chain_dir: TempDir) {
    let dir = chain_dir.path();
    let impact = run_json(dir, &["impact", "fetch"]);
    assert_eq!(impact["total"], 2);
    assert_eq!(impact["levels"][0]["rows"], serde_json::json!(["build"]));
    assert_eq!(impact["levels"][1]["rows"], serde_json::json!(["test"]));

    let stdout = run_ok(dir, &["impact", "fetch"]);
    assert!(stdout.contains("Level 1:"));
    assert!(stdout.contains("[ci] build"));

    let stdout = run_ok(dir, &["impact", "test"]);
    assert!(stdout.contains("No rows depend on test"));
}

#[rstest]
fn test_cli_order(chain_dir: TempDir) {
    let order = run_json(chain_dir.path(), &["order"]);
    assert_eq!(order["order"], serde_json::json!(["fetch", "build", "test"]));
    assert_eq!(order["hasCycle"], false);
}

#[rstest]
fn test_cli_cycles_and_validate_exit_code(chain_dir: TempDir) {
    let dir = chain_dir.path();
    assert!(run_ok(dir, &["cycles"]).contains("No cycles found."));
    assert!(run_ok(dir, &["validate"]).contains("Validation passed"));

    // Default settings let a cycle through with a warning.
    run_ok(dir, &["set", "fetch", "--depends", "test"]);

    let stdout = run_ok(dir, &["cycles"]);
    assert!(stdout.contains("Found 1 cycle(s)"), "stdout: {stdout}");

    let order = run_json(dir, &["order"]);
    assert_eq!(order["hasCycle"], true);

    // Saved with a warning, but validation treats the cycle as an error.
    let output = run_topdown_in_dir(dir, &["validate"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("cycle"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Validation failed"));

    let output = run_topdown_in_dir(dir, &["validate", "--fail-on-cycle"]);
    assert_eq!(output.status.code(), Some(1));
}

#[rstest]
fn test_cli_validate_fails_on_missing_dependency(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    run_ok(dir, &["add", "Build", "--id", "build", "--depends", "ghost"]);

    let output = run_topdown_in_dir(dir, &["validate"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 missing dependency"), "stdout: {stdout}");
}

#[rstest]
fn test_cli_validate_unused_locked_row_is_warning(chain_dir: TempDir) {
    let dir = chain_dir.path();
    run_ok(dir, &["set", "test", "--lock"]);
    run_ok(dir, &["set", "build", "--lock"]);

    let stdout = run_ok(dir, &["validate"]);
    assert!(stdout.contains("Locked row 'test' has no dependents"), "stdout: {stdout}");
    assert!(!stdout.contains("'build'"));

    let report = run_json(dir, &["validate"]);
    assert_eq!(report["unusedLocked"], serde_json::json!(["test"]));

    let output = run_topdown_in_dir(dir, &["validate", "--strict"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 unused locked row(s)"));
}

#[rstest]
fn test_cli_strict_settings_reject_cycle(chain_dir: TempDir) {
    let dir = chain_dir.path();
    std::fs::write(
        dir.join(".topdown/settings.yaml"),
        "id-prefix: test\nvalidation:\n  fail-on-cycle: true\n",
    )
    .unwrap();

    let output = run_topdown_in_dir(dir, &["set", "fetch", "--depends", "test"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Commit rejected"));

    // The rejected edit never reached disk.
    let row = run_json(dir, &["get", "fetch"]);
    assert!(row.get("depends").is_none());
}

// ============================================================================
// History Command Tests
// ============================================================================

#[rstest]
fn test_cli_history_lists_entries(chain_dir: TempDir) {
    let dir = chain_dir.path();
    let history = run_json(dir, &["history"]);
    let entries = history.as_array().unwrap();

    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e["kind"] == "row.add"));
    assert_eq!(entries[2]["rows"], 3);
    assert_eq!(entries[2]["playhead"], true);

    let stdout = run_ok(dir, &["history", "--limit", "1"]);
    assert!(stdout.contains("#2"));
    assert!(!stdout.contains("#0"));
}

#[rstest]
fn test_cli_history_filters(chain_dir: TempDir) {
    let dir = chain_dir.path();
    run_ok(dir, &["delete", "test"]);

    let deletes = run_json(dir, &["history", "--kind", "row.delete"]);
    let deletes = deletes.as_array().unwrap();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0]["index"], 3);

    let none = run_json(dir, &["history", "--kind", "undo"]);
    assert!(none.as_array().unwrap().is_empty());
}

#[rstest]
fn test_cli_empty_history(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    assert!(run_ok(dir, &["history"]).contains("No history entries."));
    assert!(run_ok(dir, &["playhead"]).contains("History is empty."));
    assert!(run_ok(dir, &["undo"]).contains("nothing to undo"));
}

#[rstest]
fn test_cli_undo_restores_previous_rows(chain_dir: TempDir) {
    let dir = chain_dir.path();
    let stdout = run_ok(dir, &["undo"]);
    assert!(stdout.contains("now at entry #3"), "stdout: {stdout}");

    assert_eq!(row_ids(&run_json(dir, &["list"])), vec!["fetch", "build"]);

    let undo = run_json(dir, &["history", "--kind", "undo"]);
    assert_eq!(undo.as_array().unwrap().len(), 1);
}

#[rstest]
fn test_cli_restore_appends_entry(chain_dir: TempDir) {
    let dir = chain_dir.path();
    let result = run_json(dir, &["restore", "0"]);
    assert_eq!(result["applied"], true);
    assert_eq!(result["index"], 3);

    assert_eq!(row_ids(&run_json(dir, &["list"])), vec!["fetch"]);
    // Nothing was discarded.
    assert_eq!(run_json(dir, &["history"]).as_array().unwrap().len(), 4);
}

#[rstest]
fn test_cli_restore_out_of_range_is_noop(chain_dir: TempDir) {
    let dir = chain_dir.path();
    let result = run_json(dir, &["restore", "42"]);
    assert_eq!(result["applied"], false);
    assert!(result["reason"].as_str().unwrap().contains("out of range"));

    assert_eq!(run_json(dir, &["history"]).as_array().unwrap().len(), 3);
}

#[rstest]
fn test_cli_diff_against_entry(chain_dir: TempDir) {
    let dir = chain_dir.path();
    let diff = run_json(dir, &["diff", "0"]);
    assert_eq!(diff["diff"]["added"], serde_json::json!(["build", "test"]));
    assert_eq!(diff["diff"]["removed"], serde_json::json!([]));

    assert!(run_ok(dir, &["diff", "2"]).contains("No differences from entry #2."));
}

#[rstest]
fn test_cli_playhead_moves(chain_dir: TempDir) {
    let dir = chain_dir.path();
    assert!(run_ok(dir, &["playhead"]).contains("Playhead at #2 (latest)"));

    let moved = run_json(dir, &["playhead", "prev"]);
    assert_eq!(moved["playhead"], 1);
    assert_eq!(moved["atLatest"], false);

    // Moving the playhead does not change the rows.
    assert_eq!(row_ids(&run_json(dir, &["list"])).len(), 3);

    let cleared = run_json(dir, &["playhead", "clear"]);
    assert_eq!(cleared["atLatest"], true);

    // Out-of-range targets clamp to the latest entry.
    run_ok(dir, &["playhead", "set", "0"]);
    let clamped = run_json(dir, &["playhead", "set", "9"]);
    assert_eq!(clamped["playhead"], 2);
    assert_eq!(clamped["atLatest"], true);
}

// ============================================================================
// Bookmark Command Tests
// ============================================================================

#[rstest]
fn test_cli_bookmark_lifecycle(chain_dir: TempDir) {
    let dir = chain_dir.path();
    assert!(run_ok(dir, &["bookmark", "list"]).contains("No bookmarks."));

    let added = run_json(dir, &["bookmark", "add", "three rows"]);
    let id = added["id"].as_str().unwrap().to_string();
    assert_eq!(added["name"], "three rows");

    run_ok(dir, &["delete", "test"]);
    run_ok(dir, &["delete", "build"]);

    let restored = run_json(dir, &["bookmark", "restore", &id]);
    assert_eq!(restored["applied"], true);
    assert_eq!(row_ids(&run_json(dir, &["list"])), vec!["fetch", "build", "test"]);

    let listed = run_json(dir, &["bookmark", "list"]);
    assert_eq!(listed[0]["rows"], 3);

    assert!(run_ok(dir, &["bookmark", "delete", &id]).contains("Deleted bookmark"));
    let missing = run_json(dir, &["bookmark", "restore", &id]);
    assert_eq!(missing["applied"], false);
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[rstest]
fn test_cli_store_file_is_camel_case_json(chain_dir: TempDir) {
    let dir = chain_dir.path();
    run_ok(dir, &["set", "build", "--lock"]);

    let text = std::fs::read_to_string(dir.join(".topdown/config.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(doc["rows"].as_array().unwrap().len(), 3);
    assert_eq!(doc["rows"][1]["locked"], true);
    assert!(doc["history"][0]["rowsSnapshot"].is_array());
    assert!(!dir.join(".topdown/config.json.tmp").exists());
}
