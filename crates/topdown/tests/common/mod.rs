//! Common test utilities shared across integration tests.

use std::path::Path;
use std::process::{Command, Output};

/// Run the topdown binary in the specified directory.
///
/// Colors are disabled and `TOPDOWN_ROOT` is cleared so the run only sees
/// the given directory.
pub fn run_topdown_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_topdown"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env("TOPDOWN_ASCII", "1")
        .env_remove("TOPDOWN_ROOT")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute topdown binary")
}

/// Run a command that must succeed and return its stdout.
pub fn run_ok(dir: &Path, args: &[&str]) -> String {
    let output = run_topdown_in_dir(dir, args);
    assert!(
        output.status.success(),
        "topdown {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Run a command with `--json` and parse its stdout.
pub fn run_json(dir: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = args.to_vec();
    full.push("--json");
    let stdout = run_ok(dir, &full);
    serde_json::from_str(&stdout).expect("stdout should be valid JSON")
}
