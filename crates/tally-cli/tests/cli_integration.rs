//! Integration tests for the `tally` binary.
//!
//! The exit hook only runs at process termination, so these tests spawn the
//! binary and inspect what it printed after `main` returned.

use std::process::{Command, Output};

fn run_tally(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tally"));
    cmd.args(args)
        .env_remove("TALLY_GC_COLLECT_ON_RELEASE")
        .env_remove("TALLY_GC_EXIT_HOOK")
        .env_remove("TALLY_GC_INITIAL_CAPACITY")
        .env("RUST_LOG", "debug");
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to spawn tally")
}

// ────────────────────────────────────────────────────────────────────────────
// Exit hook
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_exit_hook_drains_leftover_handle() {
    let output = run_tally(&["demo", "exit"], &[]);
    assert!(output.status.success(), "tally exited with {:?}", output.status);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(stderr.contains("registered exit hook for registry<"), "stderr: {}", stderr);
    assert!(stderr.contains("draining 1 record(s)"), "stderr: {}", stderr);

    // The value is released only after main has returned
    let returned = stdout.find("== return from main").expect("missing final step");
    let released = stdout.find("released session").expect("value never released");
    assert!(released > returned, "stdout: {}", stdout);
    assert_eq!(stdout.matches("released session").count(), 1);
}

#[test]
fn test_exit_hook_disabled_leaves_value() {
    let output = run_tally(&["demo", "exit"], &[("TALLY_GC_EXIT_HOOK", "false")]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stdout.contains("released session"), "stdout: {}", stdout);
    assert!(!stderr.contains("draining"), "stderr: {}", stderr);
}

#[test]
fn test_exit_hook_skips_empty_registries() {
    let output = run_tally(&["demo", "copy"], &[]);
    assert!(output.status.success());

    // Every handle was dropped before exit, so the hook has nothing to drain
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("registered exit hook"), "stderr: {}", stderr);
    assert!(!stderr.contains("draining"), "stderr: {}", stderr);
}

// ────────────────────────────────────────────────────────────────────────────
// Commands
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_info_reports_environment_options() {
    let output = run_tally(&["info"], &[("TALLY_GC_INITIAL_CAPACITY", "64")]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("initial_capacity:   64"), "stdout: {}", stdout);
    assert!(stdout.contains("collect_on_release: true"), "stdout: {}", stdout);
}

#[test]
fn test_info_rejects_invalid_option() {
    let output = run_tally(&["info"], &[("TALLY_GC_EXIT_HOOK", "sometimes")]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TALLY_GC_EXIT_HOOK"), "stderr: {}", stderr);
}
