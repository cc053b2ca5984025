//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run with HOME pointed at a temporary
//! directory, so config and history never touch the real user data.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

const ROUTINE: &str = r#"
name = "Quick"

[[blocks]]
name = "Main"
repetitions = 2
rest_between_repetitions = 15

[[blocks.activities]]
name = "Push-ups"
measurement = { type = "reps", count = 10 }

[[blocks.activities]]
name = "Plank"
measurement = { type = "time", duration_secs = 30 }
"#;

const EMPTY_BLOCK: &str = r#"
name = "Broken"

[[blocks]]
name = "Nothing here"
activities = []
"#;

/// Run a CLI command and return (stdout, stderr, code).
fn run_cli(home: &Path, args: &[&str], stdin: &str) -> (String, String, i32) {
    let mut child = Command::new("cargo")
        .args(["run", "-q", "-p", "repflow-cli", "--"])
        .args(args)
        .env("HOME", home)
        .env_remove("REPFLOW_ENV")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI command");

    // The CLI may exit before reading its input (e.g. on a bad argument).
    let _ = child.stdin.take().unwrap().write_all(stdin.as_bytes());
    let output = child.wait_with_output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

fn write_routine(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_preview_lists_sequence_with_rest() {
    let home = tempfile::tempdir().unwrap();
    let routine = write_routine(home.path(), "quick.toml", ROUTINE);

    let (stdout, _, code) = run_cli(home.path(), &["preview", &routine], "");
    assert_eq!(code, 0);
    assert!(stdout.contains("Push-ups"));
    assert!(stdout.contains("(rest)"));
    assert!(stdout.contains("4 activities"));
}

#[test]
fn test_preview_json() {
    let home = tempfile::tempdir().unwrap();
    let routine = write_routine(home.path(), "quick.toml", ROUTINE);

    let (stdout, _, code) = run_cli(home.path(), &["preview", &routine, "--json"], "");
    assert_eq!(code, 0);
    let entries: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[2]["is_inter_repetition_rest"], true);
    assert_eq!(entries[4]["block_repetition_number"], 2);
}

#[test]
fn test_invalid_routine_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let routine = write_routine(home.path(), "broken.toml", EMPTY_BLOCK);

    let (_, stderr, code) = run_cli(home.path(), &["preview", &routine], "");
    assert_ne!(code, 0);
    assert!(stderr.contains("Nothing here"), "stderr: {stderr}");

    let (_, _, code) = run_cli(home.path(), &["run", &routine, "--no-voice"], "");
    assert_ne!(code, 0);
}

#[test]
fn test_run_to_completion_records_history() {
    let home = tempfile::tempdir().unwrap();
    let body = r#"
name = "Reps only"

[[blocks]]
name = "Main"

[[blocks.activities]]
name = "Squats"
measurement = { type = "reps", count = 12 }

[[blocks.activities]]
name = "Lunges"
measurement = { type = "reps", count = 8 }
"#;
    let routine = write_routine(home.path(), "reps.toml", body);

    let (stdout, _, code) = run_cli(home.path(), &["run", &routine, "--no-voice"], "d\nc\nc\n");
    assert_eq!(code, 0);
    assert!(stdout.contains("Squats: postponed"), "stdout: {stdout}");
    assert!(stdout.contains("saved workout #1: 2/2 completed"), "stdout: {stdout}");

    let (stdout, _, code) = run_cli(home.path(), &["history", "list", "--json"], "");
    assert_eq!(code, 0);
    let sessions: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(sessions.as_array().unwrap().len(), 1);
    assert_eq!(sessions[0]["routine_name"], "Reps only");
}

#[test]
fn test_quit_records_nothing() {
    let home = tempfile::tempdir().unwrap();
    let routine = write_routine(home.path(), "quick.toml", ROUTINE);

    let (stdout, _, code) = run_cli(home.path(), &["run", &routine, "--no-voice"], "c\nq\n");
    assert_eq!(code, 0);
    assert!(stdout.contains("nothing recorded"));

    let (stdout, _, _) = run_cli(home.path(), &["history", "stats"], "");
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total_sessions"], 0);
}

#[test]
fn test_config_set_and_get() {
    let home = tempfile::tempdir().unwrap();

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "voice.locale"], "");
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "en-US");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "voice.keywords", "ok, ready"], "");
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "voice.keywords"], "");
    assert_eq!(stdout.trim(), r#"["ok","ready"]"#);

    let (_, _, code) = run_cli(home.path(), &["config", "get", "voice.nope"], "");
    assert_ne!(code, 0);
    let (_, _, code) = run_cli(home.path(), &["config", "set", "engine.tick_interval_ms", "fast"], "");
    assert_ne!(code, 0);
}

#[test]
fn test_last_activity_cannot_be_postponed() {
    let home = tempfile::tempdir().unwrap();
    let body = r#"
name = "Single"

[[blocks]]
name = "Main"

[[blocks.activities]]
name = "Burpees"
measurement = { type = "reps", count = 10 }
"#;
    let routine = write_routine(home.path(), "single.toml", body);

    let (stdout, stderr, code) = run_cli(home.path(), &["run", &routine, "--no-voice"], "d\nc\n");
    assert_eq!(code, 0);
    assert!(!stdout.contains("d postpone"), "stdout: {stdout}");
    assert!(stderr.contains("can't be postponed"), "stderr: {stderr}");
    assert!(stdout.contains("saved workout #1: 1/1 completed"), "stdout: {stdout}");
}

#[test]
fn test_start_index_out_of_range_fails() {
    let home = tempfile::tempdir().unwrap();
    let routine = write_routine(home.path(), "quick.toml", ROUTINE);

    let (stdout, stderr, code) =
        run_cli(home.path(), &["run", &routine, "--start", "999", "--no-voice"], "c\n");
    assert_ne!(code, 0);
    assert!(stderr.contains("Start index 999 is out of range"), "stderr: {stderr}");
    assert!(!stdout.contains("saved workout"));
}
