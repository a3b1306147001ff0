// JSON contract tests for the confronta binary: with --json, stdout carries
// exactly one JSON document and the exit code matches the outcome.
// Run with: cargo test -p confronta-cli --test json_contract_tests

mod common;

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use common::*;
use serde_json::Value;
use tempfile::TempDir;

/// Run the binary against an empty settings file so the user's own
/// configuration never leaks into the test.
fn confronta(dir: &Path, args: &[&str]) -> Output {
    let settings = dir.join("settings.toml");
    if !settings.exists() {
        std::fs::write(&settings, "").unwrap();
    }
    Command::new(env!("CARGO_BIN_EXE_confronta"))
        .arg("--config")
        .arg(&settings)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run confronta")
}

fn assert_single_json(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| panic!("stdout is not one JSON document ({e}):\n{stdout}"))
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn ledger(dir: &Path) -> PathBuf {
    let juan = LedgerWorker { cf: 100.0, ..LedgerWorker::new("12345678901", "JUAN PEREZ", 30, 500.0) };
    write_ledger(dir, "in/Y54.SUA", 3, 2024, &[juan])
}

fn emission(dir: &Path, period: &str) -> PathBuf {
    let mut amounts = vec![0.0; 11];
    amounts[0] = 100.0;
    write_emission(
        &dir.join("in/emision.xlsx"),
        period,
        &[Movement::new("12345678901", "JUAN PEREZ", "01/03/2024", 30, 500.0, &amounts)],
        None,
    )
}

#[test]
fn run_prints_outcome() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let output = confronta(
        dir.path(),
        &["run", s(&ledger(dir.path())), s(&emission(dir.path(), "3/2024")), "-o", s(&out), "--json"],
    );
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json = assert_single_json(&output);
    assert_eq!(json["exit_code"], 0);
    assert!(json["path"].as_str().unwrap().ends_with("03_2024_CONFRONTA.xlsx"));
    assert!(json["message"].as_str().unwrap().starts_with("wrote 03_2024_CONFRONTA.xlsx"));
    assert!(json.get("skipped").is_none());
}

#[test]
fn failure_prints_json_and_exit_code() {
    let dir = TempDir::new().unwrap();
    let output = confronta(
        dir.path(),
        &["run", s(&ledger(dir.path())), s(&emission(dir.path(), "5/2024")), "-o", s(dir.path()), "--json"],
    );
    assert_eq!(output.status.code(), Some(3));

    let json = assert_single_json(&output);
    assert_eq!(json["exit_code"], 3);
    assert!(json["path"].is_null());
    assert!(json["message"].as_str().unwrap().contains("different periods"));
    // The message is not repeated as a human error line.
    assert!(!String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn structure_ledger_without_json_prints_message() {
    let dir = TempDir::new().unwrap();
    let output = confronta(dir.path(), &["structure", "ledger", s(&ledger(dir.path())), "-o", s(dir.path())]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("wrote 03-2024_Y5412345105_CEDULA.xlsx (1 monthly rows)"), "{stdout}");
    assert!(dir.path().join("03-2024_Y5412345105_CEDULA.xlsx").is_file());
}

#[test]
fn layout_show_lists_builtins() {
    let dir = TempDir::new().unwrap();
    let output = confronta(dir.path(), &["layout", "show", "--json"]);
    assert_eq!(output.status.code(), Some(0));

    let json = assert_single_json(&output);
    assert_eq!(json["active"], "separate");
    let names: Vec<&str> = json["layouts"].as_array().unwrap().iter().map(|l| l["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"separate"));
    assert!(json["settings"]["snap"].is_number());
}

#[test]
fn layout_check_scores_every_layout() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger(dir.path());
    let missing = dir.path().join("missing.SUA");
    let output = confronta(dir.path(), &["layout", "check", s(&ledger), s(&missing), "--json"]);
    assert_eq!(output.status.code(), Some(0));

    let json = assert_single_json(&output);
    let files = json.as_array().unwrap();
    assert_eq!(files.len(), 2);
    let separate = files[0]["scores"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["layout"] == "separate")
        .unwrap();
    assert_eq!(separate["records"], 1);
    assert_eq!(separate["decoded"], 1);
    assert!(files[1]["error"].is_string());
}

#[test]
fn layout_check_fails_when_nothing_reads() {
    let dir = TempDir::new().unwrap();
    let output = confronta(dir.path(), &["layout", "check", s(&dir.path().join("missing.SUA"))]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no file could be read as a ledger"));
}

#[test]
fn bad_settings_file_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[tolerance]\nsnap = \"tiny\"\n").unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_confronta"))
        .args(["--config", s(&bad), "layout", "show"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("hint:"));
}
