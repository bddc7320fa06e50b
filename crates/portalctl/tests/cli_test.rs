//! Integration tests for the `portalctl` binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! config handling, and error exit codes without a live device.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `portalctl` binary with env isolation.
///
/// Clears all `PORTAL_*` env vars the CLI reads and points the config file
/// at `config` so tests never touch the user's real configuration.
fn portalctl(config: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("portalctl");
    cmd.env("PORTAL_CONFIG", config)
        .env("HOME", "/tmp/portalctl-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/portalctl-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("PORTAL_PROFILE")
        .env_remove("PORTAL_DEVICE")
        .env_remove("PORTAL_OUTPUT")
        .env_remove("PORTAL_TIMEOUT")
        .env_remove("PORTAL_WIFI_PASSWORD");
    cmd
}

/// A config whose only profile points at a closed local port and gives up
/// after one quick retry.
fn unreachable_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        r#"
default_profile = "bench"

[defaults]
timeout = 5

[profiles.bench]
device = "http://127.0.0.1:1"

[profiles.bench.reconnect]
interval_ms = 10
max_delay_ms = 20
max_attempts = 1
"#,
    )
    .unwrap();
    path
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = portalctl(&dir.path().join("config.toml")).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    portalctl(&dir.path().join("config.toml"))
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("wifi")
                .and(predicate::str::contains("save"))
                .and(predicate::str::contains("control"))
                .and(predicate::str::contains("watch")),
        );
}

#[test]
fn version_flag() {
    let dir = tempfile::tempdir().unwrap();
    portalctl(&dir.path().join("config.toml"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("portalctl"));
}

#[test]
fn wifi_subcommands_exist() {
    let dir = tempfile::tempdir().unwrap();
    portalctl(&dir.path().join("config.toml"))
        .args(["wifi", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("scan")
                .and(predicate::str::contains("connect"))
                .and(predicate::str::contains("disconnect"))
                .and(predicate::str::contains("standalone")),
        );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    portalctl(&dir.path().join("config.toml"))
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn completions_zsh() {
    let dir = tempfile::tempdir().unwrap();
    portalctl(&dir.path().join("config.toml"))
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn config_path_honors_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    portalctl(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn config_show_without_file_renders_defaults() {
    let dir = tempfile::tempdir().unwrap();
    portalctl(&dir.path().join("config.toml"))
        .args(["--output", "json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"default_profile\": \"default\""));
}

#[test]
fn config_init_writes_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    portalctl(&path)
        .args(["--device", "http://strip.local", "config", "init"])
        .assert()
        .success();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("http://strip.local"));

    let output = portalctl(&path).args(["config", "init"]).output().unwrap();
    assert_eq!(output.status.code(), Some(6));
    assert!(combined_output(&output).contains("--force"));

    portalctl(&path)
        .args(["--device", "http://other.local", "config", "init", "--force"])
        .assert()
        .success();
    portalctl(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("other.local"));
}

#[test]
fn config_init_rejects_bad_address() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let output = portalctl(&path)
        .args(["--device", "gopher://strip", "config", "init"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(!path.exists());
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let output = portalctl(&dir.path().join("config.toml"))
        .arg("foobar")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("unrecognized") || text.contains("foobar"), "{text}");
}

#[test]
fn invalid_output_format() {
    let dir = tempfile::tempdir().unwrap();
    let output = portalctl(&dir.path().join("config.toml"))
        .args(["--output", "invalid", "wifi", "scan"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("possible values"));
}

#[test]
fn malformed_assignment_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    portalctl(&dir.path().join("config.toml"))
        .args(["save", "device", "--set", "hostname"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn destructive_control_needs_yes_without_a_terminal() {
    let dir = tempfile::tempdir().unwrap();
    portalctl(&dir.path().join("config.toml"))
        .args(["control", "reset"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn unknown_profile_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = unreachable_config(dir.path());
    portalctl(&path)
        .args(["--profile", "attic", "wifi", "status"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("attic").and(predicate::str::contains("bench")));
}

#[test]
fn unreachable_device_exits_with_connection_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = unreachable_config(dir.path());
    portalctl(&path)
        .args(["wifi", "scan"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .code(7)
        .stderr(predicate::str::contains("127.0.0.1"));
}
