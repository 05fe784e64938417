//! Integration tests for the `twinkly` CLI binary.
//!
//! Argument parsing, help output, shell completions and error exit codes,
//! plus a few round trips against wiremock devices.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `twinkly` binary with env isolation.
///
/// Clears all `TWINKLY_*` env vars and points config and data
/// directories into `home` so tests never touch real state.
fn twinkly_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("twinkly");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("TWINKLY_CONFIG")
        .env_remove("TWINKLY_REGISTRY")
        .env_remove("TWINKLY_OUTPUT")
        .env_remove("TWINKLY_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// A command wired to a throwaway registry inside `home`.
fn fleet_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = twinkly_cmd(home.path());
    cmd.arg("--registry")
        .arg(home.path().join("registry.json"))
        .arg("--config")
        .arg(home.path().join("config.toml"));
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn device(family: &str) -> (MockServer, String) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/xled/v1/gestalt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_name": "Twinkly_tree",
            "mac": "98:cd:ac:12:34:56",
            "fw_family": family,
            "code": 1000
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/xled/v1/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": 1000, "authentication_token": "tok"})),
        )
        .mount(&server)
        .await;
    let address = server.address().to_string();
    (server, address)
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = twinkly_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    twinkly_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("Twinkly")
            .and(predicate::str::contains("add"))
            .and(predicate::str::contains("brightness"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    twinkly_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("twinkly"));
}

#[test]
fn test_invalid_subcommand() {
    let home = TempDir::new().unwrap();
    twinkly_cmd(home.path())
        .arg("frobnicate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_mode_rejects_unknown_state() {
    let home = TempDir::new().unwrap();
    fleet_cmd(&home).args(["mode", "0", "dim"]).assert().code(2);
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    twinkly_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("twinkly"));
}

#[test]
fn test_completions_invalid_shell() {
    let home = TempDir::new().unwrap();
    twinkly_cmd(home.path())
        .args(["completions", "tcsh"])
        .assert()
        .failure();
}

// ── Empty registry ──────────────────────────────────────────────────

#[test]
fn test_list_empty_json() {
    let home = TempDir::new().unwrap();
    fleet_cmd(&home)
        .args(["list", "-o", "json-compact"])
        .assert()
        .success()
        .stdout("[]\n");
}

#[test]
fn test_remove_absent_is_not_found() {
    let home = TempDir::new().unwrap();
    fleet_cmd(&home)
        .args(["remove", "10.0.0.99"])
        .assert()
        .code(4)
        .stdout(predicate::str::contains(r#"{"code":1,"message":"not exists"}"#))
        .stderr(predicate::str::contains("twinkly list"));
}

#[test]
fn test_mode_unknown_index() {
    let home = TempDir::new().unwrap();
    fleet_cmd(&home).args(["mode", "0", "on"]).assert().code(4);
}

#[test]
fn test_mode_unknown_address() {
    let home = TempDir::new().unwrap();
    fleet_cmd(&home)
        .args(["mode", "10.0.0.99", "off"])
        .assert()
        .code(4);
}

#[test]
fn test_brightness_accepts_negative_percent() {
    let home = TempDir::new().unwrap();
    // Parses, then fails on the empty registry rather than on usage.
    fleet_cmd(&home)
        .args(["brightness", "0", "-5"])
        .assert()
        .code(4);
}

#[test]
fn test_call_rejects_malformed_payload() {
    let home = TempDir::new().unwrap();
    fleet_cmd(&home)
        .args(["call", "10.0.0.99", "led/mode", "{not json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid JSON"));
}

#[test]
fn test_bad_output_in_config() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("config.toml"),
        "[defaults]\noutput = \"xml\"\n",
    )
    .unwrap();
    let output = fleet_cmd(&home).arg("list").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("defaults.output"));
}

#[test]
fn test_watch_requires_telemetry() {
    let home = TempDir::new().unwrap();
    let output = fleet_cmd(&home).arg("watch").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("telemetry.enabled"));
}

#[test]
fn test_info_unreachable_device() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let home = TempDir::new().unwrap();
    fleet_cmd(&home)
        .args(["info", &address])
        .assert()
        .code(7)
        .stdout(predicate::str::contains("Error connecting device"));
}

// ── Against a device ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_add_then_list() {
    let (_server, address) = device("F").await;
    let home = TempDir::new().unwrap();

    fleet_cmd(&home)
        .args(["add", &address])
        .assert()
        .success()
        .stderr(predicate::str::contains("#0"));

    let output = fleet_cmd(&home)
        .args(["list", "-o", "json-compact"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed[0][&address]["mac"], "98:cd:ac:12:34:56");

    fleet_cmd(&home)
        .args(["list", "-o", "plain"])
        .assert()
        .success()
        .stdout(format!("{address}\n"));

    fleet_cmd(&home)
        .args(["add", &address])
        .assert()
        .code(6)
        .stdout(predicate::str::contains(r#"{"code":1,"message":"already exists"}"#));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_info_table() {
    let (_server, address) = device("D").await;
    let home = TempDir::new().unwrap();

    fleet_cmd(&home)
        .args(["info", &address])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Twinkly_tree")
                .and(predicate::str::contains("legacy")),
        );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_returns_device_reply() {
    let (server, address) = device("F").await;
    Mock::given(method("GET"))
        .and(path("/xled/v1/led/mode"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"mode": "movie", "code": 1000})),
        )
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let output = fleet_cmd(&home)
        .args(["call", &address, "led/mode", "-o", "json-compact"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let reply: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reply, json!({"mode": "movie", "code": 1000}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_preserves_device_rejection() {
    let (server, address) = device("F").await;
    Mock::given(method("POST"))
        .and(path("/xled/v1/led/effects/current"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad effect"))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    fleet_cmd(&home)
        .args(["call", &address, "led/effects/current", r#"{"effect_id":99}"#])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#"{"code":400,"message":"bad effect"}"#));
}
