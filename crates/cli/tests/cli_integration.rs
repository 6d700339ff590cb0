//! CLI integration tests for the `a2p` binary.
//!
//! Uses `assert_cmd` to spawn the binary and verify exit codes, stdout
//! content, and stderr content. Every test starts from a scrubbed
//! environment so the developer's own credentials never leak in.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CONFIG_VARS: &[&str] = &[
    "TWILIO_ACCOUNT_SID",
    "TWILIO_AUTH_TOKEN",
    "A2P_BASE_URL",
    "A2P_API_KEY",
    "A2P_RATE_LIMIT",
    "A2P_ACTIVITY_CAPACITY",
    "A2P_DATA_FILE",
    "A2P_TRUSTHUB_URL",
    "A2P_MESSAGING_URL",
    "A2P_API_URL",
    "RUST_LOG",
];

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// The `a2p` binary with no configuration in its environment.
fn a2p() -> Command {
    let mut cmd = cargo_bin_cmd!("a2p");
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// The `a2p` binary with the required configuration set.
fn configured() -> Command {
    let mut cmd = a2p();
    cmd.env("TWILIO_ACCOUNT_SID", "AC0000000000")
        .env("TWILIO_AUTH_TOKEN", "test-token")
        .env("A2P_BASE_URL", "https://a2p.example.com");
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    a2p()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("A2P 10DLC registration service"));
}

#[test]
fn help_lists_subcommands() {
    a2p()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("check-config"));
}

#[test]
fn version_exits_0() {
    a2p()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("a2p"));
}

#[test]
fn unknown_subcommand_fails() {
    a2p().arg("frobnicate").assert().failure();
}

// ──────────────────────────────────────────────
// 2. Configuration
// ──────────────────────────────────────────────

#[test]
fn check_config_without_credentials_fails() {
    a2p()
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TWILIO_ACCOUNT_SID is required"));
}

#[test]
fn serve_without_credentials_exits_before_binding() {
    a2p()
        .args(["serve", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"));
}

#[test]
fn check_config_reports_settings() {
    configured()
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration OK"))
        .stdout(predicate::str::contains("AC0000000000"))
        .stdout(predicate::str::contains("test-token").not());
}

#[test]
fn check_config_rejects_non_http_base_url() {
    configured()
        .env("A2P_BASE_URL", "ftp://a2p.example.com")
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("A2P_BASE_URL is invalid"));
}

#[test]
fn check_config_reads_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a2p.toml");
    fs::write(
        &path,
        r#"
base_url = "http://localhost:8080"
rate_limit = 5

[twilio]
account_sid = "ACfromfile"
auth_token = "file-token"
"#,
    )
    .unwrap();

    a2p()
        .args(["--output", "json", "check-config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"accountSid\": \"ACfromfile\""))
        .stdout(predicate::str::contains("\"rateLimit\": 5"));
}

#[test]
fn missing_config_file_fails() {
    configured()
        .args(["check-config", "--config", "/nonexistent/a2p.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

// ──────────────────────────────────────────────
// 3. register / show
// ──────────────────────────────────────────────

#[test]
fn register_reports_the_failing_stage() {
    let dir = TempDir::new().unwrap();
    let data_file = dir.path().join("registrations.json");

    // Nothing listens on port 9, so the first provider call fails.
    configured()
        .env("A2P_TRUSTHUB_URL", "http://127.0.0.1:9")
        .env("A2P_DATA_FILE", &data_file)
        .arg("register")
        .arg(fixture("acme-form.json"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Failed to create customer profile"));

    let snapshot = fs::read_to_string(&data_file).unwrap();
    let snapshot: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    let registration = &snapshot["registrations"][0];
    assert_eq!(registration["status"], "rejected");
    assert_eq!(registration["userId"], "cli");
    assert_eq!(registration["steps"]["customerProfile"]["status"], "failed");
    assert_eq!(registration["steps"]["trustProduct"]["status"], "pending");
}

#[test]
fn register_rejects_an_invalid_form() {
    let dir = TempDir::new().unwrap();
    let form = dir.path().join("form.json");
    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(fixture("acme-form.json")).unwrap()).unwrap();
    value["useCase"] = serde_json::json!("SPAM");
    fs::write(&form, value.to_string()).unwrap();

    configured()
        .arg("register")
        .arg(&form)
        .assert()
        .failure()
        .stderr(predicate::str::contains("useCase"));
}

#[test]
fn show_without_data_file_fails() {
    a2p()
        .args(["show", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("A2P_DATA_FILE"));
}

#[test]
fn show_unknown_registration_fails() {
    let dir = TempDir::new().unwrap();
    a2p()
        .args(["show", "doesnotexist", "--data-file"])
        .arg(dir.path().join("empty.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no registration with id 'doesnotexist'"));
}

#[test]
fn show_prints_a_registration_created_by_register() {
    let dir = TempDir::new().unwrap();
    let data_file = dir.path().join("registrations.json");

    configured()
        .env("A2P_TRUSTHUB_URL", "http://127.0.0.1:9")
        .env("A2P_DATA_FILE", &data_file)
        .args(["register", "--user-id", "loc-7"])
        .arg(fixture("acme-form.json"))
        .assert()
        .failure();

    let snapshot: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&data_file).unwrap()).unwrap();
    let id = snapshot["registrations"][0]["id"].as_str().unwrap().to_string();

    a2p()
        .args(["show", &id, "--data-file"])
        .arg(&data_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("owner:   loc-7"))
        .stdout(predicate::str::contains("Acme Realty"))
        .stdout(predicate::str::contains("rejected"));
}
