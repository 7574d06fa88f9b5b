use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn disconf_cmd(config_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("disconf"));
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .arg("--config-dir")
        .arg(config_dir);
    cmd
}

#[test]
fn options_json_reports_provenance() {
    let dir = TempDir::new().expect("config dir");
    fs::write(dir.path().join("disconf.properties"), "env=staging\n").expect("bootstrap");

    let output = disconf_cmd(dir.path())
        .args(["--set", "app=shop", "options", "--json"])
        .output()
        .expect("run disconf");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    let find = |key: &str| {
        json["options"]
            .as_array()
            .unwrap()
            .iter()
            .find(|o| o["key"] == key)
            .cloned()
            .unwrap()
    };
    assert_eq!(find("app")["value"], "shop");
    assert_eq!(find("app")["source"], "explicit");
    assert_eq!(find("env")["source"], "file");
    assert_eq!(find("version")["source"], "default");
    assert!(json["bootstrap_file"]
        .as_str()
        .unwrap()
        .ends_with("disconf.properties"));
}

#[test]
fn options_table_warns_without_bootstrap_file() {
    let dir = TempDir::new().expect("config dir");
    disconf_cmd(dir.path())
        .arg("options")
        .assert()
        .success()
        .stdout(contains("conf_server_host"))
        .stdout(contains("default"))
        .stderr(contains("no bootstrap file"));
}

#[test]
fn custom_bootstrap_file_name_is_used() {
    let dir = TempDir::new().expect("config dir");
    fs::write(dir.path().join("client.properties"), "app=from_custom\n").expect("bootstrap");
    disconf_cmd(dir.path())
        .args(["--file", "client.properties", "options"])
        .assert()
        .success()
        .stdout(contains("from_custom"));
}

#[test]
fn unknown_set_key_is_rejected() {
    let dir = TempDir::new().expect("config dir");
    disconf_cmd(dir.path())
        .args(["--set", "colour=red", "options"])
        .assert()
        .failure()
        .stderr(contains("unknown option"));
}

#[test]
fn malformed_bootstrap_value_fails_with_key_name() {
    let dir = TempDir::new().expect("config dir");
    fs::write(dir.path().join("disconf.properties"), "enable_remote=perhaps\n").expect("bootstrap");
    disconf_cmd(dir.path())
        .arg("options")
        .assert()
        .failure()
        .stderr(contains("enable_remote"));
}

#[test]
fn run_once_with_remote_disabled_is_ready_immediately() {
    let dir = TempDir::new().expect("config dir");
    disconf_cmd(dir.path())
        .args(["run", "--once"])
        .assert()
        .success()
        .stdout(contains("remote sync disabled"));
    assert!(!dir.path().join("remote.properties").exists());
}

#[test]
fn fetch_without_server_host_fails_fast() {
    let dir = TempDir::new().expect("config dir");
    disconf_cmd(dir.path())
        .args(["--set", "app=shop", "fetch", "item", "timeout"])
        .assert()
        .failure()
        .stderr(contains("conf_server_host"));
}

#[test]
fn fetch_rejects_unknown_kind() {
    let dir = TempDir::new().expect("config dir");
    disconf_cmd(dir.path())
        .args(["fetch", "folder", "x"])
        .assert()
        .failure()
        .stderr(contains("unknown config kind"));
}
