//! Integration tests for the `vpnfleet` CLI binary.
//!
//! Everything runs against temporary config files; the only network
//! traffic is a refused connection to a local port nobody listens on.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const SAMPLE: &str = r#"
[node]
management_timeout_secs = 2

[[pools]]
id = "internet"
display_name = "Internet Access"
host_name = "vpn.example.org"
range = "10.42.42.0/24"
range6 = "fd00:4242:4242::/48"
dns = ["9.9.9.9"]
use_nat = true
default_gateway = true
"#;

/// Build a [`Command`] for the `vpnfleet` binary with env isolation.
fn vpnfleet_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("vpnfleet");
    cmd.env("HOME", "/tmp/vpnfleet-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/vpnfleet-cli-test-nonexistent")
        .env_remove("VPNFLEET_CONFIG")
        .env_remove("VPNFLEET_OUTPUT")
        .env_remove("VPNFLEET_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, text).unwrap();
    path
}

/// A local port with nothing listening on it.
fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn servers_only_config(port: u16) -> String {
    format!(
        "[node]\nmanagement_timeout_secs = 1\n\n\
         [[servers]]\nid = \"legacy\"\ndisplay_name = \"Legacy\"\nendpoint = \"127.0.0.1:{port}\"\n"
    )
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = vpnfleet_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    vpnfleet_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("topology")
            .and(predicate::str::contains("generate"))
            .and(predicate::str::contains("load-stats"))
            .and(predicate::str::contains("kill")),
    );
}

#[test]
fn test_version_flag() {
    vpnfleet_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vpnfleet"));
}

#[test]
fn test_completions_zsh() {
    vpnfleet_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    vpnfleet_cmd()
        .args(["config", "path", "--config", "/etc/vpnfleet/fleet.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/etc/vpnfleet/fleet.toml"));
}

#[test]
fn test_config_validate_ok() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), SAMPLE);

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 pools, 4 instances, 4 servers"));
}

#[test]
fn test_config_validate_reports_bad_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), &SAMPLE.replace("10.42.42.0/24", "fd00::/48"));

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "validate"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("pools[0].range"));
}

#[test]
fn test_config_validate_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    vpnfleet_cmd()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .args(["config", "validate"])
        .assert()
        .code(3);
}

#[test]
fn test_config_show_renders_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), SAMPLE);

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[[pools]]").and(predicate::str::contains("internet")));
}

// ── topology ────────────────────────────────────────────────────────

#[test]
fn test_topology_plain_lists_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), SAMPLE);

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .args(["topology", "-o", "plain"])
        .assert()
        .success()
        .stdout("internet-0\ninternet-1\ninternet-2\ninternet-3\n");
}

#[test]
fn test_topology_json_marks_last_instance_tcp() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), SAMPLE);

    let output = vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .args(["topology", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let planned: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let planned = planned.as_array().unwrap();
    assert_eq!(planned.len(), 4);
    assert_eq!(planned[0]["proto"], "udp");
    assert_eq!(planned[3]["proto"], "tcp");
    assert_eq!(planned[3]["range"], "10.42.42.192/26");
}

#[test]
fn test_topology_without_pools() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "");

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .arg("topology")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No pools configured"));
}

// ── generate ────────────────────────────────────────────────────────

#[test]
fn test_generate_firewall_writes_both_families() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), SAMPLE);
    let out = dir.path().join("fw");

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .args(["generate", "firewall", "--out-dir"])
        .arg(&out)
        .assert()
        .success();

    let v4 = std::fs::read_to_string(out.join("iptables")).unwrap();
    let v6 = std::fs::read_to_string(out.join("ip6tables")).unwrap();
    assert!(v4.starts_with("*nat"));
    assert!(v4.contains("10.42.42.0/24"));
    assert!(v6.contains("fd00:4242:4242::/48"));
    assert!(v4.trim_end().ends_with("COMMIT"));
}

#[test]
fn test_generate_server_config_one_file_per_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), SAMPLE);
    let out = dir.path().join("conf");

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .args(["generate", "server-config", "--out-dir"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("internet-3.conf"));

    for i in 0..4 {
        let text = std::fs::read_to_string(out.join(format!("internet-{i}.conf"))).unwrap();
        assert!(text.contains(&format!("dev tun-internet-{i}")));
        assert!(text.contains(&format!("management 127.42.0.1 {}", 11940 + i)));
    }
}

#[test]
fn test_generate_firewall_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), SAMPLE);

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .args(["generate", "firewall"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("# ==> iptables <==")
                .and(predicate::str::contains("# ==> ip6tables <==")),
        );
}

// ── fleet ───────────────────────────────────────────────────────────

#[test]
fn test_status_without_servers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "");

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .arg("status")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No servers configured"));
}

#[test]
fn test_load_stats_unreachable_fleet() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), &servers_only_config(dead_port()));

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .args(["load-stats", "--color", "never"])
        .assert()
        .code(7)
        .stdout(predicate::str::contains("legacy").and(predicate::str::contains("down")));
}

#[test]
fn test_kill_requires_yes_without_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), &servers_only_config(dead_port()));

    vpnfleet_cmd()
        .arg("--config")
        .arg(&path)
        .args(["kill", "alice"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_invalid_output_format() {
    let output = vpnfleet_cmd()
        .args(["--output", "xml", "topology"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}
