//! CLI integration tests
//!
//! Tests the lennut CLI using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn lennut() -> Command {
    Command::cargo_bin("lennut")
        .expect("Failed to locate lennut binary - ensure it's built before running tests")
}

#[test]
fn test_cli_help() {
    lennut()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reverse TCP tunnel"))
        .stdout(predicate::str::contains("broker"))
        .stdout(predicate::str::contains("agent"));
}

#[test]
fn test_cli_version() {
    lennut()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lennut"));
}

#[test]
fn test_cli_broker_help() {
    lennut()
        .args(["broker", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--bind-proxy"))
        .stdout(predicate::str::contains("--bind-client"));
}

#[test]
fn test_cli_agent_help() {
    lennut()
        .args(["agent", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--server-addr"))
        .stdout(predicate::str::contains("--proxy-to"));
}

#[test]
fn test_cli_requires_subcommand() {
    lennut().assert().failure();
}

#[test]
fn test_broker_bind_failure_exits_nonzero() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap().to_string();

    lennut()
        .args(["broker", "--bind-proxy", &addr, "--bind-client", "127.0.0.1:0"])
        .env_remove("LENNUT_BIND_PROXY")
        .env_remove("LENNUT_BIND_CLIENT")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to bind inbound listener"));
}

#[test]
fn test_broker_missing_explicit_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    lennut()
        .arg("--config")
        .arg(&missing)
        .arg("broker")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.toml");

    lennut()
        .arg("--config")
        .arg(&path)
        .args(["config", "init", "agent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert!(path.exists());

    lennut()
        .arg("--config")
        .arg(&path)
        .args(["config", "show", "agent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("broker_address = \"localhost:3001\""))
        .stdout(predicate::str::contains("multiplier = 1.5"));

    // Refuses to clobber without --force
    lennut()
        .arg("--config")
        .arg(&path)
        .args(["config", "init", "agent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_show_broker_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broker.toml");
    std::fs::write(&path, "queue_capacity = 8\n").unwrap();

    lennut()
        .arg("--config")
        .arg(&path)
        .args(["config", "show", "broker"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queue_capacity = 8"))
        .stdout(predicate::str::contains("inbound_address = \"0.0.0.0:3000\""));
}
