// CLI integration tests: drive the binary against a throwaway state directory

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn shop(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("shop-workflow").unwrap();
    cmd.current_dir(dir)
        .env_remove("SHOP_WORKFLOW_USER")
        .env_remove("RUST_LOG")
        .env("SHOP_WORKFLOW_IDENTITY__STAFF", "lara,sam")
        .arg("--state-dir")
        .arg(dir);
    cmd
}

fn submit_print(dir: &Path, email: &str) -> String {
    let output = shop(dir)
        .args(["--as", email, "submit"])
        .args(["--customer-name", "Ada Student", "--customer-email", email])
        .args(["--file", "bracket.stl", "--comments", "matte please"])
        .args(["print3d", "--quantity", "2", "--color", "red"])
        .output()
        .unwrap();
    assert!(output.status.success(), "submit failed: {output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("📄 Request "))
        .map(|id| id.trim().to_string())
        .expect("submit output names the new request")
}

#[test]
fn test_no_command_shows_getting_started() {
    let dir = TempDir::new().unwrap();
    shop(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Shop Workflow"))
        .stdout(predicate::str::contains("shop-workflow status"));
}

#[test]
fn test_help_lists_workflow_commands() {
    let dir = TempDir::new().unwrap();
    shop(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("add-to-cart"))
        .stdout(predicate::str::contains("advance"));
}

#[test]
fn test_assign_start_cancel_then_start_rejected() {
    let dir = TempDir::new().unwrap();
    let id = submit_print(dir.path(), "ada@uni.edu");

    shop(dir.path())
        .args(["list", "--stage", "UNFULFILLED"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&id))
        .stdout(predicate::str::contains("[Assign]"));

    shop(dir.path())
        .args(["--as", "lara", "assign", id.as_str(), "lara"])
        .assert()
        .success()
        .stdout(predicate::str::contains("UNFULFILLED → ASSIGNED"));

    shop(dir.path())
        .args(["--as", "lara", "advance", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ASSIGNED → IN_PROGRESS"));

    shop(dir.path())
        .args(["--as", "lara", "cancel", id.as_str(), "--reason", "printer down"])
        .assert()
        .success()
        .stdout(predicate::str::contains("IN_PROGRESS → CANCELED"))
        .stdout(predicate::str::contains("printer down"));

    shop(dir.path())
        .args(["--as", "lara", "start", id.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot start a request that is CANCELED"));
}

#[test]
fn test_customer_cannot_assign() {
    let dir = TempDir::new().unwrap();
    let id = submit_print(dir.path(), "ada@uni.edu");

    shop(dir.path())
        .args(["--as", "ada@uni.edu", "assign", id.as_str(), "lara"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("customer may not assign"));

    shop(dir.path())
        .args(["show", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("UNFULFILLED"));
}

#[test]
fn test_actions_need_an_acting_user() {
    let dir = TempDir::new().unwrap();
    let id = submit_print(dir.path(), "ada@uni.edu");

    shop(dir.path())
        .args(["start", id.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no acting user"));
}

#[test]
fn test_customer_adds_ready_request_to_cart() {
    let dir = TempDir::new().unwrap();
    let id = submit_print(dir.path(), "ada@uni.edu");

    for args in [
        vec!["--as", "sam", "advance", id.as_str(), "--technician", "sam"],
        vec!["--as", "sam", "start", id.as_str()],
        vec!["--as", "sam", "ready", id.as_str()],
    ] {
        shop(dir.path()).args(args).assert().success();
    }

    shop(dir.path())
        .args(["--as", "ada@uni.edu", "add-to-cart", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("READY_FOR_PICKUP → FINISHED"));

    let cart = std::fs::read_to_string(dir.path().join("cart.jsonl")).unwrap();
    let lines: Vec<serde_json::Value> = cart
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["request_id"], id.as_str());
    assert_eq!(lines[0]["total_cents"], 1000);

    shop(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Open requests: 0"));
}

#[test]
fn test_unknown_request_is_not_found() {
    let dir = TempDir::new().unwrap();
    shop(dir.path())
        .args(["--as", "lara", "start", "00000000-0000-0000-0000-000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
