use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::process::Command;

mod common;
use common::{create_transaction_line, seeded, status_line};

#[test]
fn test_dispute_resolve_flow() {
    let script = seeded()
        .push(create_transaction_line())
        .push(status_line(2, 1, "APPROVED", None))
        .push(status_line(2, 1, "COMPLETED", None))
        .push(json!({"op": "open_dispute", "actor": 2, "transaction_id": 1, "reason": "not as described"}))
        .push(json!({"op": "resolve_dispute", "actor": 3, "dispute_id": 1, "resolution": "refunded"}))
        .into_temp_file();

    let mut cmd = Command::new(cargo_bin!("marketflow"));
    cmd.arg(script.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Created a dispute: not as described"))
        .stdout(predicate::str::contains(r#""status":"RESOLVED""#))
        .stdout(predicate::str::contains(r#""resolution":"refunded""#))
        .stdout(predicate::str::contains("Resolved the dispute: refunded"));
}

#[test]
fn test_second_dispute_conflicts() {
    let script = seeded()
        .push(create_transaction_line())
        .push(json!({"op": "open_dispute", "actor": 2, "transaction_id": 1, "reason": "late"}))
        .push(json!({"op": "open_dispute", "actor": 1, "transaction_id": 1, "reason": "abusive"}))
        .into_temp_file();

    let mut cmd = Command::new(cargo_bin!("marketflow"));
    cmd.arg(script.path());

    cmd.assert().success().stdout(predicate::str::contains(
        r#"{"error":{"message":"a dispute already exists for this transaction","status":409}}"#,
    ));
}

#[test]
fn test_dispute_thread_and_mirroring() {
    let script = seeded()
        .push(create_transaction_line())
        .push(json!({"op": "open_dispute", "actor": 2, "transaction_id": 1, "reason": "late"}))
        .push(json!({"op": "add_dispute_message", "actor": 1, "dispute_id": 1, "message": "on our way"}))
        .push(json!({"op": "show_dispute", "actor": 3, "dispute_id": 1}))
        .push(json!({"op": "list_messages", "actor": 2, "conversation_id": 1}))
        .into_temp_file();

    let mut cmd = Command::new(cargo_bin!("marketflow"));
    cmd.arg(script.path());

    cmd.assert()
        .success()
        // The reason opens the dispute thread; the owner's reply follows.
        .stdout(predicate::str::contains(r#""body":"late""#))
        .stdout(predicate::str::contains(r#""body":"on our way""#))
        // The reply is mirrored into the chat transcript.
        .stdout(predicate::str::contains(
            "Added a message to the dispute: on our way",
        ));
}

#[test]
fn test_resolve_requires_admin() {
    let script = seeded()
        .push(create_transaction_line())
        .push(json!({"op": "open_dispute", "actor": 2, "transaction_id": 1, "reason": "late"}))
        .push(json!({"op": "resolve_dispute", "actor": 2, "dispute_id": 1, "resolution": "done"}))
        .push(json!({"op": "resolve_dispute", "actor": 1, "dispute_id": 1, "resolution": "done"}))
        .into_temp_file();

    let mut cmd = Command::new(cargo_bin!("marketflow"));
    cmd.arg(script.path());

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let denials = stdout
        .lines()
        .filter(|line| line.contains(r#""status":403"#))
        .count();
    assert_eq!(denials, 2);
}

#[test]
fn test_owner_completion_flip_flow() {
    // Owner contests the customer's completion claim, then re-asserts it.
    let script = seeded()
        .push(create_transaction_line())
        .push(status_line(2, 1, "APPROVED", None))
        .push(status_line(2, 1, "COMPLETED", None))
        .push(status_line(1, 1, "INCOMPLETE", Some("never picked up")))
        .push(status_line(1, 1, "COMPLETED", None))
        .into_temp_file();

    let mut cmd = Command::new(cargo_bin!("marketflow"));
    cmd.arg(script.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "marked the transaction as incomplete: never picked up",
        ))
        .stdout(predicate::str::contains(
            "confirmed the transaction is completed.",
        ));
}
