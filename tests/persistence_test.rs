#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use serde_json::json;
use std::process::Command;
use tempfile::tempdir;

mod common;
use common::{Script, create_transaction_line, seeded};

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("marketflow_db");

    // First run: seed the directory, create a transaction, open a dispute.
    let script1 = seeded()
        .push(create_transaction_line())
        .push(json!({"op": "open_dispute", "actor": 2, "transaction_id": 1, "reason": "late"}))
        .into_temp_file();

    let mut cmd1 = Command::new(cargo_bin!("marketflow"));
    cmd1.arg(script1.path()).arg("--db-path").arg(&db_path);
    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains(r#""status":"PENDING""#));

    // Second run against the same database: everything is still there, and
    // the one-dispute-per-transaction rule holds across restarts.
    let script2 = Script::new()
        .push(json!({"op": "show_transaction", "actor": 2, "transaction_id": 1}))
        .push(json!({"op": "open_dispute", "actor": 1, "transaction_id": 1, "reason": "again"}))
        .push(json!({"op": "show_dispute", "actor": 3, "dispute_id": 1}))
        .into_temp_file();

    let mut cmd2 = Command::new(cargo_bin!("marketflow"));
    cmd2.arg(script2.path()).arg("--db-path").arg(&db_path);
    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    assert!(stdout2.contains(r#""total":"200""#));
    assert!(stdout2.contains(r#""status":409"#));
    assert!(stdout2.contains(r#""reason":"late""#));
}
