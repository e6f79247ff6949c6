use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

#[test]
fn test_malformed_csv_handling() {
    let csv = common::operations_file(&[
        ["open", "A", "client", "a@example.com", "", "", "", "", "", ""],
        // Unknown operation type
        ["withdraw", "A", "", "", "", "1", "", "", "W-1", ""],
        // Text in amount field
        ["top_up", "A", "", "", "", "not_a_number", "mtn_momo", "76123456", "TOPUP-1", ""],
        // Missing reference
        ["top_up", "A", "", "", "", "5", "mtn_momo", "76123456", "", ""],
        // Valid top-up
        ["top_up", "A", "", "", "", "5", "mtn_momo", "76123456", "TOPUP-2", ""],
    ]);

    let mut cmd = Command::new(cargo_bin!("wallet"));
    cmd.arg("run")
        .arg(csv.path())
        .arg("--config")
        .arg(common::INSTANT_CONFIG);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading operation"))
        .stderr(predicate::str::contains("kind=invalid_input"))
        .stdout(predicate::str::contains("A,client,a@example.com,5.00"));
}

#[test]
fn test_rejected_operations_leave_balances_untouched() {
    let csv = common::operations_file(&[
        ["open", "A", "client", "a@example.com", "", "", "", "", "", ""],
        ["top_up", "A", "", "", "", "100", "paypal", "76123456", "TOPUP-1", ""],
        ["top_up", "A", "", "", "", "100", "mtn_momo", "12345", "TOPUP-2", ""],
        ["top_up", "GHOST", "", "", "", "100", "mtn_momo", "76123456", "TOPUP-3", ""],
        ["transfer", "A", "", "b@example.com", "B", "10", "", "", "T-1", ""],
        ["transfer", "A", "", "a@example.com", "A", "10", "", "", "T-2", ""],
    ]);

    let mut cmd = Command::new(cargo_bin!("wallet"));
    cmd.arg("run")
        .arg(csv.path())
        .arg("--config")
        .arg(common::INSTANT_CONFIG);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("kind=unknown_payment_method"))
        .stderr(predicate::str::contains("kind=gateway_terminal"))
        .stderr(predicate::str::contains("kind=user_not_found"))
        .stderr(predicate::str::contains("kind=insufficient_balance"))
        .stdout(predicate::str::contains("A,client,a@example.com,0.00"))
        // The receiver of a payment is opened even when the payment fails.
        .stdout(predicate::str::contains("B,merchant,b@example.com,0.00"))
        .stdout(predicate::str::contains("GHOST").not());
}
