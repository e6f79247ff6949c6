use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("wallet"));
    cmd.arg("run")
        .arg("tests/fixtures/operations.csv")
        .arg("--config")
        .arg(common::INSTANT_CONFIG);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("account,role,contact,balance"))
        .stdout(predicate::str::contains("A,client,a@example.com,60.00"))
        .stdout(predicate::str::contains("SHOP,merchant,shop@example.com,40.00"))
        // The second invoice exceeds the remaining balance.
        .stderr(predicate::str::contains("kind=insufficient_balance"));

    Ok(())
}

#[test]
fn test_cli_history_of_client() {
    let mut cmd = Command::new(cargo_bin!("wallet"));
    cmd.arg("run")
        .arg("tests/fixtures/operations.csv")
        .arg("--config")
        .arg(common::INSTANT_CONFIG)
        .arg("--history")
        .arg("A");

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);

    let history: Vec<&str> = stdout.split("\n\n").nth(1).unwrap().lines().collect();
    assert_eq!(
        history[0],
        "timestamp,kind,status,payer,receiver,amount,fees,reference,description"
    );
    // Newest first; the rejected invoice left no record.
    assert_eq!(history.len(), 3);
    assert!(history[1].contains(",invoice_payment,completed,A,SHOP,40.00,,INV-1,"));
    assert!(history[2].contains(",top_up,completed,A,A,100.00,2.50,TOPUP-1,"));
}

#[test]
fn test_cli_methods() {
    let mut cmd = Command::new(cargo_bin!("wallet"));
    cmd.arg("methods");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "id,name,type,min_amount,max_amount,fixed_fee,percentage_fee,processing_time",
        ))
        .stdout(predicate::str::contains("fnb,FNB Eswatini,bank,50,100000,5,0.2,1-2 hours"))
        .stdout(predicate::str::contains("nedbank,Nedbank,bank"));
}

#[test]
fn test_cli_missing_input_fails() {
    let mut cmd = Command::new(cargo_bin!("wallet"));
    cmd.arg("run").arg("tests/fixtures/does_not_exist.csv");

    cmd.assert().failure();
}
