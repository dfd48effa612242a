use std::process::Command;

fn run(fixture: &str) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let output = Command::new(env!("CARGO_BIN_EXE_ledger-eng"))
        .arg(&path)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn valid_commands() {
    let (stdout, stderr, success) = run("valid.csv");

    assert!(success);
    assert!(stderr.is_empty());

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "id,owner,type,balance");
    assert_eq!(lines[1], "1,1,savings,75.00");
    assert_eq!(lines[2], "2,2,current,75.00");
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success) = run("with_errors.csv");

    assert!(success);
    assert!(stderr.contains("unrecognized op"));
    assert!(stderr.contains("transfer missing amount"));

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "id,owner,type,balance");
    assert_eq!(lines[1], "1,1,savings,75.00");
    assert_eq!(lines[2], "2,2,current,75.00");
}

#[test]
fn rejected_transfers_leave_balances_unchanged() {
    let (stdout, _stderr, success) = run("rejected.csv");

    assert!(success);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "id,owner,type,balance");
    // same-owner and over-cap transfers were skipped, seed balances survive
    assert_eq!(lines[1], "1,1,savings,100.00");
    assert_eq!(lines[2], "2,1,current,0.00");
    assert_eq!(lines[3], "3,2,basicSavings,49990.00");
}
