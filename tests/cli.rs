use assert_cmd::Command;
use predicates::prelude::*;

fn imap_backup() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env_remove("IMAP_SERVER")
        .env_remove("IMAP_USER")
        .env_remove("IMAP_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    imap_backup()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("backup"))
        .stdout(predicate::str::contains("sizes"))
        .stdout(predicate::str::contains("IMAP_SERVER"));
}

#[test]
fn backup_help_shows_output() {
    imap_backup()
        .args(&["backup", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--path"));
}

#[test]
fn password_is_not_shown_in_help() {
    imap_backup()
        .env("IMAP_PASSWORD", "hunter2")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn missing_server_is_rejected() {
    imap_backup()
        .args(&["--user", "u", "--password", "p", "sizes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--server"));
}

#[test]
fn missing_subcommand_is_rejected() {
    imap_backup()
        .args(&["--server", "localhost", "--user", "u", "--password", "p"])
        .assert()
        .failure();
}

#[test]
fn invalid_port_fails_before_connecting() {
    imap_backup()
        .args(&["--server", "localhost:imaps", "--user", "u", "--password", "p"])
        .args(&["sizes", "--quiet"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error: invalid port \"imaps\""));
}

#[test]
fn connection_failure_exits_with_error() {
    let output = tempfile::tempdir().unwrap();
    imap_backup()
        .env("IMAP_SERVER", "127.0.0.1:1")
        .env("IMAP_USER", "u")
        .env("IMAP_PASSWORD", "p")
        .arg("backup")
        .arg("--quiet")
        .arg("--output")
        .arg(output.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error: failed to connect to 127.0.0.1:1"));
    // Nothing is written when the server cannot be reached.
    assert_eq!(output.path().read_dir().unwrap().count(), 0);
}
