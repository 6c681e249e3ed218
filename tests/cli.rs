use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("tubedigest")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("summarize"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("platforms"));
}

#[test]
fn test_version_flag() {
    Command::cargo_bin("tubedigest")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tubedigest"));
}

#[test]
fn test_summarize_requires_url_and_instruction() {
    Command::cargo_bin("tubedigest")
        .unwrap()
        .arg("summarize")
        .assert()
        .failure()
        .stderr(predicate::str::contains("URL"));
}

#[test]
fn test_unknown_subcommand_fails() {
    Command::cargo_bin("tubedigest")
        .unwrap()
        .arg("transmogrify")
        .assert()
        .failure();
}
