use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn serve_refuses_non_loopback_without_public() {
    Command::new(assert_cmd::cargo::cargo_bin!("tabula"))
        .env("TABULA_SYNTH_MODE", "heuristic")
        .args(["serve", "--bind", "0.0.0.0:0"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Refusing to bind"))
        .stderr(predicates::str::contains("[server] bind \"0.0.0.0:0\""));
}

#[test]
fn serve_fails_at_startup_without_data() {
    let temp = tempfile::tempdir().unwrap();
    Command::new(assert_cmd::cargo::cargo_bin!("tabula"))
        .current_dir(temp.path())
        .env("TABULA_SYNTH_MODE", "heuristic")
        .args(["serve", "--bind", "127.0.0.1:0", "--data", "missing.csv"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Failed to load data file"));
}

#[test]
fn serve_in_openai_mode_requires_a_key() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("data.csv"), "a\n1\n").unwrap();
    Command::new(assert_cmd::cargo::cargo_bin!("tabula"))
        .current_dir(temp.path())
        .env("TABULA_SYNTH_MODE", "openai")
        .env_remove("OPENAI_API_KEY")
        .args(["serve", "--bind", "127.0.0.1:0", "--data", "data.csv"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("OPENAI_API_KEY"));
}
