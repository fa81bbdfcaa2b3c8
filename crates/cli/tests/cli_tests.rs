//! CLI integration tests

use std::process::Command;

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "demand-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("bike rental demand"), "Should show app description");
    assert!(stdout.contains("train"), "Should show train command");
    assert!(stdout.contains("status"), "Should show status command");
    assert!(stdout.contains("predict"), "Should show predict command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_cli(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("bikedemand"), "Should show binary name");
}

/// Test train subcommand help
#[test]
fn test_train_help() {
    let output = run_cli(&["train", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Train help should succeed");
    assert!(stdout.contains("--dataset"), "Should show dataset option");
    assert!(stdout.contains("--split-date"), "Should show split date option");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let output = run_cli(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    for flag in ["--season", "--hr", "--weathersit", "--actual"] {
        assert!(stdout.contains(flag), "Should show {} option", flag);
    }
}

/// Status on an empty directory reports every artifact as missing
#[test]
fn test_status_on_empty_dir() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_cli(&[
        "status",
        "--format",
        "json",
        "--artifacts-dir",
        dir.path().to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Status should succeed without artifacts");
    assert!(stdout.contains("\"loadable\": false"));
    assert!(stdout.contains("model.bin"));
}

/// Predict without artifacts fails with a non-zero exit
#[test]
fn test_predict_without_artifacts_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_cli(&[
        "predict",
        "--artifacts-dir",
        dir.path().to_str().unwrap(),
        "--season", "2", "--mnth", "6", "--hr", "8", "--holiday", "0", "--weekday", "3",
        "--workingday", "1", "--weathersit", "1", "--temp", "0.5", "--hum", "0.6",
        "--windspeed", "0.2",
    ]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Missing artifacts"), "stderr = {}", stderr);
}
