//! End-to-end tests for the `capture` binary

use std::process::{Command, Output};

fn capture(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_capture"))
        .args(args)
        .output()
        .expect("failed to run capture")
}

#[test]
fn test_run_prints_captured_stdout() {
    let output = capture(&["run", "--", "printf 'a\\nb\\n' ; printf 'err\\n' 1>&2"]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "a\nb\n");
    // stderr lines are logged as warnings
    assert!(String::from_utf8_lossy(&output.stderr).contains("err"));
}

#[test]
fn test_run_propagates_exit_code() {
    let output = capture(&["run", "--", "echo partial; exit 7"]);

    assert_eq!(output.status.code(), Some(7));
    // partial stdout is kept for diagnostics
    assert_eq!(String::from_utf8_lossy(&output.stdout), "partial\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("exit code 7"));
}

#[test]
fn test_run_no_shell() {
    let output = capture(&["run", "--no-shell", "--", "echo", "$HOME"]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "$HOME\n");
}

#[test]
fn test_flush_trailing_flag() {
    let output = capture(&["--flush-trailing", "run", "--", "printf 'x\\ny'"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "x\ny");

    let output = capture(&["run", "--", "printf 'x\\ny'"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "x\n");
}

#[test]
fn test_config_file_is_applied() {
    let temp = tempfile::tempdir().unwrap();
    let config = temp.path().join("capture.yaml");
    std::fs::write(&config, "trailing_line: flush\nchunk_size: 1\n").unwrap();

    let output = capture(&[
        "--config",
        config.to_str().unwrap(),
        "run",
        "--",
        "printf 'one\\ntwo'",
    ]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "one\ntwo");
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let config = temp.path().join("capture.yaml");
    std::fs::write(&config, "chunk_size: 0\n").unwrap();

    let output = capture(&["--config", config.to_str().unwrap(), "run", "--", "true"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("chunk_size"));
}

#[test]
fn test_chroot_rejects_missing_root() {
    let output = capture(&["chroot", "/definitely/not/a/root", "--", "true"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a directory"));
}
