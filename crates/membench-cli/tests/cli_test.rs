//! Runs the real `membench` binary against the simulated devices.

use std::process::{Command, Output};

fn membench(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_membench"))
        .args(args)
        .output()
        .expect("failed to spawn membench")
}

#[test]
fn test_run_prints_table_on_stdout() {
    let output = membench(&[
        "run", "--kind", "buf2buf", "--min-size", "1", "--max-size", "1", "-g", "2", "-l", "3",
        "--seed", "5",
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Device: Simulated Discrete GPU"), "{}", stdout);
    assert!(stdout.contains("B->B:3"), "{}", stdout);
    assert!(!stdout.contains("B->B:4"), "{}", stdout);
    println!("[PASS] table on stdout:\n{}", stdout);
}

#[test]
fn test_logs_go_to_stderr() {
    let output = membench(&[
        "-v", "run", "--dump", "--kind", "buf2buf", "--min-size", "1", "--max-size", "1",
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.starts_with("dump buf2buf:"), "{}", stdout);
    assert!(stderr.contains("INFO"), "{}", stderr);
    assert!(!stdout.contains("INFO"));
    println!("[PASS] dump line on stdout, logs on stderr");
}

#[test]
fn test_bad_configuration_exits_with_two() {
    let output = membench(&["run", "--loops", "0"]);
    assert_eq!(output.status.code(), Some(2));
    let output = membench(&["run", "--device", "9"]);
    assert_eq!(output.status.code(), Some(2));
    println!("[PASS] configuration errors exit with 2");
}

#[test]
fn test_list_devices() {
    let output = membench(&["list"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Simulated Discrete GPU"));
    assert!(stdout.contains("Simulated Integrated GPU"));
    println!("[PASS] list shows both presets");
}
