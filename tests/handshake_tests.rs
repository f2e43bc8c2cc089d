// Integration tests for the parent side of the startup handshake
//
// The test process plays the monitor: it spawns handshake-probe as a worker
// with the startup markers, waits for its report, and checks how each way of
// ending startup is classified.

use handshake::daemon::{spawn_worker, LogFile, Monitor, ParentResult};
use handshake::exit_codes::EX_SOFTWARE;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn probe_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_handshake-probe"))
}

fn log_in(dir: &TempDir) -> PathBuf {
    dir.path().join("probed.log")
}

fn spawn_in_child(behavior: &str, log_path: &Path) -> ParentResult {
    let log = LogFile::open(log_path).expect("Failed to open log");
    let args = vec![behavior.to_string(), log_path.display().to_string()];

    let (worker, mut pipe) =
        spawn_worker(&probe_binary(), &args, &log).expect("Failed to spawn worker");
    let result = Monitor::new("probed").wait_for_child_status(&mut pipe, &worker, log_path);

    // The worker may already have been reaped during classification
    let _ = worker.kill();
    let _ = worker.wait();
    result
}

fn diagnostic(what: &str, log_path: &Path) -> String {
    format!(
        "probed {}\nCheck the probed log file at {} for more details",
        what,
        log_path.display()
    )
}

// ============================================================================
// REPORTED OUTCOMES
// ============================================================================

#[test]
fn test_success() {
    let dir = TempDir::new().unwrap();
    let log_path = log_in(&dir);

    let result = spawn_in_child("success", &log_path);

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.error_message, "");
    let contents = fs::read_to_string(&log_path).unwrap();
    assert!(contents.contains("Started probed (pid "), "log was: {:?}", contents);
}

#[test]
fn test_failure() {
    let dir = TempDir::new().unwrap();
    let log_path = log_in(&dir);

    let result = spawn_in_child("failure", &log_path);

    assert_eq!(result.exit_code, 3);
    assert_eq!(result.error_message, "");
    let contents = fs::read_to_string(&log_path).unwrap();
    assert_eq!(contents.lines().last(), Some("example failure"));
}

// ============================================================================
// MISSING REPORTS
// ============================================================================

#[test]
fn test_crash_with_no_result() {
    let dir = TempDir::new().unwrap();
    let log_path = log_in(&dir);

    let result = spawn_in_child("crash-with-no-result", &log_path);

    assert_eq!(result.exit_code, EX_SOFTWARE);
    assert_eq!(
        result.error_message,
        diagnostic(
            "crashed with status killed by signal 9 before it finished initializing",
            &log_path
        )
    );

    // Both the logger and raw stderr end up in the log file
    let contents = fs::read_to_string(&log_path).unwrap();
    assert!(contents.contains("boot message\n"));
    assert!(contents.contains("this message should go to the log\n"));
}

#[test]
fn test_exit_with_no_result() {
    let dir = TempDir::new().unwrap();
    let log_path = log_in(&dir);

    let result = spawn_in_child("exit-with-no-result", &log_path);

    assert_eq!(result.exit_code, 19);
    assert_eq!(
        result.error_message,
        diagnostic("exited with status 19 before it finished initializing", &log_path)
    );
}

#[test]
fn test_exit_successfully_with_no_result() {
    let dir = TempDir::new().unwrap();
    let log_path = log_in(&dir);

    let result = spawn_in_child("exit-successfully-with-no-result", &log_path);

    // Exiting 0 without saying so is still a failed startup
    assert_eq!(result.exit_code, EX_SOFTWARE);
    assert_eq!(
        result.error_message,
        diagnostic("exited with status 0 before it finished initializing", &log_path)
    );
}

#[test]
fn test_abandoned_channel_while_still_running() {
    let dir = TempDir::new().unwrap();
    let log_path = log_in(&dir);

    let result = spawn_in_child("abandon-while-running", &log_path);

    assert_eq!(result.exit_code, EX_SOFTWARE);
    assert_eq!(
        result.error_message,
        diagnostic(
            "is still running but did not report its initialization status",
            &log_path
        )
    );
}
