// Integration tests for the handshaked service binary
//
// Startup must not depend on the rest of the environment or the arguments
// being valid UTF-8.

use handshake::exit_codes::EX_USAGE;
use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::process::{Command, Stdio};

fn handshaked() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_handshaked"));
    command
        .env_remove("HANDSHAKE_FOREGROUND")
        .env_remove("HANDSHAKE_LOG_FILE")
        .env_remove("HANDSHAKE_EXIT_SETTLE_MS")
        .env_remove("HANDSHAKE_LOG_LEVEL")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

#[test]
fn test_foreground_failure_code() {
    let output = handshaked()
        .args(["--foreground", "--fail", "5"])
        .output()
        .expect("Failed to run handshaked");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(5), "stderr: {}", stderr);
    assert!(stderr.contains("handshaked failed to initialize (requested exit 5)"));
}

#[test]
fn test_unrelated_non_utf8_env_var_is_ignored() {
    let output = handshaked()
        .args(["--foreground", "--fail", "5"])
        .env("UNRELATED_VAR", OsString::from_vec(b"\xff\xfe".to_vec()))
        .output()
        .expect("Failed to run handshaked");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(5), "stderr: {}", stderr);
    assert!(!stderr.contains("panicked"));
}

#[test]
fn test_non_utf8_argument_is_usage_error() {
    let output = handshaked()
        .arg("--foreground")
        .arg(OsString::from_vec(b"--log-file=\xff".to_vec()))
        .output()
        .expect("Failed to run handshaked");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(EX_USAGE), "stderr: {}", stderr);
    assert!(stderr.contains("argument is not valid UTF-8"));
    assert!(!stderr.contains("panicked"));
}
