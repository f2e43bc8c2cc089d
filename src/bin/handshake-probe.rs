//! Exercise harness for the startup handshake
//!
//! The first argument names a behavior; an optional second argument is a log
//! path. Integration tests either spawn this binary as a worker themselves
//! (acting as the monitor) or run it as a complete daemonizing program.
//!
//! ```text
//! handshake-probe <behavior> [log-path]
//! ```

use handshake::daemon::{
    collect_args, daemonize_if_requested, DaemonStartupLogger, FileStartupLogger,
    ForegroundStartupLogger, LogFile, ProcessRole, ReportChannel, StartupConfig, StartupLogger,
};
use handshake::exit_codes::EX_USAGE;
use handshake::logging;
use nix::sys::signal::{kill, Signal};
use nix::unistd::getpid;
use std::env;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

const SERVICE_NAME: &str = "probed";

fn main() {
    logging::init();
    let raw_args = collect_args(env::args_os()).unwrap_or_else(|e| e.exit());

    let log_path = raw_args
        .get(2)
        .filter(|arg| !arg.starts_with("--"))
        .map(PathBuf::from);
    let mut config = StartupConfig::new(SERVICE_NAME);
    if let Some(path) = &log_path {
        config = config.with_log_path(path);
    }

    let (role, args) = ProcessRole::resolve(&config, &raw_args).unwrap_or_else(|e| e.exit());
    let Some(behavior) = args.get(1) else {
        eprintln!("usage: handshake-probe <behavior> [log-path]");
        process::exit(EX_USAGE);
    };

    match behavior.as_str() {
        // Worker behaviors: the caller spawned us with the reserved markers
        "success" => worker(&role).success(),
        "failure" => worker(&role).exit_unsuccessfully(3, "example failure"),
        "crash-with-no-result" => {
            let logger = worker(&role);
            logger.log("boot message");
            eprintln!("this message should go to the log");
            crash()
        }
        "exit-with-no-result" => {
            let _logger = worker(&role);
            process::exit(19)
        }
        "exit-successfully-with-no-result" => {
            let _logger = worker(&role);
            process::exit(0)
        }
        "abandon-while-running" => {
            let mut logger = worker(&role);
            logger.abandon();
            thread::sleep(Duration::from_secs(30));
        }

        // Complete programs: we are the monitor until the re-spawned copy reports
        "daemonize-success" => {
            daemonized(&config, &role, &args).success();
        }
        "daemonize-failure" => {
            daemonized(&config, &role, &args).exit_unsuccessfully(3, "example failure")
        }
        "daemonize-failure-zero" => {
            daemonized(&config, &role, &args).exit_unsuccessfully(0, "gave up with code 0")
        }
        "daemonize-crash" => {
            let logger = daemonized(&config, &role, &args);
            logger.log("boot message");
            crash()
        }
        "daemonize-then-linger" => {
            daemonized(&config, &role, &args).success();
            thread::sleep(Duration::from_secs(5));
            process::exit(1);
        }

        // Loggers used without any monitor
        "foreground-warn" => ForegroundStartupLogger::new(SERVICE_NAME).warn("warn message"),
        "foreground-success" => ForegroundStartupLogger::new(SERVICE_NAME).success(),
        "foreground-exit" => ForegroundStartupLogger::new(SERVICE_NAME)
            .exit_unsuccessfully(42, "intentionally exiting"),
        "file-exit" => {
            let path = log_path.unwrap_or_else(|| usage_exit("file-exit needs a log path"));
            let mut logger =
                FileStartupLogger::new(SERVICE_NAME, path).unwrap_or_else(|e| e.exit());
            logger.exit_unsuccessfully(3, "error message")
        }

        other => {
            eprintln!("error: unknown behavior: {}", other);
            process::exit(2);
        }
    }
}

/// Build the worker-side logger directly from the inherited descriptor
fn worker(role: &ProcessRole) -> DaemonStartupLogger {
    let ProcessRole::Worker { fd, log_path } = role else {
        usage_exit("worker behaviors must be spawned with the startup markers")
    };
    // SAFETY: the descriptor was handed to this process by its monitor and
    // this is the only place that adopts it.
    let channel = unsafe { ReportChannel::adopt(*fd) }.unwrap_or_else(|e| e.exit());
    DaemonStartupLogger::new(SERVICE_NAME, LogFile::open_or_exit(log_path), channel)
}

fn daemonized(
    config: &StartupConfig,
    role: &ProcessRole,
    args: &[String],
) -> Box<dyn StartupLogger> {
    if !matches!(role, ProcessRole::Monitor { .. } | ProcessRole::Worker { .. }) {
        usage_exit("daemonize behaviors need a log path");
    }
    daemonize_if_requested(config, role, args).unwrap_or_else(|e| e.exit())
}

fn crash() -> ! {
    let _ = kill(getpid(), Signal::SIGKILL);
    loop {
        thread::sleep(Duration::from_secs(30));
    }
}

fn usage_exit(message: &str) -> ! {
    eprintln!("error: {}", message);
    process::exit(EX_USAGE)
}
