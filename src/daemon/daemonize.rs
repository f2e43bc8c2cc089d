//! Daemonization driver
//!
//! A daemonizing service is started twice from the same executable:
//!
//! 1. The invoked process becomes the **monitor**. It creates the startup
//!    pipe, re-spawns the executable with the same arguments plus a
//!    reserved marker naming the pipe's write end, waits for the outcome,
//!    prints it, and exits. Service initialization never runs here.
//! 2. The spawned process sees the marker, becomes the **worker**, and
//!    reports back through a [`DaemonStartupLogger`].
//!
//! The role is resolved once by [`ProcessRole::resolve`] and then passed
//! around explicitly.

use crate::daemon::channel::ReportChannel;
use crate::daemon::config::{create_log_dir, StartupConfig};
use crate::daemon::log_file::LogFile;
use crate::daemon::logger::{
    DaemonStartupLogger, FileStartupLogger, ForegroundStartupLogger, StartupLogger,
};
use crate::daemon::monitor::{Monitor, ParentResult, WorkerHandle};
use crate::error::{Result, StartupError};
use std::ffi::OsString;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Reserved argument carrying the inherited report descriptor
pub const FD_MARKER: &str = "--startup-logger-fd";

/// Reserved argument carrying the log path chosen by the monitor
pub const LOG_MARKER: &str = "--startup-logger-log";

/// What this process does during startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessRole {
    /// No daemonization, messages to stderr
    Foreground,
    /// No daemonization, messages to a log file, nobody waiting
    Detached { log_path: PathBuf },
    /// Spawn the worker and wait for its report
    Monitor { log_path: PathBuf },
    /// Report initialization status back through `fd`
    Worker { fd: RawFd, log_path: PathBuf },
}

impl ProcessRole {
    /// Decide the role from the configuration and the invocation arguments
    ///
    /// Returns the role together with `args` stripped of the reserved markers,
    /// so the service's own argument parsing never sees them.
    pub fn resolve(config: &StartupConfig, args: &[String]) -> Result<(ProcessRole, Vec<String>)> {
        let mut fd = None;
        let mut marker_log_path = None;
        let mut remaining = Vec::with_capacity(args.len());

        for arg in args {
            if let Some(value) = marker_value(arg, FD_MARKER) {
                let parsed = value
                    .parse::<RawFd>()
                    .ok()
                    .filter(|fd| *fd >= 0)
                    .ok_or_else(|| StartupError::InvalidMarker(arg.clone()))?;
                fd = Some(parsed);
            } else if let Some(value) = marker_value(arg, LOG_MARKER) {
                if value.is_empty() {
                    return Err(StartupError::InvalidMarker(arg.clone()));
                }
                marker_log_path = Some(PathBuf::from(value));
            } else {
                remaining.push(arg.clone());
            }
        }

        let role = match fd {
            Some(fd) => ProcessRole::Worker {
                fd,
                log_path: marker_log_path.unwrap_or_else(|| config.daemon_log_path()),
            },
            None if config.daemonize => ProcessRole::Monitor {
                log_path: config.daemon_log_path(),
            },
            None => match &config.log_path {
                Some(path) => ProcessRole::Detached {
                    log_path: path.clone(),
                },
                None => ProcessRole::Foreground,
            },
        };

        Ok((role, remaining))
    }

    /// Log file this role writes to, if any
    pub fn log_path(&self) -> Option<&Path> {
        match self {
            ProcessRole::Foreground => None,
            ProcessRole::Detached { log_path }
            | ProcessRole::Monitor { log_path }
            | ProcessRole::Worker { log_path, .. } => Some(log_path),
        }
    }
}

/// Convert raw invocation arguments, rejecting any that are not UTF-8
///
/// Use with `std::env::args_os()`; `std::env::args()` panics on such input.
pub fn collect_args<I>(args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            arg.into_string()
                .map_err(|bad| StartupError::NonUtf8Argument(bad.to_string_lossy().into_owned()))
        })
        .collect()
}

fn marker_value<'a>(arg: &'a str, marker: &str) -> Option<&'a str> {
    arg.strip_prefix(marker)?.strip_prefix('=')
}

/// Whether `arg` is one of the reserved worker markers
pub fn is_reserved_marker(arg: &str) -> bool {
    marker_value(arg, FD_MARKER).is_some() || marker_value(arg, LOG_MARKER).is_some()
}

/// Build the startup logger for `role`
///
/// For [`ProcessRole::Monitor`] this runs the whole handshake and terminates
/// the process; it only returns in the other roles. An unopenable log file is
/// fatal with `EX_IOERR` in every role that has one.
pub fn daemonize_if_requested(
    config: &StartupConfig,
    role: &ProcessRole,
    args: &[String],
) -> Result<Box<dyn StartupLogger>> {
    match role {
        ProcessRole::Foreground => Ok(Box::new(ForegroundStartupLogger::new(
            config.service_name.clone(),
        ))),
        ProcessRole::Detached { log_path } => {
            let logger = FileStartupLogger::new(config.service_name.clone(), log_path)
                .unwrap_or_else(|e| e.exit());
            Ok(Box::new(logger))
        }
        ProcessRole::Monitor { log_path } => run_monitor(config, log_path, args),
        ProcessRole::Worker { fd, log_path } => {
            // SAFETY: the marker is reserved for the monitor, which hands exactly
            // this descriptor to exactly one worker; nothing else adopts it.
            let channel = unsafe { ReportChannel::adopt(*fd)? };
            let log = LogFile::open_or_exit(log_path);
            tracing::debug!(fd, path = %log_path.display(), "running as startup worker");
            Ok(Box::new(DaemonStartupLogger::new(
                config.service_name.clone(),
                log,
                channel,
            )))
        }
    }
}

/// Spawn `program` as a worker reporting through a fresh startup pipe
///
/// The worker gets stdin from `/dev/null`, stdout and stderr appended to
/// `log`, its own session, and the pipe's write end (named by the reserved
/// markers). The returned reader is the only read end; this process keeps
/// no copy of the write end.
pub fn spawn_worker(
    program: &Path,
    args: &[String],
    log: &LogFile,
) -> Result<(WorkerHandle, os_pipe::PipeReader)> {
    let (reader, writer) = os_pipe::pipe().map_err(StartupError::Pipe)?;
    let fd = writer.as_raw_fd();

    let mut command = Command::new(program);
    command
        .args(args)
        .arg(format!("{}={}", FD_MARKER, fd))
        .arg(format!("{}={}", LOG_MARKER, log.path().display()))
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone_file()?))
        .stderr(Stdio::from(log.try_clone_file()?));

    // SAFETY: only async-signal-safe calls between fork and exec.
    unsafe {
        command.pre_exec(move || {
            if libc::setsid() < 0 {
                return Err(io::Error::last_os_error());
            }
            // The pipe is close-on-exec everywhere except in this child
            let flags = libc::fcntl(fd, libc::F_GETFD);
            if flags < 0 || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = command.spawn().map_err(|source| StartupError::Spawn {
        program: program.to_path_buf(),
        source,
    })?;

    // Only the worker may hold the write end, or end-of-stream never arrives.
    drop(writer);

    let worker = WorkerHandle::from_child(&child);
    tracing::debug!(pid = %worker.pid(), fd, "spawned startup worker");
    Ok((worker, reader))
}

/// Spawn the current executable as a worker and wait for its outcome
///
/// `args` are the invocation arguments including the program name.
pub fn monitor_worker(
    config: &StartupConfig,
    log: &LogFile,
    args: &[String],
) -> Result<(WorkerHandle, ParentResult)> {
    let program = std::env::current_exe().map_err(|source| StartupError::Spawn {
        program: PathBuf::from(args.first().map(String::as_str).unwrap_or_default()),
        source,
    })?;
    let worker_args = args.get(1..).unwrap_or_default();

    let (worker, mut pipe) = spawn_worker(&program, worker_args, log)?;

    let monitor = Monitor::new(config.service_name.clone()).with_exit_settle(config.exit_settle);
    let result = monitor.wait_for_child_status(&mut pipe, &worker, log.path());
    Ok((worker, result))
}

/// Text the monitor prints to stderr for `result`, one entry per line
pub fn parent_report(
    service_name: &str,
    worker: &WorkerHandle,
    log_path: &Path,
    result: &ParentResult,
) -> Vec<String> {
    if result.reported_success {
        vec![
            format!("Started {} (pid {})", service_name, worker.pid()),
            format!("Logs available at {}", log_path.display()),
        ]
    } else if result.error_message.is_empty() {
        Vec::new()
    } else {
        vec![result.error_message.clone()]
    }
}

fn run_monitor(config: &StartupConfig, log_path: &Path, args: &[String]) -> ! {
    if config.uses_default_log_path() {
        if let Err(e) = create_log_dir(log_path) {
            tracing::debug!(error = %e, "could not create log directory");
        }
    }
    let log = LogFile::open_or_exit(log_path);

    let (worker, result) = match monitor_worker(config, &log, args) {
        Ok(outcome) => outcome,
        Err(e) => e.exit(),
    };

    for line in parent_report(&config.service_name, &worker, log.path(), &result) {
        eprintln!("{}", line);
    }
    std::process::exit(result.exit_code)
}
