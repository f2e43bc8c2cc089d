//! Parent-side monitoring of a starting worker
//!
//! The monitor blocks on the startup pipe until the worker reports or the
//! pipe reaches end-of-stream. A missing report is then classified by probing
//! the worker process:
//!
//! - killed by a signal: crash
//! - exited (any code, including 0): silent exit
//! - still alive: hung with a closed channel
//!
//! The read has no timeout. A hung worker that keeps the pipe open keeps the
//! monitor waiting, which is what the invoking shell should see.

use crate::daemon::protocol::{read_result, ResultMessage};
use crate::error::exit_codes::{EX_OK, EX_SOFTWARE};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant};

/// Default window for a worker whose pipe closed to become reapable
pub const DEFAULT_EXIT_SETTLE: Duration = Duration::from_secs(1);

/// Interval between status probes inside the settle window
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome the monitor process exits with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentResult {
    /// Exit code for the monitor process
    pub exit_code: i32,
    /// Diagnostic to print before exiting; empty when nothing needs explaining
    pub error_message: String,
    /// Whether the worker reported `Success`; a failure reported with code 0 is not
    pub reported_success: bool,
}

impl ParentResult {
    pub fn new(exit_code: i32, error_message: impl Into<String>) -> Self {
        Self {
            exit_code,
            error_message: error_message.into(),
            reported_success: false,
        }
    }

    pub fn success() -> Self {
        Self {
            reported_success: true,
            ..Self::new(EX_OK, "")
        }
    }
}

/// Observed state of the worker process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Process has not terminated
    Running,
    /// Process exited normally with this code
    Exited(i32),
    /// Process was terminated by this signal number
    Signaled(i32),
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Running => write!(f, "running"),
            WorkerStatus::Exited(code) => write!(f, "exited with status {}", code),
            WorkerStatus::Signaled(signal) => write!(f, "killed by signal {}", signal),
        }
    }
}

impl From<WaitStatus> for WorkerStatus {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(_, code) => WorkerStatus::Exited(code),
            WaitStatus::Signaled(_, signal, _) => WorkerStatus::Signaled(signal as i32),
            // Stopped, continued, and traced processes have not terminated
            _ => WorkerStatus::Running,
        }
    }
}

/// Process identity of a spawned worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerHandle {
    pid: Pid,
}

impl WorkerHandle {
    pub fn from_pid(pid: Pid) -> Self {
        Self { pid }
    }

    pub fn from_child(child: &std::process::Child) -> Self {
        Self::from_pid(Pid::from_raw(child.id() as i32))
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Check the worker's status without blocking
    ///
    /// A terminated worker is reaped by this call; probe it only until it
    /// reports something other than `Running`.
    pub fn probe(&self) -> nix::Result<WorkerStatus> {
        waitpid(self.pid, Some(WaitPidFlag::WNOHANG)).map(WorkerStatus::from)
    }

    /// Block until the worker terminates
    pub fn wait(&self) -> nix::Result<WorkerStatus> {
        loop {
            match waitpid(self.pid, None) {
                Ok(status) => match WorkerStatus::from(status) {
                    WorkerStatus::Running => continue,
                    terminated => return Ok(terminated),
                },
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Probe repeatedly until the worker terminates or `window` elapses
    pub fn settle(&self, window: Duration) -> nix::Result<WorkerStatus> {
        let deadline = Instant::now() + window;
        loop {
            let status = self.probe()?;
            if status != WorkerStatus::Running || Instant::now() >= deadline {
                return Ok(status);
            }
            std::thread::sleep(SETTLE_POLL_INTERVAL);
        }
    }

    /// Send SIGKILL to the worker
    pub fn kill(&self) -> nix::Result<()> {
        kill(self.pid, Signal::SIGKILL)
    }
}

/// Waits for a worker's startup report and turns it into a [`ParentResult`]
#[derive(Debug, Clone)]
pub struct Monitor {
    service_name: String,
    exit_settle: Duration,
}

impl Monitor {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            exit_settle: DEFAULT_EXIT_SETTLE,
        }
    }

    /// How long to wait for a worker with a closed pipe to become reapable
    pub fn with_exit_settle(mut self, window: Duration) -> Self {
        self.exit_settle = window;
        self
    }

    /// Block until the worker reports or closes its end of `pipe`, then classify
    pub fn wait_for_child_status<R: Read>(
        &self,
        pipe: &mut R,
        worker: &WorkerHandle,
        log_path: &Path,
    ) -> ParentResult {
        match read_result(pipe) {
            Ok(ResultMessage::Success) => ParentResult::success(),
            Ok(ResultMessage::Failure { code, message }) => {
                // The worker already wrote the details to its log.
                tracing::debug!(code, %message, "worker reported initialization failure");
                ParentResult::new(code, "")
            }
            Err(e) => {
                tracing::debug!(error = %e, pid = %worker.pid(), "no startup result from worker");
                let status = worker.settle(self.exit_settle);
                self.classify_missing_result(status, log_path)
            }
        }
    }

    /// Diagnose a worker that closed the pipe without a decodable report
    pub fn classify_missing_result(
        &self,
        status: nix::Result<WorkerStatus>,
        log_path: &Path,
    ) -> ParentResult {
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "unable to determine worker status");
                WorkerStatus::Exited(0)
            }
        };

        let service = &self.service_name;
        let hint = format!(
            "Check the {} log file at {} for more details",
            service,
            log_path.display()
        );

        match status {
            WorkerStatus::Running => ParentResult::new(
                EX_SOFTWARE,
                format!(
                    "{} is still running but did not report its initialization status\n{}",
                    service, hint
                ),
            ),
            WorkerStatus::Signaled(_) => ParentResult::new(
                EX_SOFTWARE,
                format!(
                    "{} crashed with status {} before it finished initializing\n{}",
                    service, status, hint
                ),
            ),
            WorkerStatus::Exited(code) => ParentResult::new(
                // Exiting 0 without reporting success is still a protocol violation.
                if code == 0 { EX_SOFTWARE } else { code },
                format!(
                    "{} {} before it finished initializing\n{}",
                    service, status, hint
                ),
            ),
        }
    }
}
