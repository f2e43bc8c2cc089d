//! Startup loggers
//!
//! Service startup code talks to a [`StartupLogger`] and never needs to know
//! whether it is running in the foreground, detached with only a log file,
//! or as a daemon worker whose monitor is waiting on the startup pipe.

use crate::daemon::channel::ReportChannel;
use crate::daemon::log_file::LogFile;
use crate::daemon::protocol::ResultMessage;
use crate::error::Result;
use std::path::Path;

/// Progress and outcome reporting during service initialization
pub trait StartupLogger {
    /// Record an informational startup message
    fn log(&self, message: &str);

    /// Record a warning that does not stop startup
    fn warn(&self, message: &str);

    /// Report that initialization finished; the process keeps running
    fn success(&mut self);

    /// Report that initialization failed and terminate with `code`
    fn exit_unsuccessfully(&mut self, code: i32, message: &str) -> !;
}

/// Line recorded when a service finishes initializing
pub fn started_message(service_name: &str) -> String {
    format!("Started {} (pid {})", service_name, std::process::id())
}

fn append(log: &LogFile, line: &str) {
    if let Err(e) = log.write_line(line) {
        tracing::warn!(path = %log.path().display(), error = %e, "failed to write startup log");
    }
}

/// Logger for a service running attached to the invoking terminal
#[derive(Debug, Clone)]
pub struct ForegroundStartupLogger {
    service_name: String,
}

impl ForegroundStartupLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl StartupLogger for ForegroundStartupLogger {
    fn log(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn success(&mut self) {
        eprintln!("{}", started_message(&self.service_name));
    }

    fn exit_unsuccessfully(&mut self, code: i32, message: &str) -> ! {
        eprintln!("{}", message);
        std::process::exit(code)
    }
}

/// Logger for a detached service that has no monitor waiting on it
#[derive(Debug)]
pub struct FileStartupLogger {
    service_name: String,
    log: LogFile,
}

impl FileStartupLogger {
    /// Open (or create) the log file at `log_path`
    pub fn new(service_name: impl Into<String>, log_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            service_name: service_name.into(),
            log: LogFile::open(log_path)?,
        })
    }
}

impl StartupLogger for FileStartupLogger {
    fn log(&self, message: &str) {
        append(&self.log, message);
    }

    fn warn(&self, message: &str) {
        append(&self.log, message);
    }

    fn success(&mut self) {
        append(&self.log, &started_message(&self.service_name));
    }

    fn exit_unsuccessfully(&mut self, code: i32, message: &str) -> ! {
        append(&self.log, message);
        std::process::exit(code)
    }
}

/// Logger for a daemon worker reporting back to its monitor
///
/// Messages only ever go to the log file. The report channel is released on
/// every path: consumed by `success`/`exit_unsuccessfully`, closed by
/// [`DaemonStartupLogger::abandon`], or closed on drop.
#[derive(Debug)]
pub struct DaemonStartupLogger {
    service_name: String,
    log: LogFile,
    channel: Option<ReportChannel>,
}

impl DaemonStartupLogger {
    pub fn new(service_name: impl Into<String>, log: LogFile, channel: ReportChannel) -> Self {
        Self {
            service_name: service_name.into(),
            log,
            channel: Some(channel),
        }
    }

    /// Whether a result can still be reported
    pub fn is_pending(&self) -> bool {
        self.channel.is_some()
    }

    /// Close the report channel without sending a result
    ///
    /// The monitor will diagnose the worker as exited or still running
    /// without having reported its initialization status.
    pub fn abandon(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.abandon();
        }
    }

    fn report(&mut self, message: ResultMessage) {
        match self.channel.take() {
            Some(channel) => {
                // The monitor may already be gone; the log still has the details.
                if let Err(e) = channel.send(&message) {
                    tracing::debug!(error = %e, "monitor did not receive startup result");
                }
            }
            None => {
                tracing::warn!(?message, "startup result already reported; ignoring");
            }
        }
    }
}

impl StartupLogger for DaemonStartupLogger {
    fn log(&self, message: &str) {
        append(&self.log, message);
    }

    fn warn(&self, message: &str) {
        append(&self.log, message);
    }

    fn success(&mut self) {
        append(&self.log, &started_message(&self.service_name));
        self.report(ResultMessage::Success);
    }

    fn exit_unsuccessfully(&mut self, code: i32, message: &str) -> ! {
        append(&self.log, message);
        self.report(ResultMessage::failure(code, message));
        std::process::exit(code)
    }
}
