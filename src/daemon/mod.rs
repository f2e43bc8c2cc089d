//! Startup handshake between a daemonizing service and its launcher
//!
//! - `protocol`: result codec for the single report sent over the startup pipe
//! - `log_file`: append-only startup log
//! - `channel`: worker-owned write end of the startup pipe
//! - `logger`: foreground, file, and daemon startup loggers
//! - `monitor`: parent-side wait and failure classification
//! - `daemonize`: role resolution and worker spawning
//! - `config`: startup configuration

pub mod channel;
pub mod config;
pub mod daemonize;
pub mod log_file;
pub mod logger;
pub mod monitor;
pub mod protocol;

pub use channel::ReportChannel;
pub use config::StartupConfig;
pub use daemonize::{
    collect_args, daemonize_if_requested, spawn_worker, ProcessRole, FD_MARKER, LOG_MARKER,
};
pub use log_file::LogFile;
pub use logger::{DaemonStartupLogger, FileStartupLogger, ForegroundStartupLogger, StartupLogger};
pub use monitor::{Monitor, ParentResult, WorkerHandle, WorkerStatus};
pub use protocol::{decode_result, encode_result, read_result, write_result, ResultMessage};
