//! Error types and process exit codes for the startup handshake
//!
//! Exit codes follow the BSD `sysexits.h` convention so that a shell invoking
//! the monitor can tell a reported failure apart from an internal one.

use std::path::PathBuf;
use thiserror::Error;

/// Process exit codes used by the handshake
pub mod exit_codes {
    /// Successful termination
    pub const EX_OK: i32 = 0;
    /// Command line usage error
    pub const EX_USAGE: i32 = 64;
    /// Internal software error; used for every ambiguous handshake outcome
    pub const EX_SOFTWARE: i32 = 70;
    /// System error (e.g. can't fork)
    pub const EX_OSERR: i32 = 71;
    /// Input/output error
    pub const EX_IOERR: i32 = 74;
}

/// Errors raised while setting up either side of the handshake
#[derive(Debug, Error)]
pub enum StartupError {
    /// The log file could not be opened or created
    #[error("error opening log file {path}: {source}")]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The report pipe could not be created
    #[error("failed to create startup pipe: {0}")]
    Pipe(#[source] std::io::Error),

    /// The worker process could not be spawned
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The reserved worker marker was present but malformed
    #[error("invalid startup marker argument: {0}")]
    InvalidMarker(String),

    /// A command-line argument is not valid UTF-8
    #[error("argument is not valid UTF-8: {0}")]
    NonUtf8Argument(String),

    /// The inherited report descriptor is not open in this process
    #[error("startup report descriptor {fd} is not usable: {source}")]
    BadDescriptor {
        fd: i32,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an already-established channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StartupError {
    /// Exit code a process should use when it dies from this error
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::LogOpen { .. } | StartupError::Io(_) => exit_codes::EX_IOERR,
            StartupError::Pipe(_) | StartupError::Spawn { .. } => exit_codes::EX_OSERR,
            StartupError::InvalidMarker(_) | StartupError::NonUtf8Argument(_) => {
                exit_codes::EX_USAGE
            }
            StartupError::BadDescriptor { .. } => exit_codes::EX_SOFTWARE,
        }
    }

    /// Print the error to stderr and terminate with its exit code
    pub fn exit(&self) -> ! {
        eprintln!("{}", self);
        std::process::exit(self.exit_code())
    }
}

pub type Result<T> = std::result::Result<T, StartupError>;
