// Library interface for the startup handshake
// The binaries and integration tests drive everything through these modules

pub mod daemon;
pub mod error;
pub mod logging;
pub mod signal;

pub use daemon::{
    daemonize_if_requested, Monitor, ParentResult, ProcessRole, ResultMessage, StartupConfig,
    StartupLogger,
};
pub use error::{exit_codes, StartupError};
