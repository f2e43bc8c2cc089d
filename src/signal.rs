use anyhow::Result;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

/// Shutdown signals a started service waits for
pub const SHUTDOWN_SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGHUP];

/// Blocks a started service until it is asked to stop
pub struct ShutdownWaiter {
    signals: Signals,
}

impl ShutdownWaiter {
    /// Register handlers for SIGINT, SIGTERM, and SIGHUP
    ///
    /// Register before reporting startup success so a stop request sent right
    /// after the monitor exits is not lost.
    pub fn register() -> Result<Self> {
        Ok(Self {
            signals: Signals::new(SHUTDOWN_SIGNALS)?,
        })
    }

    /// Block until one of the shutdown signals arrives and return its number
    pub fn wait(&mut self) -> i32 {
        self.signals.forever().next().unwrap_or(SIGTERM)
    }
}

/// Exit code for a service stopped by `signal`
pub fn exit_code(signal: i32) -> i32 {
    match signal {
        SIGINT => 130,  // 128 + 2
        SIGTERM => 143, // 128 + 15
        SIGHUP => 129,  // 128 + 1
        _ => 1,
    }
}
