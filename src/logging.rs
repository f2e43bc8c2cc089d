//! Diagnostic logging setup
//!
//! Internal diagnostics go through `tracing` to stderr. In a daemon worker
//! stderr is the service log file, so these lines end up next to the
//! startup messages.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directive (e.g. `debug`, `handshake=trace`)
pub const ENV_LOG_LEVEL: &str = "HANDSHAKE_LOG_LEVEL";

/// Install the stderr subscriber; later calls are no-ops
pub fn init() {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .try_init();
}
