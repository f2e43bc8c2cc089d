//! Startup configuration
//!
//! Built in code by the hosting service and optionally overridden from the
//! environment:
//! - HANDSHAKE_FOREGROUND (1/true/yes disables daemonization)
//! - HANDSHAKE_LOG_FILE (path of the startup log)
//! - HANDSHAKE_EXIT_SETTLE_MS (milliseconds to wait for a worker whose pipe closed)

use crate::daemon::monitor::DEFAULT_EXIT_SETTLE;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_FOREGROUND: &str = "HANDSHAKE_FOREGROUND";
pub const ENV_LOG_FILE: &str = "HANDSHAKE_LOG_FILE";
pub const ENV_EXIT_SETTLE_MS: &str = "HANDSHAKE_EXIT_SETTLE_MS";

/// How a service should start up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    /// Name used in startup and diagnostic messages
    pub service_name: String,
    /// Explicit log file; daemon mode falls back to [`StartupConfig::default_log_path`]
    pub log_path: Option<PathBuf>,
    /// Whether to detach into the background behind a monitor
    pub daemonize: bool,
    /// How long the monitor waits for a worker with a closed pipe to exit
    pub exit_settle: Duration,
}

impl StartupConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_path: None,
            daemonize: true,
            exit_settle: DEFAULT_EXIT_SETTLE,
        }
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Stay attached to the invoking terminal
    pub fn foreground(mut self) -> Self {
        self.daemonize = false;
        self
    }

    pub fn with_exit_settle(mut self, window: Duration) -> Self {
        self.exit_settle = window;
        self
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.apply_os_vars(std::env::vars_os())
    }

    /// Apply overrides from raw environment pairs
    ///
    /// Only `HANDSHAKE_*` keys are inspected. Pairs that are not UTF-8 are
    /// skipped, whether they belong to this crate or not.
    pub fn apply_os_vars<I>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let ours = vars.into_iter().filter_map(|(key, value)| {
            let key = key.to_str()?;
            if !key.starts_with("HANDSHAKE_") {
                return None;
            }
            Some((key.to_string(), value.into_string().ok()?))
        });
        self.apply_vars(ours)
    }

    /// Apply overrides from `KEY=value` pairs; unknown keys and unparsable values are ignored
    pub fn apply_vars<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                ENV_FOREGROUND => {
                    self.daemonize = !is_truthy(&value);
                }
                ENV_LOG_FILE => {
                    let value = value.trim();
                    if !value.is_empty() {
                        self.log_path = Some(PathBuf::from(value));
                    }
                }
                ENV_EXIT_SETTLE_MS => {
                    if let Ok(ms) = value.trim().parse::<u64>() {
                        self.exit_settle = Duration::from_millis(ms);
                    }
                }
                _ => {}
            }
        }
        self
    }

    /// Log path for daemon mode: the explicit path, or the per-user default
    pub fn daemon_log_path(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| Self::default_log_path(&self.service_name))
    }

    /// `~/.<service>/<service>.log`
    pub fn default_log_path(service_name: &str) -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!(".{}", service_name))
            .join(format!("{}.log", service_name))
    }

    /// Whether the daemon log path is the per-user default
    pub fn uses_default_log_path(&self) -> bool {
        self.log_path.is_none()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Create the directory holding `log_path` with owner-only permissions
pub fn create_log_dir(log_path: &Path) -> io::Result<()> {
    let Some(dir) = log_path.parent() else {
        return Ok(());
    };
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }

    fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(dir)?.permissions();
        perms.set_mode(0o700);
        fs::set_permissions(dir, perms)?;
    }

    Ok(())
}
