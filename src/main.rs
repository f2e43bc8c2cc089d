//! handshaked: a minimal service that daemonizes through the startup handshake
//!
//! Useful for trying the protocol from a shell:
//!
//! ```text
//! handshaked --log-file /tmp/handshaked.log            # detaches, prints "Started ..."
//! handshaked --log-file /tmp/handshaked.log --fail 3   # monitor exits 3
//! handshaked --foreground                              # stays attached
//! ```

use anyhow::{anyhow, Result};
use handshake::daemon::daemonize::is_reserved_marker;
use handshake::daemon::{collect_args, daemonize_if_requested, ProcessRole, StartupConfig};
use handshake::exit_codes::EX_USAGE;
use handshake::{logging, signal};
use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

const SERVICE_NAME: &str = "handshaked";

#[derive(Debug, Default)]
struct Options {
    foreground: bool,
    log_file: Option<PathBuf>,
    fail: Option<i32>,
    abandon: bool,
    startup_delay: Option<Duration>,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = Options::default();
        let mut iter = args.iter().skip(1).filter(|arg| !is_reserved_marker(arg));

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--foreground" | "-f" => options.foreground = true,
                "--log-file" => {
                    let path = iter.next().ok_or_else(|| anyhow!("--log-file requires a path"))?;
                    options.log_file = Some(PathBuf::from(path));
                }
                "--fail" => {
                    let code = iter.next().ok_or_else(|| anyhow!("--fail requires an exit code"))?;
                    let code = code.parse().map_err(|_| anyhow!("invalid exit code '{}'", code))?;
                    options.fail = Some(code);
                }
                "--abandon" => options.abandon = true,
                "--startup-delay-ms" => {
                    let ms = iter
                        .next()
                        .ok_or_else(|| anyhow!("--startup-delay-ms requires a value"))?;
                    let ms: u64 = ms.parse().map_err(|_| anyhow!("invalid delay '{}'", ms))?;
                    options.startup_delay = Some(Duration::from_millis(ms));
                }
                "-h" | "--help" => {
                    print_usage();
                    process::exit(0);
                }
                other => return Err(anyhow!("Unknown option '{}'", other)),
            }
        }

        Ok(options)
    }

    fn startup_config(&self) -> StartupConfig {
        let mut config = StartupConfig::new(SERVICE_NAME);
        if self.foreground {
            config = config.foreground();
        }
        if let Some(path) = &self.log_file {
            config = config.with_log_path(path);
        }
        config.with_env_overrides()
    }
}

fn main() -> Result<()> {
    logging::init();
    let args = collect_args(env::args_os()).unwrap_or_else(|e| e.exit());

    let options = match Options::parse(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            process::exit(EX_USAGE);
        }
    };
    let config = options.startup_config();

    let (role, _args) = ProcessRole::resolve(&config, &args).unwrap_or_else(|e| e.exit());
    tracing::debug!(?role, log = ?role.log_path(), "resolved startup role");
    let mut logger = daemonize_if_requested(&config, &role, &args).unwrap_or_else(|e| e.exit());

    // Registered before reporting success so an early stop request is not lost
    let mut shutdown = signal::ShutdownWaiter::register()?;

    logger.log(&format!("{} starting (pid {})", SERVICE_NAME, process::id()));
    if let Some(delay) = options.startup_delay {
        logger.log(&format!("simulating {}ms of initialization", delay.as_millis()));
        std::thread::sleep(delay);
    }

    if let Some(code) = options.fail {
        let message = format!("{} failed to initialize (requested exit {})", SERVICE_NAME, code);
        logger.exit_unsuccessfully(code, &message);
    }

    if options.abandon {
        logger.warn("giving up on reporting startup status");
        drop(logger);
    } else {
        logger.success();
    }

    let sig = shutdown.wait();
    tracing::info!(signal = sig, "shutting down");
    process::exit(signal::exit_code(sig));
}

fn print_usage() {
    eprintln!("Usage: {} [OPTIONS]", SERVICE_NAME);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -f, --foreground          Do not daemonize; log to stderr (or --log-file)");
    eprintln!("      --log-file PATH       Startup log (default ~/.{0}/{0}.log)", SERVICE_NAME);
    eprintln!("      --fail CODE           Report an initialization failure with CODE");
    eprintln!("      --abandon             Close the startup channel without reporting");
    eprintln!("      --startup-delay-ms N  Sleep N milliseconds before reporting");
    eprintln!("  -h, --help                Show this help");
}
