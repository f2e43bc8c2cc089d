//! Append-only startup log file

use crate::error::{Result, StartupError};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Log file opened in append mode, created if missing
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    /// Open `path` for appending, creating it if it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StartupError::LogOpen {
                path: path.clone(),
                source,
            })?;

        Ok(Self { path, file })
    }

    /// Open `path`, terminating the process with `EX_IOERR` on failure
    pub fn open_or_exit(path: impl AsRef<Path>) -> Self {
        match Self::open(path) {
            Ok(log) => log,
            Err(e) => e.exit(),
        }
    }

    /// Path this log was opened at
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line followed by a newline
    ///
    /// The line is written with a single call so concurrent appenders
    /// (e.g. the worker's redirected stderr) never split it.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buffer = String::with_capacity(line.len() + 1);
        buffer.push_str(line);
        buffer.push('\n');
        (&self.file).write_all(buffer.as_bytes())
    }

    /// Duplicate the underlying handle, e.g. to hand to a child as stdout/stderr
    pub fn try_clone_file(&self) -> io::Result<File> {
        self.file.try_clone()
    }
}
