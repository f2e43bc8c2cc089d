//! Worker-side end of the startup pipe
//!
//! A [`ReportChannel`] is consumed by whichever of [`ReportChannel::send`] or
//! [`ReportChannel::abandon`] runs first, so at most one report can ever be
//! written. Dropping it closes the pipe with nothing written, which the
//! monitor reads as "no result".

use crate::daemon::protocol::{write_result, ResultMessage};
use crate::error::{Result, StartupError};
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

/// Write end of the startup pipe, owned exclusively by the worker
#[derive(Debug)]
pub struct ReportChannel {
    pipe: File,
}

impl ReportChannel {
    /// Wrap a pipe writer this process already owns
    pub fn from_writer(writer: os_pipe::PipeWriter) -> Self {
        // SAFETY: into_raw_fd transfers sole ownership of the descriptor.
        let pipe = unsafe { File::from_raw_fd(writer.into_raw_fd()) };
        Self { pipe }
    }

    /// Take ownership of a descriptor inherited from the monitor
    ///
    /// The descriptor is marked close-on-exec so processes the service spawns
    /// later cannot keep the monitor waiting.
    ///
    /// # Safety
    ///
    /// `fd` must be open, must refer to the startup pipe, and must not be owned
    /// by anything else in this process. Call at most once per descriptor.
    pub unsafe fn adopt(fd: RawFd) -> Result<Self> {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags < 0 {
            return Err(StartupError::BadDescriptor {
                fd,
                source: io::Error::last_os_error(),
            });
        }
        if libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) < 0 {
            return Err(StartupError::BadDescriptor {
                fd,
                source: io::Error::last_os_error(),
            });
        }

        Ok(Self {
            pipe: File::from_raw_fd(fd),
        })
    }

    /// Raw descriptor number, for diagnostics
    pub fn raw_fd(&self) -> RawFd {
        self.pipe.as_raw_fd()
    }

    /// Send the one and only report, then close the pipe
    pub fn send(mut self, message: &ResultMessage) -> io::Result<()> {
        let result = write_result(&mut self.pipe, message);
        tracing::debug!(fd = self.raw_fd(), ?message, "startup result sent");
        result
    }

    /// Close the pipe without reporting anything
    pub fn abandon(self) {
        tracing::debug!(fd = self.raw_fd(), "startup channel closed without a result");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::protocol::read_result;
    use std::io::Read;

    #[test]
    fn test_send_writes_one_frame_then_closes() {
        let (mut reader, writer) = os_pipe::pipe().unwrap();
        let channel = ReportChannel::from_writer(writer);

        channel.send(&ResultMessage::Success).unwrap();

        assert_eq!(read_result(&mut reader).unwrap(), ResultMessage::Success);
        let mut rest = Vec::new();
        assert_eq!(reader.read_to_end(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_abandon_closes_with_nothing_written() {
        let (mut reader, writer) = os_pipe::pipe().unwrap();
        ReportChannel::from_writer(writer).abandon();

        let mut rest = Vec::new();
        assert_eq!(reader.read_to_end(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_drop_closes_with_nothing_written() {
        let (mut reader, writer) = os_pipe::pipe().unwrap();
        {
            let _channel = ReportChannel::from_writer(writer);
        }

        let err = read_result(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_adopt_rejects_invalid_descriptor() {
        // SAFETY: -1 is never a valid descriptor, so nothing is taken over.
        let err = unsafe { ReportChannel::adopt(-1) }.unwrap_err();
        assert!(matches!(err, StartupError::BadDescriptor { fd: -1, .. }));
    }

    #[test]
    fn test_adopt_sets_close_on_exec() {
        let (_reader, writer) = os_pipe::pipe().unwrap();
        let fd = writer.into_raw_fd();
        // SAFETY: clear the flag os_pipe set so adopt has something to restore.
        unsafe { libc::fcntl(fd, libc::F_SETFD, 0) };

        // SAFETY: fd was released by into_raw_fd and is owned by nobody else.
        let channel = unsafe { ReportChannel::adopt(fd) }.unwrap();
        let flags = unsafe { libc::fcntl(channel.raw_fd(), libc::F_GETFD) };
        assert_ne!(flags & libc::FD_CLOEXEC, 0);
    }
}
