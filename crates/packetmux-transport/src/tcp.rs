use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;

use tracing::debug;

use crate::traits::{PollTimeout, Transport};

/// [`Transport`] adapter over `std::net::TcpStream`.
///
/// Would-block conditions are folded into the trait's zero-return
/// convention; readiness is checked with `poll(2)`.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Wrap an already-connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Duplicate a connection into a read half and a write half.
    ///
    /// Both halves refer to the same socket; the caller gives one to a
    /// demuxer and the other to a muxer so each side touches only its own
    /// direction.
    pub fn split(stream: TcpStream) -> std::io::Result<(TcpTransport, TcpTransport)> {
        let write_half = stream.try_clone()?;
        debug!("split tcp stream into read and write halves");
        Ok((TcpTransport::new(stream), TcpTransport::new(write_half)))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &TcpStream {
        &self.stream
    }

    /// Consume the adapter and return the inner stream.
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

impl Transport for TcpTransport {
    fn set_blocking(&mut self, blocking: bool) -> std::io::Result<()> {
        self.stream.set_nonblocking(!blocking)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.stream.write(buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(err),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(err),
        }
    }

    fn ready_for_reading(&self, timeout: PollTimeout) -> std::io::Result<bool> {
        let timeout_ms = match timeout {
            PollTimeout::Immediate => 0,
            PollTimeout::Millis(ms) => ms.min(i32::MAX as u32) as i32,
            PollTimeout::Infinite => -1,
        };

        let mut fds = libc::pollfd {
            fd: self.stream.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        loop {
            // SAFETY: `fds` is a valid pollfd for the duration of the call
            // and the descriptor is owned by our stream.
            let rc = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            // Hang-ups and errors count as readable: the next read reports them.
            let readable = fds.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0;
            return Ok(rc > 0 && readable);
        }
    }
}
