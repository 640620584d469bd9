use std::io;
use std::time::Duration;

/// How long [`Transport::ready_for_reading`] may wait for readability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTimeout {
    /// Check readiness and return immediately.
    Immediate,
    /// Wait up to the given number of milliseconds.
    Millis(u32),
    /// Wait until the stream becomes readable.
    Infinite,
}

impl From<Duration> for PollTimeout {
    fn from(timeout: Duration) -> Self {
        PollTimeout::Millis(timeout.as_millis().min(u128::from(u32::MAX)) as u32)
    }
}

/// A connected, reliable byte stream the comms system can drive.
///
/// One muxer/demuxer pair owns one connection: the muxer holds the half it
/// writes to and the demuxer the half it reads from, so implementations need
/// no internal locking. For a duplex socket, obtain the two halves with
/// something like [`TcpTransport::split`](crate::tcp::TcpTransport::split).
///
/// The zero-return convention follows non-blocking socket semantics:
/// `write` and `read` return `Ok(0)` when the call could not transfer any
/// bytes right now (would-block), and for `read` also at end-of-stream —
/// the two are deliberately indistinguishable at this layer. Callers that
/// were promised data by `ready_for_reading` treat a zero read as the peer
/// hanging up. Any `Err` is a hard transport failure.
pub trait Transport: Send {
    /// Switch the stream between blocking and non-blocking mode.
    ///
    /// The comms workers switch their half to non-blocking on startup.
    fn set_blocking(&mut self, blocking: bool) -> io::Result<()>;

    /// Write up to `buf.len()` bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes, returning how many were received.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Wait for the stream to become readable.
    fn ready_for_reading(&self, timeout: PollTimeout) -> io::Result<bool>;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn poll_timeout_from_duration() {
        assert_eq!(
            PollTimeout::from(Duration::from_millis(250)),
            PollTimeout::Millis(250)
        );
        assert_eq!(
            PollTimeout::from(Duration::from_secs(2)),
            PollTimeout::Millis(2000)
        );
    }

    #[test]
    fn poll_timeout_saturates_on_huge_durations() {
        assert_eq!(
            PollTimeout::from(Duration::from_secs(u64::MAX / 1000)),
            PollTimeout::Millis(u32::MAX)
        );
    }
}
