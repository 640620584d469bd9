//! Mock transports shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use packetmux_frame::{codec, Packet, PacketTypeId, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
use packetmux_transport::{PollTimeout, Transport};

/// Always claims readability and fails every read and write, like a peer
/// that hung up hard before we got going.
pub struct AlwaysFailTransport;

impl Transport for AlwaysFailTransport {
    fn set_blocking(&mut self, _blocking: bool) -> io::Result<()> {
        Ok(())
    }
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock failure"))
    }
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock failure"))
    }
    fn ready_for_reading(&self, _timeout: PollTimeout) -> io::Result<bool> {
        Ok(true)
    }
}

/// Captures every byte a muxer writes; reading is a test bug.
#[derive(Default)]
pub struct RecordingTransport {
    written: Arc<Mutex<Vec<u8>>>,
}

impl RecordingTransport {
    pub fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let transport = Self::default();
        let written = Arc::clone(&transport.written);
        (transport, written)
    }
}

impl Transport for RecordingTransport {
    fn set_blocking(&mut self, _blocking: bool) -> io::Result<()> {
        Ok(())
    }
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        panic!("a muxer transport must never be read");
    }
    fn ready_for_reading(&self, _timeout: PollTimeout) -> io::Result<bool> {
        panic!("a muxer transport must never be polled for reading");
    }
}

/// Serves canned wire bytes to a demuxer; the test side feeds more bytes
/// through the paired [`ScriptFeeder`] while the demuxer runs.
pub struct ScriptedTransport {
    incoming: Arc<Mutex<VecDeque<u8>>>,
}

impl ScriptedTransport {
    pub fn new() -> (Self, ScriptFeeder) {
        let incoming = Arc::new(Mutex::new(VecDeque::new()));
        (
            Self {
                incoming: Arc::clone(&incoming),
            },
            ScriptFeeder { incoming },
        )
    }
}

impl Transport for ScriptedTransport {
    fn set_blocking(&mut self, _blocking: bool) -> io::Result<()> {
        Ok(())
    }
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        panic!("a demuxer transport must never be written");
    }
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut incoming = self.incoming.lock().unwrap();
        let n = incoming.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = incoming.pop_front().unwrap();
        }
        Ok(n)
    }
    fn ready_for_reading(&self, timeout: PollTimeout) -> io::Result<bool> {
        let deadline = match timeout {
            PollTimeout::Immediate => Some(Instant::now()),
            PollTimeout::Millis(ms) => Some(Instant::now() + Duration::from_millis(u64::from(ms))),
            PollTimeout::Infinite => None,
        };
        loop {
            if !self.incoming.lock().unwrap().is_empty() {
                return Ok(true);
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(false);
                }
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Feeds wire bytes into a [`ScriptedTransport`].
pub struct ScriptFeeder {
    incoming: Arc<Mutex<VecDeque<u8>>>,
}

impl ScriptFeeder {
    /// Append one well-formed framed record.
    pub fn push_record(&self, type_id: PacketTypeId, payload: &[u8]) {
        let mut wire = BytesMut::new();
        codec::encode_packet(
            &Packet::from_slice(type_id, payload),
            &mut wire,
            DEFAULT_MAX_PAYLOAD,
        )
        .unwrap();
        self.push_raw(&wire);
    }

    /// Append arbitrary bytes, malformed framing included.
    pub fn push_raw(&self, bytes: &[u8]) {
        self.incoming.lock().unwrap().extend(bytes.iter().copied());
    }
}

/// Split a recorded wire stream back into `(type id, payload)` records.
pub fn parse_records(mut bytes: &[u8]) -> Vec<(PacketTypeId, Vec<u8>)> {
    let mut records = Vec::new();
    while !bytes.is_empty() {
        assert!(bytes.len() >= HEADER_SIZE, "truncated header in stream");
        let header: [u8; HEADER_SIZE] = bytes[..HEADER_SIZE].try_into().unwrap();
        let (type_id, size) = codec::decode_header(&header);
        let end = HEADER_SIZE + size as usize;
        assert!(bytes.len() >= end, "truncated payload in stream");
        records.push((type_id, bytes[HEADER_SIZE..end].to_vec()));
        bytes = &bytes[end..];
    }
    records
}

/// Spin until `condition` holds, panicking after `deadline`.
pub fn wait_for(deadline: Duration, what: &str, mut condition: impl FnMut() -> bool) {
    let give_up = Instant::now() + deadline;
    while !condition() {
        assert!(Instant::now() < give_up, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}
