use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::BytesMut;
use packetmux_frame::{codec, ControlMessage, FrameError, IdRegistry, Packet, DEFAULT_MAX_PAYLOAD};
use packetmux_transport::Transport;
use tracing::{debug, warn};

use crate::error::{CommsError, Result};

const INITIAL_ENCODE_CAPACITY: usize = 8 * 1024;

/// Tuning knobs for a [`PacketMuxer`].
#[derive(Debug, Clone)]
pub struct MuxerConfig {
    /// Idle time after which a heartbeat control packet is sent.
    pub heartbeat_interval: Duration,
    /// Maximum accepted payload size.
    pub max_payload_size: usize,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(1),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Transmit queues and the posted counter, all behind one lock.
struct TxState {
    /// One FIFO per type id, indexed densely by id. Queue 0 (the invalid
    /// id) exists only to keep the indexing direct and stays empty.
    queues: Vec<VecDeque<Packet>>,
    posted: u32,
}

struct MuxerShared {
    registry: Arc<IdRegistry>,
    config: MuxerConfig,
    state: Mutex<TxState>,
    tx_ready: Condvar,
    sent: AtomicU32,
    transport_error: AtomicBool,
}

impl MuxerShared {
    fn lock_state(&self) -> MutexGuard<'_, TxState> {
        // Nothing that can panic runs under this lock, so poisoning would
        // itself be a bug worth crashing on.
        self.state.lock().expect("muxer transmit lock poisoned")
    }

    fn enqueue(&self, packet: Packet) {
        let mut state = self.lock_state();
        state.queues[packet.type_id() as usize].push_back(packet);
        state.posted = state.posted.wrapping_add(1);
        self.tx_ready.notify_one();
    }

    fn fail(&self) {
        self.transport_error.store(true, Ordering::Release);
    }

    fn failed(&self) -> bool {
        self.transport_error.load(Ordering::Acquire)
    }
}

/// Serialises packets from any number of producer threads onto the write
/// half of one connection.
///
/// Posting never blocks on the transport: packets land in per-type FIFO
/// queues and a dedicated sender thread drains them in type-id order (a
/// fixed priority, control traffic first). The first record on the wire is
/// always a `Hello` control packet, and an idle connection is kept warm
/// with heartbeats.
///
/// The muxer only ever writes to its transport half. The first transport
/// failure latches [`ok`](PacketMuxer::ok) to false and stops the sender;
/// there is no reconnect.
pub struct PacketMuxer {
    shared: Arc<MuxerShared>,
    sender: Option<JoinHandle<()>>,
}

impl PacketMuxer {
    /// Start a muxer with default configuration.
    pub fn new<T>(transport: T, registry: Arc<IdRegistry>) -> Self
    where
        T: Transport + 'static,
    {
        Self::with_config(transport, registry, MuxerConfig::default())
    }

    /// Start a muxer with explicit configuration.
    pub fn with_config<T>(transport: T, registry: Arc<IdRegistry>, config: MuxerConfig) -> Self
    where
        T: Transport + 'static,
    {
        let shared = Arc::new(MuxerShared {
            state: Mutex::new(TxState {
                queues: (0..registry.len()).map(|_| VecDeque::new()).collect(),
                posted: 0,
            }),
            registry,
            config,
            tx_ready: Condvar::new(),
            sent: AtomicU32::new(0),
            transport_error: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let sender = std::thread::Builder::new()
            .name("packetmux-sender".to_string())
            .spawn(move || send_loop(transport, worker_shared))
            .expect("spawn muxer sender thread");

        Self {
            shared,
            sender: Some(sender),
        }
    }

    /// Queue a packet for sending and wake the sender.
    ///
    /// Callable from any thread. Fails synchronously on an unknown type
    /// name, an oversized payload, or once shutdown has begun (a latched
    /// transport failure or a destructor in progress); the packet would
    /// only be discarded, so it is rejected instead of queued.
    pub fn post(&self, name: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        if self.shared.failed() {
            return Err(CommsError::ShuttingDown);
        }
        let type_id = self.shared.registry.id_of(name)?;
        let payload = payload.into();
        // Reject oversized payloads at the call site rather than letting the
        // sender thread trip over them asynchronously.
        if payload.len() > self.shared.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.shared.config.max_payload_size,
            }
            .into());
        }
        self.shared.enqueue(Packet::from_vec(type_id, payload));
        Ok(())
    }

    /// True until the first transport failure.
    pub fn ok(&self) -> bool {
        !self.shared.failed()
    }

    /// Packets queued so far, control packets included. Wraps at `u32`.
    pub fn posted_count(&self) -> u32 {
        self.shared.lock_state().posted
    }

    /// Packets fully written to the transport so far. Wraps at `u32`.
    pub fn sent_count(&self) -> u32 {
        self.shared.sent.load(Ordering::Relaxed)
    }

    /// The registry this muxer resolves names against.
    pub fn registry(&self) -> &Arc<IdRegistry> {
        &self.shared.registry
    }
}

impl Drop for PacketMuxer {
    fn drop(&mut self) {
        // Latch the error flag first: a sender spinning on a would-block
        // write observes it without needing the lock.
        self.shared.fail();
        {
            let _state = self.shared.lock_state();
            self.shared.tx_ready.notify_all();
        }
        if let Some(sender) = self.sender.take() {
            if sender.join().is_err() {
                warn!("muxer sender thread panicked");
            }
        }
    }
}

fn send_loop<T: Transport>(mut transport: T, shared: Arc<MuxerShared>) {
    debug!("muxer send loop entered");

    if let Err(err) = transport.set_blocking(false) {
        warn!(%err, "could not switch transport to non-blocking");
        shared.fail();
        return;
    }

    // Hello must be the first record on the wire. It is enqueued rather
    // than written directly so the normal drain below frames it; the
    // control queue has the highest priority, so even packets posted
    // before this thread got scheduled cannot overtake it.
    shared.enqueue(Packet::control(ControlMessage::Hello));

    let mut scratch = BytesMut::with_capacity(INITIAL_ENCODE_CAPACITY);
    let mut state = shared.lock_state();

    while !shared.failed() {
        if state.posted == shared.sent.load(Ordering::Relaxed) {
            let (guard, wait) = shared
                .tx_ready
                .wait_timeout(state, shared.config.heartbeat_interval)
                .expect("muxer transmit lock poisoned");
            state = guard;
            if wait.timed_out() {
                // Nothing to send for a whole interval: post a heartbeat so
                // the peer knows we are alive and a dead peer is noticed
                // here at the socket level. The lock is already held, so
                // the packet goes straight into the queue.
                let heartbeat = Packet::control(ControlMessage::HeartBeat);
                state.queues[heartbeat.type_id() as usize].push_back(heartbeat);
                state.posted = state.posted.wrapping_add(1);
            }
        }

        // Drain in id order: a fixed priority with control traffic first
        // and FIFO order within each type. A continuously hot queue can
        // starve the ones after it; the transport is assumed to keep up
        // with aggregate load.
        'drain: for queue_index in 0..state.queues.len() {
            while let Some(packet) = state.queues[queue_index].pop_front() {
                match send_packet(&shared, &mut transport, &packet, &mut scratch) {
                    Ok(()) => {
                        shared.sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        warn!(%err, "transport write failed");
                        shared.fail();
                        break 'drain;
                    }
                }
            }
        }
    }

    debug!("muxer send loop exited");
}

/// Frame one packet and push every byte out, retrying would-block writes.
fn send_packet<T: Transport>(
    shared: &MuxerShared,
    transport: &mut T,
    packet: &Packet,
    scratch: &mut BytesMut,
) -> packetmux_frame::Result<()> {
    debug_assert!(!packet.is_invalid());

    scratch.clear();
    codec::encode_packet(packet, scratch, shared.config.max_payload_size)?;

    let mut remaining: &[u8] = scratch;
    while !remaining.is_empty() {
        if shared.failed() {
            return Err(FrameError::ConnectionClosed);
        }
        match transport.write(remaining) {
            // Would-block: the transport accepted nothing, try again.
            Ok(0) => continue,
            Ok(n) => remaining = &remaining[n..],
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}
