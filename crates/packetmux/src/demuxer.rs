use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use packetmux_frame::{
    codec, ControlMessage, FrameError, IdRegistry, Packet, PacketTypeId, CONTROL, HEADER_SIZE,
    INVALID,
};
use packetmux_transport::{PollTimeout, Transport};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::subscriber::Subscriber;
use crate::subscription::PacketSubscription;

/// Tuning knobs for a [`PacketDemuxer`].
#[derive(Debug, Clone)]
pub struct DemuxerConfig {
    /// How long to wait for the peer's hello before giving up on checking it.
    pub hello_timeout: Duration,
    /// Poll timeout for each receive iteration; bounds shutdown latency.
    pub poll_timeout: Duration,
    /// Maximum accepted payload size.
    pub max_payload_size: usize,
}

impl Default for DemuxerConfig {
    fn default() -> Self {
        Self {
            hello_timeout: Duration::from_millis(2000),
            poll_timeout: Duration::from_millis(1000),
            max_payload_size: codec::DEFAULT_MAX_PAYLOAD,
        }
    }
}

pub(crate) struct DemuxShared {
    registry: Arc<IdRegistry>,
    subscribers: Mutex<HashMap<PacketTypeId, Vec<Arc<Subscriber>>>>,
    transport_error: AtomicBool,
}

impl DemuxShared {
    /// A panicking subscriber callback kills the receiver thread but must
    /// not poison the bookkeeping other threads still rely on.
    fn lock_subscribers(&self) -> MutexGuard<'_, HashMap<PacketTypeId, Vec<Arc<Subscriber>>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn unsubscribe(&self, subscriber: &Arc<Subscriber>) {
        let type_id = subscriber.type_id();
        let mut table = self.lock_subscribers();
        let entries = table.entry(type_id).or_default();
        let before = entries.len();
        entries.retain(|registered| !Arc::ptr_eq(registered, subscriber));
        debug_assert_eq!(
            before,
            entries.len() + 1,
            "unsubscribe of a record that was not registered"
        );
        debug!(
            packet = self.registry.name_of(type_id).unwrap_or("?"),
            "removed subscriber"
        );
    }

    pub(crate) fn is_subscribed(&self, subscriber: &Arc<Subscriber>) -> bool {
        let table = self.lock_subscribers();
        table
            .get(&subscriber.type_id())
            .is_some_and(|entries| entries.iter().any(|s| Arc::ptr_eq(s, subscriber)))
    }

    fn fail(&self) {
        self.transport_error.store(true, Ordering::Release);
    }

    fn failed(&self) -> bool {
        self.transport_error.load(Ordering::Acquire)
    }

    /// Fan a packet out to every subscriber of its type, or to the internal
    /// control handler. Runs on the receiver thread with the subscription
    /// lock held.
    fn dispatch(&self, packet: Packet) {
        let type_id = packet.type_id();
        let packet = Arc::new(packet);

        if type_id == CONTROL {
            self.handle_control(&packet);
            return;
        }

        let table = self.lock_subscribers();
        if let Some(entries) = table.get(&type_id) {
            for subscriber in entries {
                subscriber.deliver(&packet);
            }
        }
    }

    /// Control traffic is one-way muxer-to-demuxer; reading the packet is
    /// the whole acknowledgement, so nothing happens here beyond logging.
    fn handle_control(&self, packet: &Arc<Packet>) {
        match packet.data().first().copied().map(ControlMessage::from_byte) {
            Some(Some(message)) => trace!(?message, "control message"),
            _ => trace!("control packet with unrecognised payload"),
        }
    }

    fn warn_about_subscribers(&self) {
        let table = self.lock_subscribers();
        for (type_id, entries) in table.iter() {
            if !entries.is_empty() {
                warn!(
                    packet = self.registry.name_of(*type_id).unwrap_or("?"),
                    count = entries.len(),
                    "subscribers still registered at demuxer shutdown"
                );
            }
        }
    }
}

/// Non-owning, read-only view of the demuxer a subscription belongs to.
///
/// Holding one never keeps the demuxer alive; it answers liveness and
/// health questions for as long as the demuxer exists and degrades to
/// "gone, not ok" afterwards.
#[derive(Clone, Debug)]
pub struct DemuxerRef {
    shared: Weak<DemuxShared>,
}

impl DemuxerRef {
    pub(crate) fn new(shared: Weak<DemuxShared>) -> Self {
        Self { shared }
    }

    /// True while the owning demuxer has not been dropped.
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    /// The owning demuxer's [`ok`](PacketDemuxer::ok) flag; false once the
    /// demuxer is gone.
    pub fn ok(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| !shared.failed())
    }
}

/// Parses the read half of one connection back into packets and fans each
/// out to the callbacks subscribed to its type.
///
/// A dedicated receiver thread polls the transport, enforces the hello
/// check on the first record, intercepts control traffic, and invokes
/// subscriber callbacks synchronously. Callbacks therefore must not block
/// for long, and must not subscribe or unsubscribe on this demuxer from
/// inside the callback — the subscription lock is held during fan-out.
///
/// The demuxer only ever reads from its transport half. The first failure
/// (read error, premature end-of-stream, framing violation, or a first
/// record that is not hello) latches [`ok`](PacketDemuxer::ok) to false.
pub struct PacketDemuxer {
    shared: Arc<DemuxShared>,
    receiver: Option<JoinHandle<()>>,
}

impl PacketDemuxer {
    /// Start a demuxer with default configuration.
    pub fn new<T>(transport: T, registry: Arc<IdRegistry>) -> Self
    where
        T: Transport + 'static,
    {
        Self::with_config(transport, registry, DemuxerConfig::default())
    }

    /// Start a demuxer with explicit configuration.
    pub fn with_config<T>(transport: T, registry: Arc<IdRegistry>, config: DemuxerConfig) -> Self
    where
        T: Transport + 'static,
    {
        let shared = Arc::new(DemuxShared {
            registry,
            subscribers: Mutex::new(HashMap::new()),
            transport_error: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let receiver = std::thread::Builder::new()
            .name("packetmux-receiver".to_string())
            .spawn(move || receive_loop(transport, worker_shared, config))
            .expect("spawn demuxer receiver thread");

        Self {
            shared,
            receiver: Some(receiver),
        }
    }

    /// Register a callback for one packet type.
    ///
    /// The callback runs on the receiver thread for every arriving packet
    /// of that type, in arrival order. Dropping the returned handle removes
    /// the registration.
    ///
    /// Must not be called from inside a subscriber callback of this same
    /// demuxer; the subscription lock is held during dispatch.
    pub fn subscribe<F>(&self, name: &str, callback: F) -> Result<PacketSubscription>
    where
        F: Fn(&Arc<Packet>) + Send + Sync + 'static,
    {
        let type_id = self.shared.registry.id_of(name)?;
        let subscriber = Arc::new(Subscriber::new(
            type_id,
            Box::new(callback),
            Arc::downgrade(&self.shared),
        ));

        let mut table = self.shared.lock_subscribers();
        table
            .entry(type_id)
            .or_default()
            .push(Arc::clone(&subscriber));
        debug!(packet = name, "new subscriber");

        Ok(PacketSubscription::new(subscriber))
    }

    /// True until the first transport failure or hello check violation.
    pub fn ok(&self) -> bool {
        !self.shared.failed()
    }

    /// The registry this demuxer resolves names against.
    pub fn registry(&self) -> &Arc<IdRegistry> {
        &self.shared.registry
    }
}

impl Drop for PacketDemuxer {
    fn drop(&mut self) {
        self.shared.fail();
        if let Some(receiver) = self.receiver.take() {
            if receiver.join().is_err() {
                warn!("demuxer receiver thread panicked");
            }
        }
        // With the receiver joined, whatever is still in the table is a
        // subscription the application never dropped.
        self.shared.warn_about_subscribers();
    }
}

fn receive_loop<T: Transport>(mut transport: T, shared: Arc<DemuxShared>, config: DemuxerConfig) {
    debug!("demuxer receive loop entered");

    if let Err(err) = transport.set_blocking(false) {
        warn!(%err, "could not switch transport to non-blocking");
        shared.fail();
        return;
    }

    receive_hello(&mut transport, &shared, &config);

    while !shared.failed() {
        match receive_packet(&mut transport, &shared, config.poll_timeout, &config) {
            Ok(Some(packet)) => shared.dispatch(packet),
            Ok(None) => {}
            Err(err) => {
                warn!(%err, "receive failed");
                shared.fail();
            }
        }
    }

    debug!("demuxer receive loop exited");
}

/// Enforce the hello check: the first record on a fresh connection must be
/// a control packet carrying the hello byte.
///
/// This is an accident filter, not a security measure: it makes it very
/// unlikely that a stray connection speaking some other protocol gets its
/// bytes dispatched to subscribers. A connection that stays quiet through
/// the whole window passes unchecked and the demuxer stays ok.
fn receive_hello<T: Transport>(transport: &mut T, shared: &DemuxShared, config: &DemuxerConfig) {
    match receive_packet(transport, shared, config.hello_timeout, config) {
        Ok(Some(packet)) => {
            let is_hello = packet.type_id() == CONTROL
                && packet.data().first().copied() == Some(ControlMessage::Hello.as_byte());
            if is_hello {
                trace!("hello received");
            } else {
                warn!(
                    type_id = packet.type_id(),
                    "first record was not hello; refusing connection"
                );
                shared.fail();
            }
        }
        Ok(None) => {}
        Err(err) => {
            warn!(%err, "receive failed while waiting for hello");
            shared.fail();
        }
    }
}

/// Wait for readability, then read exactly one framed packet.
///
/// Returns `Ok(None)` when the poll timed out with nothing to read.
fn receive_packet<T: Transport>(
    transport: &mut T,
    shared: &DemuxShared,
    timeout: Duration,
    config: &DemuxerConfig,
) -> packetmux_frame::Result<Option<Packet>> {
    if !transport.ready_for_reading(PollTimeout::from(timeout))? {
        return Ok(None);
    }

    let mut header = [0u8; HEADER_SIZE];
    // Readiness promised bytes, so zero from the first header read means
    // the peer hung up. (Strictly, POLLIN can also fire for out-of-band
    // data; this layer keeps the conservative end-of-stream reading.)
    read_exact(transport, shared, &mut header[..4], true)?;
    read_exact(transport, shared, &mut header[4..], false)?;

    let (type_id, size) = codec::decode_header(&header);
    if type_id == INVALID {
        return Err(FrameError::InvalidTypeId);
    }
    if size as usize > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: size as usize,
            max: config.max_payload_size,
        });
    }

    let mut packet = Packet::with_len(type_id, size as usize);
    read_exact(transport, shared, packet.data_mut(), false)?;
    Ok(Some(packet))
}

/// Read until `buf` is full.
///
/// With `fail_on_zero` a zero-byte read is end-of-stream; otherwise it
/// just means the rest of the frame has not arrived yet and the read is
/// retried until it has, or until the error flag trips.
fn read_exact<T: Transport>(
    transport: &mut T,
    shared: &DemuxShared,
    buf: &mut [u8],
    fail_on_zero: bool,
) -> packetmux_frame::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        if shared.failed() {
            return Err(FrameError::ConnectionClosed);
        }
        match transport.read(&mut buf[filled..]) {
            Ok(0) if fail_on_zero => return Err(FrameError::ConnectionClosed),
            Ok(0) => continue,
            Ok(n) => filled += n,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}
