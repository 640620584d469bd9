use std::sync::{Arc, Weak};

use packetmux_frame::{Packet, PacketTypeId};

use crate::demuxer::{DemuxShared, DemuxerRef};

/// Callback invoked on the receiver thread for every packet of the
/// subscribed type. The packet is shared; keep the `Arc` if the payload is
/// needed beyond the call.
pub type PacketCallback = Box<dyn Fn(&Arc<Packet>) + Send + Sync + 'static>;

/// A registered interest in one packet type.
///
/// Records are created by [`PacketDemuxer::subscribe`] only and are owned
/// jointly by the demuxer's subscription table and the returned
/// [`PacketSubscription`] handle. The back-reference to the demuxer is
/// weak, so a surviving handle never keeps a dropped demuxer alive.
///
/// [`PacketDemuxer::subscribe`]: crate::PacketDemuxer::subscribe
/// [`PacketSubscription`]: crate::PacketSubscription
pub struct Subscriber {
    type_id: PacketTypeId,
    callback: PacketCallback,
    demuxer: Weak<DemuxShared>,
}

impl Subscriber {
    pub(crate) fn new(
        type_id: PacketTypeId,
        callback: PacketCallback,
        demuxer: Weak<DemuxShared>,
    ) -> Self {
        Self {
            type_id,
            callback,
            demuxer,
        }
    }

    /// The packet type this subscriber receives.
    pub fn type_id(&self) -> PacketTypeId {
        self.type_id
    }

    pub(crate) fn demuxer(&self) -> DemuxerRef {
        DemuxerRef::new(self.demuxer.clone())
    }

    pub(crate) fn deliver(&self, packet: &Arc<Packet>) {
        (self.callback)(packet);
    }

    pub(crate) fn unsubscribe(this: &Arc<Self>) {
        if let Some(demuxer) = this.demuxer.upgrade() {
            demuxer.unsubscribe(this);
        }
    }

    pub(crate) fn is_subscribed(this: &Arc<Self>) -> bool {
        match this.demuxer.upgrade() {
            Some(demuxer) => demuxer.is_subscribed(this),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("type_id", &self.type_id)
            .finish()
    }
}
