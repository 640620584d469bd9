use std::sync::Arc;

use packetmux_frame::PacketTypeId;

use crate::demuxer::DemuxerRef;
use crate::subscriber::Subscriber;

/// Scoped token for one subscription.
///
/// Dropping the handle removes the underlying subscriber from its demuxer,
/// so holding it is what keeps the callback registered. The handle is
/// move-only; there is no way to duplicate a subscription.
///
/// Constructed only by [`PacketDemuxer::subscribe`].
///
/// [`PacketDemuxer::subscribe`]: crate::PacketDemuxer::subscribe
#[derive(Debug)]
pub struct PacketSubscription {
    subscriber: Arc<Subscriber>,
}

impl PacketSubscription {
    pub(crate) fn new(subscriber: Arc<Subscriber>) -> Self {
        Self { subscriber }
    }

    /// True while the underlying subscriber is still registered.
    ///
    /// Can turn false without this handle being dropped if the demuxer
    /// itself has been torn down.
    pub fn is_subscribed(&self) -> bool {
        Subscriber::is_subscribed(&self.subscriber)
    }

    /// The packet type this subscription delivers.
    pub fn type_id(&self) -> PacketTypeId {
        self.subscriber.type_id()
    }

    /// Read-only view of the demuxer that issued this subscription.
    pub fn demuxer(&self) -> DemuxerRef {
        self.subscriber.demuxer()
    }
}

impl Drop for PacketSubscription {
    fn drop(&mut self) {
        // The table holds the other strong reference; if ours is the last
        // one the demuxer is already gone and there is nothing to remove.
        if Arc::strong_count(&self.subscriber) > 1 {
            Subscriber::unsubscribe(&self.subscriber);
        }
    }
}
