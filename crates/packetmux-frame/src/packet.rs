use crate::control::ControlMessage;
use crate::ids::{PacketTypeId, CONTROL, INVALID};

/// A type-tagged byte buffer, the unit of transfer.
///
/// Packets are move-only values: there is deliberately no `Clone`, because
/// duplicating payload buffers on the send or receive path is a performance
/// bug. Where several consumers need the same packet it is shared behind an
/// `Arc` instead.
///
/// `Packet::default()` is the invalid empty packet, so the C++-style "moved
/// from" state is available through `std::mem::take` where a packet must be
/// moved out of a slot.
#[derive(Debug, Default)]
pub struct Packet {
    type_id: PacketTypeId,
    data: Vec<u8>,
}

impl Packet {
    /// Copy `bytes` into a new packet.
    pub fn from_slice(type_id: PacketTypeId, bytes: &[u8]) -> Self {
        Self {
            type_id,
            data: bytes.to_vec(),
        }
    }

    /// Take ownership of an existing buffer without copying.
    pub fn from_vec(type_id: PacketTypeId, data: Vec<u8>) -> Self {
        Self { type_id, data }
    }

    /// Allocate a zero-filled payload of `len` bytes, to be filled in place.
    pub fn with_len(type_id: PacketTypeId, len: usize) -> Self {
        Self {
            type_id,
            data: vec![0; len],
        }
    }

    /// A control packet whose payload is the single message byte.
    pub fn control(message: ControlMessage) -> Self {
        Self {
            type_id: CONTROL,
            data: vec![message.as_byte()],
        }
    }

    pub fn type_id(&self) -> PacketTypeId {
        self.type_id
    }

    /// True for a default-constructed or taken-from packet.
    pub fn is_invalid(&self) -> bool {
        self.type_id == INVALID
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the packet and return its payload buffer.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_packet_is_invalid_and_empty() {
        let packet = Packet::default();
        assert!(packet.is_invalid());
        assert!(packet.is_empty());
        assert_eq!(packet.len(), 0);
    }

    #[test]
    fn from_slice_copies_bytes() {
        let bytes = b"hello";
        let packet = Packet::from_slice(2, bytes);
        assert_eq!(packet.type_id(), 2);
        assert_eq!(packet.data(), bytes);
    }

    #[test]
    fn from_vec_takes_ownership() {
        let packet = Packet::from_vec(3, vec![1, 2, 3]);
        assert_eq!(packet.type_id(), 3);
        assert_eq!(packet.into_data(), vec![1, 2, 3]);
    }

    #[test]
    fn with_len_preallocates_zeroed_payload() {
        let mut packet = Packet::with_len(2, 17);
        assert_eq!(packet.len(), 17);
        assert!(packet.data().iter().all(|&b| b == 0));

        packet.data_mut()[0] = 0xAB;
        assert_eq!(packet.data()[0], 0xAB);
    }

    #[test]
    fn taking_a_packet_leaves_the_invalid_empty_state() {
        let mut slot = Packet::from_slice(2, b"payload");
        let moved = std::mem::take(&mut slot);

        assert_eq!(moved.type_id(), 2);
        assert_eq!(moved.data(), b"payload");
        assert!(slot.is_invalid());
        assert!(slot.is_empty());
    }

    #[test]
    fn control_packet_has_one_message_byte() {
        let packet = Packet::control(ControlMessage::Hello);
        assert_eq!(packet.type_id(), CONTROL);
        assert_eq!(packet.data(), &[0xFE]);
    }
}
