//! One-byte control messages carried in `CONTROL` packets.
//!
//! The muxer speaks these to the peer's demuxer; the protocol is one-way
//! and a demuxer never answers.

/// Payload byte of a control packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlMessage {
    /// Sent whenever the connection has been idle for the heartbeat
    /// interval, both to keep the stream warm and so a dead peer is
    /// noticed at the socket level.
    HeartBeat = 0x00,
    /// The first record on every fresh connection.
    Hello = 0xFE,
    /// A polite hang-up. Recognised but not yet sent.
    GoodBye = 0xFF,
}

impl ControlMessage {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(ControlMessage::HeartBeat),
            0xFE => Some(ControlMessage::Hello),
            0xFF => Some(ControlMessage::GoodBye),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_mapping_round_trips() {
        for msg in [
            ControlMessage::HeartBeat,
            ControlMessage::Hello,
            ControlMessage::GoodBye,
        ] {
            assert_eq!(ControlMessage::from_byte(msg.as_byte()), Some(msg));
        }
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        assert_eq!(ControlMessage::from_byte(0x01), None);
        assert_eq!(ControlMessage::from_byte(0x80), None);
    }

    #[test]
    fn wire_values_are_fixed() {
        assert_eq!(ControlMessage::HeartBeat.as_byte(), 0x00);
        assert_eq!(ControlMessage::Hello.as_byte(), 0xFE);
        assert_eq!(ControlMessage::GoodBye.as_byte(), 0xFF);
    }
}
