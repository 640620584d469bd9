use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::ids::{PacketTypeId, INVALID};
use crate::packet::Packet;

/// Frame header: type id (4) + payload size (4), both big-endian.
pub const HEADER_SIZE: usize = 8;

/// Default maximum payload size: 16 MiB.
///
/// The header field allows payloads up to `u32::MAX`, but accepting that
/// would let a misbehaving peer force unbounded allocation; both ends
/// enforce a configurable ceiling instead.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Encode a packet into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌────────────────┬────────────────┬──────────────────┐
/// │ Type (4B BE)   │ Size (4B BE)   │ Payload          │
/// │ u32, never 0   │ u32            │ (Size bytes)     │
/// └────────────────┴────────────────┴──────────────────┘
/// ```
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut, max_payload: usize) -> Result<()> {
    if packet.type_id() == INVALID {
        return Err(FrameError::InvalidTypeId);
    }
    if packet.len() > max_payload || packet.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: packet.len(),
            max: max_payload.min(u32::MAX as usize),
        });
    }

    dst.reserve(HEADER_SIZE + packet.len());
    dst.put_u32(packet.type_id());
    dst.put_u32(packet.len() as u32);
    dst.put_slice(packet.data());
    Ok(())
}

/// Parse a frame header into `(type id, payload size)`.
///
/// Validation of the type id and the size ceiling is left to the caller,
/// which knows whether an invalid id is an assertion or a peer error.
pub fn decode_header(header: &[u8; HEADER_SIZE]) -> (PacketTypeId, u32) {
    let type_id = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    (type_id, size)
}
