//! Packet framing and identity for the packetmux comms system.
//!
//! Everything on the wire is a type-tagged record:
//! - An 8-byte header: packet type id and payload size, both big-endian u32
//! - The opaque payload bytes
//!
//! Type ids are small dense integers agreed out of band: both peers build an
//! [`IdRegistry`] from the same ordered name list, so no id negotiation
//! happens on the wire. Ids `0` (invalid) and `1` (control) are reserved.

pub mod codec;
pub mod control;
pub mod error;
pub mod ids;
pub mod packet;
pub mod registry;

pub use codec::{decode_header, encode_packet, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use control::ControlMessage;
pub use error::{FrameError, RegistryError, Result};
pub use ids::{PacketTypeId, CONTROL, CONTROL_NAME, FIRST_APPLICATION_ID, INVALID, INVALID_NAME};
pub use packet::Packet;
pub use registry::IdRegistry;
