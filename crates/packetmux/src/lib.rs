//! Bidirectional, type-tagged packet multiplexing over a byte stream.
//!
//! A [`PacketMuxer`] serialises packets posted from any number of producer
//! threads into one framed stream on the write half of a connection; a
//! [`PacketDemuxer`] parses the read half back into packets and fans each
//! one out to the callbacks subscribed to its type. Run one of each on both
//! peers for full-duplex traffic.
//!
//! The comms system knows nothing about payload contents — serialisation of
//! application data happens outside, and only byte buffers plus their type
//! ids travel through here.
//!
//! ```no_run
//! use std::sync::Arc;
//! use packetmux::{IdRegistry, PacketMuxer, PacketDemuxer};
//! use packetmux_transport::TcpTransport;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(IdRegistry::from_names(["Telemetry", "Command"])?);
//! let stream = std::net::TcpStream::connect("127.0.0.1:4000")?;
//! let (read_half, write_half) = TcpTransport::split(stream)?;
//!
//! let muxer = PacketMuxer::new(write_half, Arc::clone(&registry));
//! let demuxer = PacketDemuxer::new(read_half, registry);
//!
//! let _subscription = demuxer.subscribe("Telemetry", |packet| {
//!     println!("{} telemetry bytes", packet.len());
//! })?;
//!
//! muxer.post("Command", b"go".to_vec())?;
//! # Ok(())
//! # }
//! ```

pub mod demuxer;
pub mod error;
pub mod muxer;
pub mod subscriber;
pub mod subscription;

pub use demuxer::{DemuxerConfig, DemuxerRef, PacketDemuxer};
pub use error::{CommsError, Result};
pub use muxer::{MuxerConfig, PacketMuxer};
pub use subscriber::Subscriber;
pub use subscription::PacketSubscription;

pub use packetmux_frame::{ControlMessage, IdRegistry, Packet, PacketTypeId};
