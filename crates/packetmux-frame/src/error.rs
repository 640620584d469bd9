use crate::ids::PacketTypeId;

/// Errors from encoding or decoding framed packets.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame carried (or was about to carry) the reserved invalid type id.
    #[error("invalid packet type id on the wire")]
    InvalidTypeId,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended where framed bytes were expected.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

/// Errors from building or querying an [`IdRegistry`](crate::IdRegistry).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The name was never registered.
    #[error("unknown packet type name '{0}'")]
    UnknownName(String),

    /// The id is outside the registered range.
    #[error("unknown packet type id {0}")]
    UnknownId(PacketTypeId),

    /// The same name appeared twice in the registration list.
    #[error("duplicate packet type name '{0}'")]
    DuplicateName(String),

    /// An application tried to register one of the reserved names.
    #[error("packet type name '{0}' is reserved")]
    ReservedName(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
