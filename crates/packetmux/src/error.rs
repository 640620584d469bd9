use packetmux_frame::{FrameError, RegistryError};

/// Errors surfaced synchronously by muxer and demuxer calls.
///
/// Transport failures never appear here: they are reported asynchronously
/// through the sticky `ok()` flag on the owning muxer or demuxer, because
/// the worker that hits them runs on its own thread.
#[derive(Debug, thiserror::Error)]
pub enum CommsError {
    /// A packet type name or id was not in the registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A payload violated the framing limits.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The call arrived after a transport failure or destructor had
    /// already begun tearing the worker down; the packet was not queued.
    #[error("shutting down; packet not queued")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, CommsError>;
