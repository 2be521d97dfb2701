use compost_codec::CodecError;

/// Errors that can occur while building, parsing, reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Rpc ids are 12 bits wide.
    #[error("rpc id {rpc_id:#x} exceeds 0xfff")]
    InvalidRpcId { rpc_id: u16 },

    /// The source ended in the middle of a frame.
    #[error("truncated frame ({received} of {expected} bytes)")]
    Truncated { expected: usize, received: usize },

    /// The stream ended cleanly between frames.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
