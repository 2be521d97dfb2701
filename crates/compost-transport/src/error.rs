use std::io;

use compost_frame::FrameError;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    /// Failed to start the child process.
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: String, source: io::Error },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// The byte stream did not carry a valid frame.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The remote end closed the stream between frames.
    #[error("transport closed by remote")]
    Closed,

    /// The read was abandoned because its cancellation token fired.
    #[error("transport read cancelled")]
    Cancelled,
}

impl TransportError {
    /// Whether a read that failed this way may simply be retried.
    pub fn is_retryable(&self) -> bool {
        let io = match self {
            TransportError::Io(err) | TransportError::Frame(FrameError::Io(err)) => err,
            _ => return false,
        };
        matches!(
            io.kind(),
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        )
    }
}

impl From<TransportError> for io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(source)
            | TransportError::Connect { source, .. }
            | TransportError::Spawn { source, .. }
            | TransportError::Frame(FrameError::Io(source)) => source,
            TransportError::Closed => io::Error::from(io::ErrorKind::UnexpectedEof),
            other => io::Error::other(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
