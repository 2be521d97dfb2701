use std::sync::Arc;
use std::time::Duration;

use compost_codec::CodecError;
use compost_frame::FrameError;
use compost_transport::TransportError;

/// The remote endpoint or the local protocol description disagree about a call.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// No rpc with this name is registered.
    #[error("unknown rpc '{name}'")]
    UnknownCall { name: String },

    /// No notification with this name is registered.
    #[error("unknown notification '{name}'")]
    UnknownNotification { name: String },

    /// The argument or result types differ from the registration.
    #[error("'{name}' is registered as {expected}, called as {found}")]
    SignatureMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// The response carried a different rpc id than the request.
    #[error("'{name}' expected response rpc id {expected:#05x}, got {received:#05x}")]
    MismatchedResponse {
        name: String,
        expected: u16,
        received: u16,
    },

    /// Every transaction id is in flight.
    #[error("too many concurrent calls (transaction id {txn} still pending)")]
    TooManyConcurrentCalls { txn: u8 },

    /// The remote endpoint reported a failure while executing the call.
    #[error("remote endpoint reported an error for '{name}'")]
    ErrorResponse { name: String },

    /// The remote endpoint does not implement the requested rpc id.
    #[error("remote endpoint does not support '{name}' (rpc id {rpc_id:#05x})")]
    UnsupportedRequest { name: String, rpc_id: u16 },

    /// A protocol table entry cannot be registered.
    #[error("invalid registration '{name}': {reason}")]
    InvalidRegistration { name: String, reason: String },
}

/// Errors returned by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),

    /// A frame could not be built (e.g. rpc id out of range).
    #[error("frame error: {0}")]
    Frame(FrameError),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The call was abandoned because the session shut down.
    #[error("call cancelled")]
    Cancelled,

    /// The reader task stopped on a transport fault.
    #[error("session reader failed: {0}")]
    ReaderFailed(Arc<TransportError>),

    /// The reader task ignored cancellation for the whole grace period.
    #[error("session reader did not stop within {0:?}")]
    ReaderStuck(Duration),

    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Whether the fault lies with the connection rather than the call.
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(_) | SessionError::ReaderFailed(_) | SessionError::ReaderStuck(_)
        )
    }
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Codec(codec) => SessionError::Serialization(codec),
            other => SessionError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_codec_errors_become_serialization_faults() {
        let err: SessionError = FrameError::Codec(CodecError::InvalidPackedWidth { width: 70 }).into();
        assert!(matches!(err, SessionError::Serialization(_)));

        let err: SessionError = FrameError::InvalidRpcId { rpc_id: 0x1000 }.into();
        assert!(matches!(err, SessionError::Frame(_)));
    }

    #[test]
    fn transport_fault_class() {
        assert!(SessionError::ReaderFailed(Arc::new(TransportError::Closed)).is_transport_fault());
        assert!(SessionError::Transport(TransportError::Closed).is_transport_fault());
        assert!(!SessionError::Timeout(Duration::from_secs(1)).is_transport_fault());
        assert!(!SessionError::Protocol(ProtocolError::TooManyConcurrentCalls { txn: 1 })
            .is_transport_fault());
    }

    #[test]
    fn messages_name_the_call() {
        let err = ProtocolError::UnsupportedRequest {
            name: "add".into(),
            rpc_id: 0x010,
        };
        assert_eq!(
            err.to_string(),
            "remote endpoint does not support 'add' (rpc id 0x010)"
        );
    }
}
