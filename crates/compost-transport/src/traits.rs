use std::future::Future;
use std::sync::Arc;

use compost_frame::Frame;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A bidirectional frame channel to one remote endpoint.
///
/// A session owns exactly one reader; writes may come from many tasks and
/// must each land on the wire as one contiguous frame.
pub trait Transport: Send + Sync + 'static {
    /// Write one frame completely.
    fn write_frame(&self, frame: &Frame) -> impl Future<Output = Result<()>> + Send;

    /// Read the next frame.
    ///
    /// Must return [`TransportError::Cancelled`](crate::TransportError::Cancelled)
    /// promptly once `cancel` fires, and [`TransportError::Frame`](crate::TransportError::Frame)
    /// with a truncation error when the stream ends inside a frame.
    ///
    /// Only transports that can keep reading afterwards should report an
    /// error for which [`TransportError::is_retryable`](crate::TransportError::is_retryable)
    /// holds; a session retries those and treats every other error as fatal.
    fn read_frame(&self, cancel: &CancellationToken)
        -> impl Future<Output = Result<Frame>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn write_frame(&self, frame: &Frame) -> impl Future<Output = Result<()>> + Send {
        T::write_frame(self, frame)
    }

    fn read_frame(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Frame>> + Send {
        T::read_frame(self, cancel)
    }
}
