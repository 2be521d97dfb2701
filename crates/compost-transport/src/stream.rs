use std::fmt;

use compost_frame::{CompostCodec, Frame};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Frames an async byte stream split into read and write halves.
///
/// Reads are cancel-safe: a read abandoned through its token keeps any
/// partially received bytes buffered for the next call.
///
/// `FramedRead` ends the stream after its first error, so every read error
/// here is final and the next read reports [`TransportError::Closed`].
pub struct StreamTransport<R, W> {
    reader: Mutex<FramedRead<R, CompostCodec>>,
    writer: Mutex<FramedWrite<W, CompostCodec>>,
    label: String,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a transport over separate read and write halves.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(FramedRead::new(reader, CompostCodec)),
            writer: Mutex::new(FramedWrite::new(writer, CompostCodec)),
            label: "stream".to_string(),
        }
    }

    /// Name used in log records for this transport.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<S> StreamTransport<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Create a transport over a single duplex stream.
    pub fn from_stream(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&self, frame: &Frame) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.send(frame).await?;
        trace!(transport = %self.label, %frame, "frame written");
        Ok(())
    }

    async fn read_frame(&self, cancel: &CancellationToken) -> Result<Frame> {
        let mut reader = self.reader.lock().await;
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            next = reader.next() => next,
        };
        match next {
            Some(Ok(frame)) => {
                trace!(transport = %self.label, %frame, "frame read");
                Ok(frame)
            }
            Some(Err(err)) => Err(err.into()),
            None => Err(TransportError::Closed),
        }
    }
}

impl<R, W> fmt::Debug for StreamTransport<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTransport")
            .field("label", &self.label)
            .finish()
    }
}
