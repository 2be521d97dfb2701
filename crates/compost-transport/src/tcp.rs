use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::StreamTransport;

/// Transport over a connected TCP socket.
pub type TcpTransport = StreamTransport<OwnedReadHalf, OwnedWriteHalf>;

/// Connect to a remote endpoint over TCP.
pub async fn connect<A>(addr: A) -> Result<TcpTransport>
where
    A: ToSocketAddrs + std::fmt::Display,
{
    let label = addr.to_string();
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: label.clone(),
            source,
        })?;
    from_stream(stream, label)
}

/// Wrap an already connected socket (e.g. one returned by `accept`).
pub fn from_stream(stream: TcpStream, label: impl Into<String>) -> Result<TcpTransport> {
    stream.set_nodelay(true)?;
    let label = label.into();
    debug!(peer = %label, "tcp transport ready");
    let (reader, writer) = stream.into_split();
    Ok(StreamTransport::new(reader, writer).with_label(label))
}
