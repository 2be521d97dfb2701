use std::path::Path;

use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::StreamTransport;

/// Transport over a connected Unix domain socket.
pub type UdsTransport = StreamTransport<OwnedReadHalf, OwnedWriteHalf>;

/// Connect to a filesystem-path Unix domain socket.
pub async fn connect(path: impl AsRef<Path>) -> Result<UdsTransport> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let stream = UnixStream::connect(path)
        .await
        .map_err(|source| TransportError::Connect {
            addr: label.clone(),
            source,
        })?;
    debug!(path = %label, "unix socket transport ready");
    let (reader, writer) = stream.into_split();
    Ok(StreamTransport::new(reader, writer).with_label(label))
}
