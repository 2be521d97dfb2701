use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

use crate::stream::StreamTransport;

/// In-process transport, one end of a [`pair`].
pub type MemoryTransport = StreamTransport<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Two connected in-memory transports.
///
/// Frames written to one end are read from the other, with the same
/// partial-read and end-of-stream behavior as a socket.
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let (a, b) = tokio::io::duplex(PIPE_CAPACITY);
    (
        StreamTransport::from_stream(a).with_label("memory-a"),
        StreamTransport::from_stream(b).with_label("memory-b"),
    )
}
