//! Byte-stream transports for Compost RPC.
//!
//! A transport moves whole frames in both directions. Everything here is a
//! thin adapter over [`StreamTransport`], which frames any async byte stream:
//! - TCP client sockets
//! - Unix domain sockets (Linux/macOS)
//! - stdin/stdout of a spawned child process
//! - in-process loopback pairs for tests

pub mod error;
pub mod memory;
pub mod process;
pub mod stream;
pub mod target;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use process::ProcessTransport;
pub use stream::StreamTransport;
pub use target::{Connection, Target};
pub use tcp::TcpTransport;
pub use traits::Transport;

#[cfg(unix)]
pub use uds::UdsTransport;

// Re-exported so callers can drive `Transport::read_frame` without a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
