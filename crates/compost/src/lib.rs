//! Compact binary RPC for resource-constrained remote endpoints.
//!
//! Compost carries typed calls and notifications in small word-aligned frames
//! over any byte stream: serial lines, sockets or a child process's pipes.
//!
//! # Crate Structure
//!
//! - [`codec`] - Bit-level value encoding, records, enums and message shapes
//! - [`frame`] - Frame header and framing over sync and async streams
//! - [`transport`] - TCP, Unix socket, child-process and in-memory transports
//! - [`session`] - Call multiplexing, notifications, protocol tables and the TCP proxy

/// Re-export codec types.
pub mod codec {
    pub use compost_codec::*;
}

/// Re-export frame types.
pub mod frame {
    pub use compost_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use compost_transport::*;
}

/// Re-export session types.
pub mod session {
    pub use compost_session::*;
}

pub use compost_codec::{compost_enum, compost_struct, Compost, Message, Shape};
pub use compost_frame::Frame;
pub use compost_session::{Protocol, ProtocolTable, Session, SessionConfig, SessionError};
pub use compost_transport::{Target, Transport};
