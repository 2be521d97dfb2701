//! Compost RPC framing.
//!
//! Every message is a 4-byte header followed by a word-aligned payload:
//! - payload length in 4-byte words (0-255)
//! - transaction id (0 for notifications)
//! - 12-bit rpc id plus a response flag
//!
//! Frames are immutable once built and cheap to clone.

pub mod codec;
pub mod error;
pub mod frame;
pub mod header;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::CompostCodec;
pub use codec::{decode_frame, encode_frame};
pub use error::{FrameError, Result};
pub use frame::Frame;
pub use header::{Header, ERROR_RESPONSE, MAX_RPC_ID, UNSUPPORTED_RESPONSE};
pub use reader::FrameReader;
pub use writer::FrameWriter;
