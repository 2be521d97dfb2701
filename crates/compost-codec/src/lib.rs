//! Bit-exact wire codec for the Compost RPC protocol.
//!
//! Values are written into a pre-sized buffer at a running [`BitSize`]
//! cursor. Natural-width values start on the next byte boundary; fields
//! declared with `#[bits(N)]` are packed MSB-first at arbitrary bit offsets.
//!
//! - [`Compost`] - encodable value (primitives, strings, lists, records, enums)
//! - [`Message`] - ordered tuple of values forming a frame payload
//! - [`Shape`] - memoized description of a message signature
//! - [`compost_struct!`] / [`compost_enum!`] - record and enum declarations

pub mod bits;
pub mod buffer;
pub mod error;
pub mod layout;
mod macros;
pub mod packing;
pub mod shape;
pub mod wire;

pub use bits::BitSize;
pub use buffer::{init_buffer, HEADER_SIZE, LIST_LENGTH_SIZE, MESSAGE_BODY_LIMIT};
pub use error::{CodecError, Result};
pub use layout::{layout_of, static_size_of, FieldDesc, Layout, TypeDesc};
pub use packing::{pack_bits, unpack_bits, Packable};
pub use shape::{Message, Shape};
pub use wire::Compost;
