use crate::bits::BitSize;

/// Errors raised while sizing, encoding, or decoding Compost values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The type cannot be encoded in this position.
    #[error("type {name} is not supported here")]
    UnsupportedType { name: &'static str },

    /// A packed field value does not survive truncation to its declared width.
    #[error("value {value} does not fit into {width} bits (allowed range [{min}, {max}])")]
    PackedOverflow {
        value: i128,
        width: u32,
        min: i128,
        max: i128,
    },

    /// Packed widths must be between 1 and 64 bits.
    #[error("packed width {width} is outside 1..=64")]
    InvalidPackedWidth { width: u32 },

    /// Static size was queried on a type containing strings or lists.
    #[error("static size queried on dynamic type {name}")]
    DynamicSize { name: &'static str },

    /// The message body exceeds the 255-word limit.
    #[error("message body of {size} exceeds the limit of {limit}")]
    MessageTooLarge { size: BitSize, limit: BitSize },

    /// The buffer ended before the value did.
    #[error("buffer overrun (needed {needed} bytes, {available} available)")]
    BufferOverrun { needed: usize, available: usize },

    /// Only characters up to U+00FF fit the one-byte encoding.
    #[error("character {0:?} cannot be encoded in one byte")]
    InvalidChar(char),

    /// A decoded integer matches none of the enum's variants.
    #[error("{value} is not a valid {name} value")]
    InvalidEnumValue { name: &'static str, value: i64 },

    /// A list or string does not fit its 2-byte length prefix.
    #[error("list of {length} bytes exceeds the 2-byte length prefix")]
    ListTooLong { length: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
