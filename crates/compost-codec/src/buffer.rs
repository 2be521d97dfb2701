use crate::bits::BitSize;
use crate::error::{CodecError, Result};

/// Size of the frame header.
pub const HEADER_SIZE: BitSize = BitSize::from_bytes(4);

/// Size of the length prefix in front of lists and strings.
pub const LIST_LENGTH_SIZE: BitSize = BitSize::from_bytes(2);

/// Largest payload a frame can carry (255 words).
pub const MESSAGE_BODY_LIMIT: BitSize = BitSize::from_words(255);

/// Allocate a zeroed frame buffer for a body of `body_size`.
///
/// The buffer holds the header plus the body rounded up to whole words.
pub fn init_buffer(body_size: BitSize) -> Result<Vec<u8>> {
    if body_size > MESSAGE_BODY_LIMIT {
        return Err(CodecError::MessageTooLarge {
            size: body_size,
            limit: MESSAGE_BODY_LIMIT,
        });
    }
    Ok(vec![0; HEADER_SIZE.bytes() + body_size.words() * 4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_covers_header_and_words() {
        for words in [0usize, 1, 17, 255] {
            let buf = init_buffer(BitSize::from_words(words)).unwrap();
            assert_eq!(buf.len(), (words + 1) * 4);
            assert!(buf.iter().all(|b| *b == 0));
        }
    }

    #[test]
    fn test_partial_word_rounds_up() {
        let buf = init_buffer(BitSize::from_bits(33)).unwrap();
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn test_body_over_limit_is_rejected() {
        let err = init_buffer(BitSize::from_words(256)).unwrap_err();
        assert!(matches!(err, CodecError::MessageTooLarge { .. }));

        let err = init_buffer(MESSAGE_BODY_LIMIT + BitSize::from_bits(1)).unwrap_err();
        assert!(matches!(err, CodecError::MessageTooLarge { .. }));
    }
}
