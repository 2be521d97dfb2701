use bytes::{BufMut, BytesMut};
use compost_codec::HEADER_SIZE;

use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::header::Header;

/// Append a frame's wire bytes to `dst`.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(frame.wire_size());
    dst.put_slice(frame.as_bytes());
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    let Some(head) = src.first_chunk::<4>() else {
        return Ok(None);
    };
    let header = Header::decode(*head);
    let total = HEADER_SIZE.bytes() + header.payload_len();
    if src.len() < total {
        return Ok(None);
    }
    let data = src.split_to(total).freeze();
    Ok(Some(Frame::from_wire(header, data)))
}

/// Bytes the frame at the front of `src` needs in total.
pub(crate) fn expected_len(src: &[u8]) -> usize {
    match src.first_chunk::<4>() {
        Some(head) => HEADER_SIZE.bytes() + Header::decode(*head).payload_len(),
        None => HEADER_SIZE.bytes(),
    }
}

/// Leftover bytes at end of stream are a truncated frame.
pub(crate) fn decode_eof_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    if let Some(frame) = decode_frame(src)? {
        return Ok(Some(frame));
    }
    if src.is_empty() {
        return Ok(None);
    }
    Err(FrameError::Truncated {
        expected: expected_len(src),
        received: src.len(),
    })
}

/// `tokio_util` codec for Compost frames.
#[cfg(feature = "async")]
#[derive(Debug, Clone, Copy, Default)]
pub struct CompostCodec;

#[cfg(feature = "async")]
impl tokio_util::codec::Decoder for CompostCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let frame = decode_frame(src)?;
        if frame.is_none() {
            src.reserve(expected_len(src).saturating_sub(src.len()));
        }
        Ok(frame)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_eof_frame(src)
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Encoder<Frame> for CompostCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        encode_frame(&frame, dst);
        Ok(())
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Encoder<&Frame> for CompostCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<()> {
        encode_frame(frame, dst);
        Ok(())
    }
}
