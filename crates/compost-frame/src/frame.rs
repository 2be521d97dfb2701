use std::fmt;

use bytes::Bytes;
use compost_codec::{init_buffer, BitSize, Message, Shape, HEADER_SIZE};

use crate::error::{FrameError, Result};
use crate::header::Header;

/// A complete Compost frame: header plus word-aligned payload.
///
/// The wire bytes are kept contiguous, so writing a frame is a single copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: Header,
    data: Bytes,
}

impl Frame {
    /// Encode `message` into a new frame.
    ///
    /// The payload size comes from `shape` when it is fixed, otherwise from
    /// the message's instance size.
    pub fn build<M: Message>(
        txn: u8,
        rpc_id: u16,
        resp: bool,
        message: &M,
        shape: &Shape,
    ) -> Result<Self> {
        let size = shape.payload_size(message);
        let mut buf = init_buffer(size)?;
        let header = Header::new(size.words() as u8, txn, rpc_id, resp)?;
        buf[..HEADER_SIZE.bytes()].copy_from_slice(&header.encode());

        let mut cursor = HEADER_SIZE;
        message.serialize_all(&mut buf, &mut cursor)?;
        Ok(Self {
            header,
            data: Bytes::from(buf),
        })
    }

    /// Wrap an already-encoded payload, padding it to whole words.
    pub fn from_payload(txn: u8, rpc_id: u16, resp: bool, payload: &[u8]) -> Result<Self> {
        let size = BitSize::from_bytes(payload.len());
        let mut buf = init_buffer(size)?;
        let header = Header::new(size.words() as u8, txn, rpc_id, resp)?;
        buf[..HEADER_SIZE.bytes()].copy_from_slice(&header.encode());
        buf[HEADER_SIZE.bytes()..HEADER_SIZE.bytes() + payload.len()].copy_from_slice(payload);
        Ok(Self {
            header,
            data: Bytes::from(buf),
        })
    }

    /// Parse a frame from a contiguous buffer starting with the header.
    ///
    /// Bytes past the end of the frame are ignored.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let header_len = HEADER_SIZE.bytes();
        let Some(head) = buf.first_chunk::<4>() else {
            return Err(FrameError::Truncated {
                expected: header_len,
                received: buf.len(),
            });
        };
        let header = Header::decode(*head);
        let total = header_len + header.payload_len();
        if buf.len() < total {
            return Err(FrameError::Truncated {
                expected: total,
                received: buf.len(),
            });
        }
        Ok(Self {
            header,
            data: Bytes::copy_from_slice(&buf[..total]),
        })
    }

    /// Build from wire bytes whose header has already been validated.
    pub(crate) fn from_wire(header: Header, data: Bytes) -> Self {
        debug_assert_eq!(data.len(), HEADER_SIZE.bytes() + header.payload_len());
        Self { header, data }
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn txn(&self) -> u8 {
        self.header.txn()
    }

    pub fn rpc_id(&self) -> u16 {
        self.header.rpc_id()
    }

    pub fn resp(&self) -> bool {
        self.header.resp()
    }

    /// Payload bytes, including word padding.
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_SIZE.bytes()..]
    }

    /// Complete wire representation (header + payload).
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        self.data.len()
    }

    /// Decode the payload as `M`.
    pub fn decode<M: Message>(&self) -> Result<M> {
        let mut cursor = BitSize::ZERO;
        Ok(M::deserialize_all(self.payload(), &mut cursor)?)
    }

    /// Copy of this frame carrying a different transaction id.
    pub fn with_txn(&self, txn: u8) -> Self {
        let header = self.header.with_txn(txn);
        let mut data = self.data.to_vec();
        data[..HEADER_SIZE.bytes()].copy_from_slice(&header.encode());
        Self {
            header,
            data: Bytes::from(data),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)
    }
}
