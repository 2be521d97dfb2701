use std::fmt;

use crate::error::{FrameError, Result};

/// Rpc id the remote uses to report a failed call.
pub const ERROR_RESPONSE: u16 = 0xFEE;

/// Rpc id the remote uses to reject an unknown call.
pub const UNSUPPORTED_RESPONSE: u16 = 0xFEF;

/// Largest rpc id that fits the 12-bit header field.
pub const MAX_RPC_ID: u16 = 0xFFF;

const RESP_BIT: u8 = 0x10;

/// The 4-byte frame header.
///
/// ```text
/// ┌──────────┬──────────┬──────────────────────┬──────────────┐
/// │ len (1B) │ txn (1B) │ 000R iiii            │ iiii iiii    │
/// │ words    │          │ R = resp, i = rpc id │ rpc id low 8 │
/// └──────────┴──────────┴──────────────────────┴──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    len: u8,
    txn: u8,
    rpc_id: u16,
    resp: bool,
}

impl Header {
    /// Create a header; fails when `rpc_id` does not fit 12 bits.
    pub fn new(len: u8, txn: u8, rpc_id: u16, resp: bool) -> Result<Self> {
        if rpc_id > MAX_RPC_ID {
            return Err(FrameError::InvalidRpcId { rpc_id });
        }
        Ok(Self {
            len,
            txn,
            rpc_id,
            resp,
        })
    }

    pub fn encode(&self) -> [u8; 4] {
        let high = ((self.rpc_id >> 8) & 0x0F) as u8;
        let resp = if self.resp { RESP_BIT } else { 0 };
        [self.len, self.txn, high | resp, (self.rpc_id & 0xFF) as u8]
    }

    pub fn decode(bytes: [u8; 4]) -> Self {
        Self {
            len: bytes[0],
            txn: bytes[1],
            rpc_id: (u16::from(bytes[2] & 0x0F) << 8) | u16::from(bytes[3]),
            resp: bytes[2] & RESP_BIT != 0,
        }
    }

    /// Payload length in words.
    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload length in bytes.
    pub fn payload_len(&self) -> usize {
        usize::from(self.len) * 4
    }

    pub fn txn(&self) -> u8 {
        self.txn
    }

    pub fn rpc_id(&self) -> u16 {
        self.rpc_id
    }

    pub fn resp(&self) -> bool {
        self.resp
    }

    pub fn with_txn(self, txn: u8) -> Self {
        Self { txn, ..self }
    }

    pub fn is_error_response(&self) -> bool {
        self.rpc_id == ERROR_RESPONSE
    }

    pub fn is_unsupported_response(&self) -> bool {
        self.rpc_id == UNSUPPORTED_RESPONSE
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rpc={:#05x} txn={} resp={} len={}w",
            self.rpc_id, self.txn, self.resp, self.len
        )
    }
}
