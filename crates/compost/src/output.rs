use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use compost_frame::{Frame, ERROR_RESPONSE, UNSUPPORTED_RESPONSE};
use serde::Serialize;

use crate::exit::{CliError, CliResult, USAGE};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// How a printed frame arrived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Response,
    Notification,
    Unexpected,
}

impl FrameKind {
    fn as_str(self) -> &'static str {
        match self {
            FrameKind::Response => "response",
            FrameKind::Notification => "notification",
            FrameKind::Unexpected => "unexpected",
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    kind: FrameKind,
    txn: u8,
    rpc_id: String,
    rpc_kind: &'a str,
    resp: bool,
    payload_words: u8,
    payload: String,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, kind: FrameKind, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                kind,
                txn: frame.txn(),
                rpc_id: format!("{:#05x}", frame.rpc_id()),
                rpc_kind: rpc_kind(frame.rpc_id()),
                resp: frame.resp(),
                payload_words: frame.header().len(),
                payload: encode_hex(frame.payload()),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "TXN", "RPC", "RESP", "WORDS", "PAYLOAD"])
                .add_row(vec![
                    kind.as_str().to_string(),
                    frame.txn().to_string(),
                    format!("{:#05x} ({})", frame.rpc_id(), rpc_kind(frame.rpc_id())),
                    frame.resp().to_string(),
                    frame.header().len().to_string(),
                    encode_hex(frame.payload()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} txn={} rpc={:#05x} ({}) resp={} words={} payload={}",
                kind.as_str(),
                frame.txn(),
                frame.rpc_id(),
                rpc_kind(frame.rpc_id()),
                frame.resp(),
                frame.header().len(),
                encode_hex(frame.payload())
            );
        }
        OutputFormat::Raw => print_raw(frame.as_bytes()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn rpc_kind(rpc_id: u16) -> &'static str {
    match rpc_id {
        ERROR_RESPONSE => "ERROR",
        UNSUPPORTED_RESPONSE => "UNSUPPORTED",
        _ => "RPC",
    }
}

pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Parse hex such as `"01 02 ff"` or `"0102ff"`; whitespace is ignored.
pub fn decode_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex payload must have an even number of digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex payload: {input}")))
        })
        .collect()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        assert_eq!(encode_hex(&[0x00, 0xab, 0x10]), "00ab10");
        assert_eq!(decode_hex("00 ab\t10").unwrap(), vec![0x00, 0xab, 0x10]);
        assert!(decode_hex("").unwrap().is_empty());
    }

    #[test]
    fn hex_rejects_bad_input() {
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }

    #[test]
    fn reserved_ids_are_named() {
        assert_eq!(rpc_kind(0xFEE), "ERROR");
        assert_eq!(rpc_kind(0xFEF), "UNSUPPORTED");
        assert_eq!(rpc_kind(0x010), "RPC");
    }
}
