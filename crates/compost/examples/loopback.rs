//! Typed calls and notifications against a simulated device.
//!
//! The device runs on the far end of an in-memory transport pair and answers
//! two calls; switching it to `Sampling` makes it push a `sample` notification.
//!
//! Run: `cargo run -p compost --example loopback`

use std::sync::Arc;
use std::time::Duration;

use compost::transport::{memory, CancellationToken, MemoryTransport};
use compost::{compost_enum, compost_struct, Frame, Protocol, ProtocolTable, Session, Shape, Transport};
use tokio::sync::mpsc;

const READ_CHANNEL: u16 = 0x010;
const SET_MODE: u16 = 0x011;
const SAMPLE: u16 = 0x020;

compost_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Mode: u8 {
        Idle = 0,
        Sampling = 1,
    }
}

compost_struct! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Reading {
        #[bits(4)]
        pub channel: u8,
        #[bits(12)]
        pub raw: i16,
        pub label: String,
    }
}

fn reading(channel: u8) -> Reading {
    Reading {
        channel,
        raw: -40 + i16::from(channel) * 3,
        label: format!("adc{channel}"),
    }
}

fn answer(request: &Frame) -> Result<Vec<Frame>, Box<dyn std::error::Error>> {
    let txn = request.txn();
    match request.rpc_id() {
        READ_CHANNEL => {
            let (channel,): (u8,) = request.decode()?;
            let reply = (reading(channel),);
            Ok(vec![Frame::build(txn, READ_CHANNEL, true, &reply, &Shape::of::<(Reading,)>())?])
        }
        SET_MODE => {
            let (mode,): (Mode,) = request.decode()?;
            let mut frames = Vec::new();
            if mode == Mode::Sampling {
                let sample = (reading(2),);
                frames.push(Frame::build(0, SAMPLE, false, &sample, &Shape::of::<(Reading,)>())?);
            }
            frames.push(Frame::build(txn, SET_MODE, true, &(), &Shape::of::<()>())?);
            Ok(frames)
        }
        _ => Ok(vec![Frame::from_payload(txn, compost::frame::UNSUPPORTED_RESPONSE, true, &[])?]),
    }
}

async fn run_device(device: MemoryTransport) {
    let cancel = CancellationToken::new();
    while let Ok(request) = device.read_frame(&cancel).await {
        let replies = match answer(&request) {
            Ok(replies) => replies,
            Err(err) => {
                eprintln!("device: {err}");
                continue;
            }
        };
        for reply in &replies {
            if device.write_frame(reply).await.is_err() {
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host, device) = memory::pair();
    tokio::spawn(run_device(device));

    let table = ProtocolTable::builder()
        .rpc::<(u8,), Reading>("read_channel", READ_CHANNEL)
        .rpc::<(Mode,), ()>("set_mode", SET_MODE)
        .notification::<(Reading,)>("sample", SAMPLE)
        .build()?;
    let session = Arc::new(Session::new(host));
    let protocol = Protocol::new(Arc::clone(&session), table).with_timeout(Duration::from_secs(2));

    let (samples_tx, mut samples) = mpsc::unbounded_channel();
    let subscription = protocol.subscribe("sample", move |(sample,): (Reading,)| {
        let _ = samples_tx.send(sample);
    })?;

    let first: Reading = protocol.call("read_channel", &(5u8,)).await?;
    println!("read_channel(5) -> {first:?}");

    protocol.call::<(Mode,), ()>("set_mode", &(Mode::Sampling,)).await?;
    if let Some(sample) = samples.recv().await {
        println!("sample notification -> {sample:?}");
    }

    protocol.unsubscribe(&subscription);
    session.shutdown().await?;
    Ok(())
}
