#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use compost_codec::Shape;
use compost_frame::{Frame, UNSUPPORTED_RESPONSE};
use compost_session::Session;
use compost_transport::{memory, CancellationToken, MemoryTransport, Transport};
use tokio::task::JoinHandle;

pub const ADD: u16 = 0x010;
pub const RESET: u16 = 0x011;
pub const GREET: u16 = 0x012;
/// Emits a `TICK` notification, then answers.
pub const TRIGGER: u16 = 0x013;
pub const TICK: u16 = 0x020;
pub const ERROR_RPC: u16 = 0x014;
pub const WRONG_ID: u16 = 0x015;

/// Run `respond` for every frame the remote end receives, writing its replies in order.
pub fn spawn_remote<F>(remote: MemoryTransport, respond: F) -> JoinHandle<MemoryTransport>
where
    F: Fn(&Frame) -> Vec<Frame> + Send + 'static,
{
    tokio::spawn(async move {
        let cancel = CancellationToken::new();
        while let Ok(request) = remote.read_frame(&cancel).await {
            for reply in respond(&request) {
                if remote.write_frame(&reply).await.is_err() {
                    return remote;
                }
            }
        }
        remote
    })
}

/// A small arithmetic device.
pub fn device(request: &Frame) -> Vec<Frame> {
    let txn = request.txn();
    let reply = match request.rpc_id() {
        ADD => {
            let (a, b): (u32, u32) = request.decode().expect("add arguments should decode");
            Frame::build(txn, ADD, true, &(a + b,), &Shape::of::<(u32,)>())
        }
        RESET => Frame::build(txn, RESET, true, &(), &Shape::of::<()>()),
        GREET => {
            let (name,): (String,) = request.decode().expect("greet argument should decode");
            let greeting = (format!("hello {name}"),);
            Frame::build(txn, GREET, true, &greeting, &Shape::of::<(String,)>())
        }
        TRIGGER => {
            let tick = Frame::build(0, TICK, false, &(7u16,), &Shape::of::<(u16,)>())
                .expect("tick should encode");
            let done = Frame::from_payload(txn, TRIGGER, true, &[]).expect("reply should encode");
            return vec![tick, done];
        }
        ERROR_RPC => Frame::from_payload(txn, compost_frame::ERROR_RESPONSE, true, &[]),
        WRONG_ID => Frame::from_payload(txn, ADD, true, &[0; 4]),
        _ => Frame::from_payload(txn, UNSUPPORTED_RESPONSE, true, &[]),
    };
    vec![reply.expect("reply should encode")]
}

/// A session connected to [`device`].
pub fn connect_device() -> (Arc<Session<MemoryTransport>>, JoinHandle<MemoryTransport>) {
    let (local, remote) = memory::pair();
    let remote = spawn_remote(remote, device);
    (Arc::new(Session::new(local)), remote)
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
