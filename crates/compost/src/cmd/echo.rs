use std::io::{Read, Write};
use std::net::TcpListener;

use compost_frame::{Frame, FrameError, FrameReader, FrameWriter, UNSUPPORTED_RESPONSE};

use crate::cmd::EchoArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};

/// Answers requests the way a trivial remote endpoint would.
#[derive(Debug, Clone, Default)]
struct EchoPolicy {
    reject: Vec<u16>,
    notify: Option<u16>,
}

impl EchoPolicy {
    /// Frames to send back for one incoming frame, in order.
    fn replies(&self, frame: &Frame) -> Result<Vec<Frame>, FrameError> {
        if frame.resp() {
            tracing::debug!(txn = frame.txn(), rpc_id = frame.rpc_id(), "ignoring response frame");
            return Ok(Vec::new());
        }

        if self.reject.contains(&frame.rpc_id()) {
            tracing::info!(rpc_id = frame.rpc_id(), "rejecting request");
            return Ok(vec![Frame::from_payload(
                frame.txn(),
                UNSUPPORTED_RESPONSE,
                true,
                &[],
            )?]);
        }

        let mut replies = Vec::with_capacity(2);
        if let Some(notify) = self.notify {
            replies.push(Frame::from_payload(0, notify, false, frame.payload())?);
        }
        replies.push(Frame::from_payload(
            frame.txn(),
            frame.rpc_id(),
            true,
            frame.payload(),
        )?);
        Ok(replies)
    }
}

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let policy = EchoPolicy {
        reject: args.reject,
        notify: args.notify,
    };

    let Some(addr) = args.listen else {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        serve(stdin.lock(), stdout.lock(), &policy)?;
        return Ok(SUCCESS);
    };

    let listener = TcpListener::bind(&addr).map_err(|err| io_error("bind failed", err))?;
    tracing::info!(addr = %addr, "echo listening");

    for stream in listener.incoming() {
        let stream = stream.map_err(|err| io_error("accept failed", err))?;
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let writer = stream
            .try_clone()
            .map_err(|err| io_error("socket clone failed", err))?;
        tracing::info!(peer = %peer, "client connected");

        if let Err(err) = serve(stream, writer, &policy) {
            tracing::warn!(peer = %peer, error = %err, "client dropped");
        } else {
            tracing::info!(peer = %peer, "client disconnected");
        }
    }

    Ok(SUCCESS)
}

/// Echo frames until the reader closes cleanly.
fn serve<R: Read, W: Write>(reader: R, writer: W, policy: &EchoPolicy) -> CliResult<()> {
    let mut reader = FrameReader::new(reader);
    let mut writer = FrameWriter::new(writer);

    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => return Ok(()),
            Err(err) => return Err(frame_error("receive failed", err)),
        };
        tracing::debug!(frame = %frame, "echoing frame");

        let replies = policy
            .replies(&frame)
            .map_err(|err| frame_error("reply failed", err))?;
        for reply in &replies {
            writer
                .write_frame(reply)
                .map_err(|err| frame_error("send failed", err))?;
        }
    }
}
