use std::time::Duration;

use compost_frame::Frame;
use compost_session::{Session, SessionEvent};
use tokio::sync::broadcast::error::RecvError;

use crate::cmd::ListenArgs;
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_frame, FrameKind, OutputFormat};

const LIVENESS_CHECK: Duration = Duration::from_millis(250);

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let target = args.target.target()?;
    let connection = target
        .open()
        .await
        .map_err(|err| transport_error("connect failed", err))?;

    let session = Session::new(connection);
    let mut events = session.subscribe_events();
    tracing::info!(endpoint = %target, "listening");

    let mut liveness = tokio::time::interval(LIVENESS_CHECK);
    let mut printed = 0usize;
    let outcome = loop {
        if args.count.is_some_and(|count| printed >= count) {
            break Ok(SUCCESS);
        }

        let event = tokio::select! {
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => break Ok(SUCCESS),
                Err(err) => break Err(CliError::new(
                    INTERNAL,
                    format!("signal handler setup failed: {err}"),
                )),
            },
            event = events.recv() => event,
            _ = liveness.tick() => {
                if !session.is_running() {
                    break Err(CliError::new(TRANSPORT_ERROR, "connection lost"));
                }
                continue;
            }
        };

        match event {
            Ok(SessionEvent::NotificationObserved(frame)) => {
                print_frame(&frame, FrameKind::Notification, format);
            }
            Ok(SessionEvent::UnexpectedMessage(frame)) => {
                print_frame(&frame, classify(&frame), format);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "listener fell behind; frames dropped");
                continue;
            }
            Err(RecvError::Closed) => {
                break Err(CliError::new(TRANSPORT_ERROR, "session closed"));
            }
        }
        printed = printed.saturating_add(1);
    };

    if let Err(err) = session.shutdown().await {
        tracing::warn!(error = %err, "session shutdown incomplete");
    }
    outcome
}

/// Unregistered frames with txn 0 and no response flag are notifications.
fn classify(frame: &Frame) -> FrameKind {
    if frame.txn() == 0 && !frame.resp() {
        FrameKind::Notification
    } else {
        FrameKind::Unexpected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txn_zero_requests_are_notifications() {
        let note = Frame::from_payload(0, 0x020, false, &[1, 2]).unwrap();
        assert_eq!(classify(&note), FrameKind::Notification);

        let stray = Frame::from_payload(9, 0x010, true, &[]).unwrap();
        assert_eq!(classify(&stray), FrameKind::Unexpected);
    }
}
