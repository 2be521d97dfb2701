use compost_session::Session;

use crate::cmd::{parse_duration, CallArgs};
use crate::exit::{session_error, transport_error, CliResult, FAILURE, SUCCESS};
use crate::output::{decode_hex, print_frame, FrameKind, OutputFormat};

pub async fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = decode_hex(&args.payload)?;
    let target = args.target.target()?;

    let connection = target
        .open()
        .await
        .map_err(|err| transport_error("connect failed", err))?;
    tracing::debug!(endpoint = %target, "connected");

    let session = Session::new(connection);
    let result = session.invoke_raw(args.rpc_id, &payload, Some(timeout)).await;
    if let Err(err) = session.shutdown().await {
        tracing::warn!(error = %err, "session shutdown incomplete");
    }
    let response = result.map_err(|err| session_error("call failed", err))?;

    print_frame(&response, FrameKind::Response, format);

    let header = response.header();
    if header.is_error_response() || header.is_unsupported_response() {
        return Ok(FAILURE);
    }
    Ok(SUCCESS)
}
