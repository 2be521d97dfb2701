use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use compost_session::{Proxy, ProxyConfig, Session};
use tokio_util::sync::CancellationToken;

use crate::cmd::{parse_duration, ProxyArgs};
use crate::exit::{session_error, transport_error, CliError, CliResult, SUCCESS, USAGE};

pub async fn run(args: ProxyArgs) -> CliResult<i32> {
    let ip: IpAddr = args
        .bind
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid bind address: {}", args.bind)))?;
    let call_timeout = args.timeout.as_deref().map(parse_duration).transpose()?;

    let target = args.target.target()?;
    let connection = target
        .open()
        .await
        .map_err(|err| transport_error("connect failed", err))?;
    let session = Arc::new(Session::new(connection));

    let proxy = Proxy::bind(ProxyConfig {
        bind: SocketAddr::new(ip, args.port),
        call_timeout,
    })
    .await
    .map_err(|err| session_error("bind failed", err))?;
    tracing::info!(endpoint = %target, "proxy forwarding");

    let shutdown = CancellationToken::new();
    let stop = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "signal handler setup failed");
            return;
        }
        tracing::info!("interrupt received, stopping proxy");
        stop.cancel();
    });

    let result = proxy.run(Arc::clone(&session), shutdown).await;
    if let Err(err) = session.shutdown().await {
        tracing::warn!(error = %err, "session shutdown incomplete");
    }
    result.map_err(|err| session_error("proxy failed", err))?;
    Ok(SUCCESS)
}
