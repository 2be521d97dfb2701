use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use compost_frame::{Frame, ERROR_RESPONSE};
use compost_transport::{tcp, TcpTransport, Transport, TransportError};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::session::{Session, SessionEvent};

/// Default proxy port.
pub const DEFAULT_PROXY_PORT: u16 = 50051;

/// Notifications queued per client before further ones are dropped.
const RELAY_QUEUE: usize = 64;

/// Proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Timeout for each forwarded call (None = session default).
    pub call_timeout: Option<Duration>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PROXY_PORT)),
            call_timeout: None,
        }
    }
}

/// Bridges one TCP client at a time onto a session.
///
/// Requests from the client are forwarded with
/// [`Session::invoke_raw`] and answered with the client's own transaction
/// id; a call that fails without breaking the session is answered with
/// `ERROR_RESPONSE`. Notifications seen by the session are queued to the
/// client and dropped if it stops reading. A newly accepted client replaces
/// the current one.
pub struct Proxy {
    listener: TcpListener,
    config: ProxyConfig,
}

struct Client {
    outbox: mpsc::Sender<Frame>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    peer: SocketAddr,
}

impl Client {
    async fn close(self) {
        self.cancel.cancel();
        let _ = self.task.await;
        info!(peer = %self.peer, "proxy client closed");
    }

    fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Proxy {
    pub async fn bind(config: ProxyConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind)
            .await
            .map_err(|source| TransportError::Connect {
                addr: config.bind.to_string(),
                source,
            })?;
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr().map_err(TransportError::Io)?)
    }

    /// Serve clients until `shutdown` fires.
    pub async fn run<T: Transport>(
        self,
        session: Arc<Session<T>>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut events = session.subscribe_events();
        let mut client: Option<Client> = None;
        info!(addr = %self.local_addr()?, "proxy listening");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => {
                    let (socket, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(error = %err, "proxy accept failed");
                            continue;
                        }
                    };
                    if let Some(previous) = client.take() {
                        previous.close().await;
                    }
                    let transport = match tcp::from_stream(socket, peer.to_string()) {
                        Ok(transport) => transport,
                        Err(err) => {
                            warn!(%peer, error = %err, "proxy client setup failed");
                            continue;
                        }
                    };
                    info!(%peer, "proxy client connected");
                    let cancel = shutdown.child_token();
                    let (outbox, inbox) = mpsc::channel(RELAY_QUEUE);
                    let task = tokio::spawn(serve_client(
                        transport,
                        Arc::clone(&session),
                        inbox,
                        cancel.clone(),
                        self.config.call_timeout,
                    ));
                    client = Some(Client { outbox, cancel, task, peer });
                }
                event = events.recv() => match event {
                    Ok(SessionEvent::NotificationObserved(frame)) => relay(client.as_ref(), frame),
                    Ok(SessionEvent::UnexpectedMessage(frame)) if is_notification(&frame) => {
                        relay(client.as_ref(), frame)
                    }
                    Ok(SessionEvent::UnexpectedMessage(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "proxy fell behind session events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        if let Some(client) = client.take() {
            client.close().await;
        }
        info!("proxy stopped");
        Ok(())
    }
}

/// Notifications travel with transaction id 0.
fn is_notification(frame: &Frame) -> bool {
    frame.txn() == 0 && !frame.resp()
}

fn relay(client: Option<&Client>, frame: Frame) {
    let Some(client) = client.filter(|c| c.is_active()) else {
        return;
    };
    if enqueue(&client.outbox, frame) {
        debug!(peer = %client.peer, "notification queued");
    }
}

/// Queue `frame` without waiting; a full queue drops it.
fn enqueue(outbox: &mpsc::Sender<Frame>, frame: Frame) -> bool {
    match outbox.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(frame)) => {
            warn!(%frame, "proxy client is not reading, notification dropped");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

async fn serve_client<T: Transport>(
    transport: TcpTransport,
    session: Arc<Session<T>>,
    inbox: mpsc::Receiver<Frame>,
    cancel: CancellationToken,
    timeout: Option<Duration>,
) {
    tokio::join!(
        async {
            forward_requests(&transport, &session, &cancel, timeout).await;
            // Either half ending ends the client.
            cancel.cancel();
        },
        async {
            write_relays(&transport, inbox, &cancel).await;
            cancel.cancel();
        },
    );
}

async fn write_relays(
    transport: &TcpTransport,
    mut inbox: mpsc::Receiver<Frame>,
    cancel: &CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = inbox.recv() => match frame {
                Some(frame) => frame,
                None => return,
            },
        };
        let written = tokio::select! {
            _ = cancel.cancelled() => return,
            written = transport.write_frame(&frame) => written,
        };
        match written {
            Ok(()) => debug!(peer = transport.label(), %frame, "notification relayed"),
            Err(err) => {
                debug!(peer = transport.label(), error = %err, "notification relay failed");
                return;
            }
        }
    }
}

async fn forward_requests<T: Transport>(
    transport: &TcpTransport,
    session: &Session<T>,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) {
    loop {
        let request = match transport.read_frame(cancel).await {
            Ok(frame) => frame,
            Err(TransportError::Cancelled) => return,
            Err(TransportError::Closed) => {
                info!(peer = transport.label(), "proxy client disconnected");
                return;
            }
            Err(err) if err.is_retryable() => continue,
            Err(err) => {
                warn!(peer = transport.label(), error = %err, "proxy client read failed");
                return;
            }
        };

        let forwarded = tokio::select! {
            _ = cancel.cancelled() => return,
            result = session.invoke_raw(request.rpc_id(), request.payload(), timeout) => result,
        };
        let reply = match forwarded {
            Ok(response) => response.with_txn(request.txn()),
            Err(err) if err.is_transport_fault() || !session.is_running() => {
                warn!(%request, error = %err, "session unavailable, dropping proxy client");
                return;
            }
            Err(err) => {
                warn!(%request, error = %err, "forwarded call failed");
                match Frame::from_payload(request.txn(), ERROR_RESPONSE, true, &[]) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(error = %err, "error response could not be built");
                        return;
                    }
                }
            }
        };

        if let Err(err) = transport.write_frame(&reply).await {
            warn!(peer = transport.label(), error = %err, "proxy client write failed");
            return;
        }
        debug!(peer = transport.label(), %reply, "response returned to client");
    }
}
