//! Call multiplexing over one transport.
//!
//! ```text
//!   callers ──invoke──▶ [allocator] ─▶ [table: 256 slots] ─▶ write lock ─▶ transport
//!                                           ▲
//!   transport ─▶ reader task ─┬─ resp + pending txn ──┘ resolve
//!                             ├─ registered notification ─▶ dispatcher task ─▶ handlers
//!                             └─ anything else ─▶ SessionEvent::UnexpectedMessage
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use compost_codec::{Message, Shape};
use compost_frame::Frame;
use compost_transport::{Transport, TransportError};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::{ProtocolError, Result, SessionError};
use crate::notify::{NotificationHandler, NotificationRegistry};
use crate::table::{SlotError, TransactionTable, TxnAllocator};
use crate::transaction::{Outcome, Transaction};

/// Default grace period for the reader to stop on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout applied to calls that do not pass their own (None = wait forever).
    pub transaction_timeout: Option<Duration>,
    /// How long [`Session::shutdown`] waits for the reader task.
    pub shutdown_grace: Duration,
    /// Buffered diagnostic events per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            event_capacity: 64,
        }
    }
}

/// Diagnostic events published by the reader.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A frame that matched no pending call and no registered notification.
    UnexpectedMessage(Frame),
    /// A notification frame, published before its handlers run.
    NotificationObserved(Frame),
}

type Delivery = (Frame, Vec<NotificationHandler>);

struct Shared<T> {
    transport: T,
    config: SessionConfig,
    allocator: TxnAllocator,
    table: TransactionTable,
    notifications: NotificationRegistry,
    write_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    fault: OnceLock<Arc<TransportError>>,
}

/// A multiplexed connection to one remote endpoint.
///
/// Any number of tasks may call concurrently; responses are matched to calls
/// by transaction id. Must be created inside a tokio runtime.
pub struct Session<T: Transport> {
    shared: Arc<Shared<T>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let shared = Arc::new(Shared {
            transport,
            config,
            allocator: TxnAllocator::new(),
            table: TransactionTable::new(),
            notifications: NotificationRegistry::new(),
            write_lock: tokio::sync::Mutex::new(()),
            events,
            cancel: CancellationToken::new(),
            fault: OnceLock::new(),
        });

        let (deliveries, inbox) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_notifications(inbox));
        let reader = tokio::spawn(read_loop(Arc::clone(&shared), deliveries));
        debug!("session started");

        Self {
            shared,
            reader: Mutex::new(Some(reader)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// Number of calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.shared.table.len()
    }

    /// Whether the session still accepts calls.
    pub fn is_running(&self) -> bool {
        !self.shared.cancel.is_cancelled() && self.shared.fault.get().is_none()
    }

    /// Encode `args` with `shape`, send them as a request and wait for the response.
    ///
    /// `timeout` overrides the configured transaction timeout.
    pub async fn invoke<M: Message>(
        &self,
        rpc_id: u16,
        args: &M,
        shape: &Shape,
        timeout: Option<Duration>,
    ) -> Result<Frame> {
        let txn = self.shared.allocator.next_id();
        let request = Frame::build(txn, rpc_id, false, args, shape)?;
        self.transact(request, timeout).await
    }

    /// Send an already encoded payload as a request and wait for the response.
    pub async fn invoke_raw(
        &self,
        rpc_id: u16,
        payload: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Frame> {
        let txn = self.shared.allocator.next_id();
        let request = Frame::from_payload(txn, rpc_id, false, payload)?;
        self.transact(request, timeout).await
    }

    async fn transact(&self, request: Frame, timeout: Option<Duration>) -> Result<Frame> {
        if !self.is_running() {
            return Err(self.shared.stopped_error());
        }

        let (txn, response) = Transaction::new(request);
        self.shared.table.insert(Arc::clone(&txn)).map_err(|err| match err {
            SlotError::Occupied(id) => {
                SessionError::from(ProtocolError::TooManyConcurrentCalls { txn: id })
            }
            SlotError::Closed => self.shared.stopped_error(),
        })?;
        // Frees the slot on every exit path, including a dropped future.
        let _slot = SlotGuard {
            table: &self.shared.table,
            txn: &txn,
        };

        {
            let _write = self.shared.write_lock.lock().await;
            self.shared.transport.write_frame(txn.request()).await?;
        }
        debug!(frame = %txn.request(), "request sent");

        let outcome = match timeout.or(self.shared.config.transaction_timeout) {
            Some(limit) => match tokio::time::timeout(limit, response).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    debug!(txn = txn.txn(), ?limit, "call timed out");
                    return Err(SessionError::Timeout(limit));
                }
            },
            None => response.await,
        };
        match outcome {
            Ok(Outcome::Response(frame)) => Ok(frame),
            Ok(Outcome::Cancelled) | Err(_) => Err(self.shared.cancelled_error()),
        }
    }

    /// Route notifications with `rpc_id` to `handler`.
    ///
    /// Returns `false` if this exact handler was already registered.
    pub fn register_notification(&self, rpc_id: u16, handler: &NotificationHandler) -> bool {
        self.shared.notifications.add(rpc_id, handler)
    }

    /// Returns whether `handler` was registered for `rpc_id`.
    pub fn unregister_notification(&self, rpc_id: u16, handler: &NotificationHandler) -> bool {
        self.shared.notifications.remove(rpc_id, handler)
    }

    /// Receive diagnostic events from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Stop the reader and cancel every pending call.
    ///
    /// Returns [`SessionError::ReaderStuck`] if the reader ignored cancellation
    /// for the configured grace period; pending calls are cancelled regardless.
    pub async fn shutdown(&self) -> Result<()> {
        self.shared.cancel.cancel();
        let reader = self.reader.lock().take();
        let mut result = Ok(());
        if let Some(mut reader) = reader {
            let grace = self.shared.config.shutdown_grace;
            if tokio::time::timeout(grace, &mut reader).await.is_err() {
                error!(?grace, "session reader ignored cancellation");
                reader.abort();
                result = Err(SessionError::ReaderStuck(grace));
            }
        }
        let cancelled = self.shared.cancel_pending();
        debug!(cancelled, "session shut down");
        result
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        self.shared.cancel_pending();
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("running", &self.is_running())
            .field("pending", &self.pending_calls())
            .field("notifications", &self.shared.notifications)
            .finish()
    }
}

impl<T> Shared<T> {
    fn stopped_error(&self) -> SessionError {
        match self.fault.get() {
            Some(fault) => SessionError::ReaderFailed(Arc::clone(fault)),
            None => SessionError::Closed,
        }
    }

    fn cancelled_error(&self) -> SessionError {
        match self.fault.get() {
            Some(fault) => SessionError::ReaderFailed(Arc::clone(fault)),
            None => SessionError::Cancelled,
        }
    }

    fn cancel_pending(&self) -> usize {
        let pending = self.table.close();
        let count = pending.len();
        for txn in pending {
            txn.cancel();
        }
        count
    }

    fn dispatch(&self, frame: Frame, deliveries: &mpsc::UnboundedSender<Delivery>) {
        if !frame.resp() {
            if let Some(handlers) = self.notifications.handlers(frame.rpc_id()) {
                trace!(%frame, handlers = handlers.len(), "notification received");
                let _ = self.events.send(SessionEvent::NotificationObserved(frame.clone()));
                let _ = deliveries.send((frame, handlers));
                return;
            }
        } else if let Some(txn) = self.table.remove(frame.txn()) {
            debug!(%frame, "response received");
            txn.resolve(frame);
            return;
        }
        warn!(%frame, "unexpected frame");
        let _ = self.events.send(SessionEvent::UnexpectedMessage(frame));
    }
}

struct SlotGuard<'a> {
    table: &'a TransactionTable,
    txn: &'a Arc<Transaction>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.table.remove_exact(self.txn);
    }
}

async fn read_loop<T: Transport>(
    shared: Arc<Shared<T>>,
    deliveries: mpsc::UnboundedSender<Delivery>,
) {
    loop {
        match shared.transport.read_frame(&shared.cancel).await {
            Ok(frame) => shared.dispatch(frame, &deliveries),
            Err(TransportError::Cancelled) => {
                debug!("session reader stopped");
                return;
            }
            // Transports only report retryable errors when they can keep reading.
            Err(err) if err.is_retryable() => {
                trace!(error = %err, "retrying read");
            }
            Err(err) => {
                if shared.cancel.is_cancelled() {
                    debug!(error = %err, "session reader stopped");
                    return;
                }
                error!(error = %err, "session reader failed");
                let _ = shared.fault.set(Arc::new(err));
                shared.cancel_pending();
                return;
            }
        }
    }
}

async fn dispatch_notifications(mut inbox: mpsc::UnboundedReceiver<Delivery>) {
    while let Some((frame, handlers)) = inbox.recv().await {
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&frame))).is_err() {
                error!(%frame, "notification handler panicked");
            }
        }
    }
}
