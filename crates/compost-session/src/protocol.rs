//! Typed calls and notifications bound by name.
//!
//! A [`ProtocolTable`] lists every rpc and notification a remote endpoint
//! implements, with its id and Rust signature:
//!
//! ```ignore
//! let table = ProtocolTable::builder()
//!     .rpc::<(u32, u32), u32>("add", 0x010)
//!     .rpc::<(), ()>("reset", 0x011)
//!     .notification::<(u16,)>("tick", 0x020)
//!     .build()?;
//! let device = Protocol::new(Arc::new(Session::new(transport)), table);
//! let sum: u32 = device.call("add", &(5u32, 2u32)).await?;
//! ```

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use compost_codec::{BitSize, Compost, Message, Shape};
use compost_frame::{Frame, ERROR_RESPONSE, MAX_RPC_ID, UNSUPPORTED_RESPONSE};
use compost_transport::Transport;
use tracing::{debug, warn};

use crate::error::{ProtocolError, Result};
use crate::notify::NotificationHandler;
use crate::session::Session;

/// Registration of one rpc.
#[derive(Debug, Clone)]
pub struct RpcEntry {
    rpc_id: u16,
    request: Arc<Shape>,
    response: String,
    request_type: TypeId,
    response_type: TypeId,
}

impl RpcEntry {
    pub fn rpc_id(&self) -> u16 {
        self.rpc_id
    }

    pub fn request_shape(&self) -> &Shape {
        &self.request
    }

    /// Rendered response type, e.g. `u32` or `()`.
    pub fn response_type(&self) -> &str {
        &self.response
    }

    fn signature(&self) -> String {
        format!("{} -> {}", self.request, self.response)
    }
}

/// Registration of one notification.
#[derive(Debug, Clone)]
pub struct NotificationEntry {
    rpc_id: u16,
    shape: Arc<Shape>,
    args_type: TypeId,
}

impl NotificationEntry {
    pub fn rpc_id(&self) -> u16 {
        self.rpc_id
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// Name-indexed rpc and notification registrations for one remote endpoint.
#[derive(Debug, Clone, Default)]
pub struct ProtocolTable {
    rpcs: HashMap<String, RpcEntry>,
    notifications: HashMap<String, NotificationEntry>,
}

impl ProtocolTable {
    pub fn builder() -> ProtocolTableBuilder {
        ProtocolTableBuilder::default()
    }

    pub fn rpc(&self, name: &str) -> Option<&RpcEntry> {
        self.rpcs.get(name)
    }

    pub fn notification(&self, name: &str) -> Option<&NotificationEntry> {
        self.notifications.get(name)
    }

    /// Registered rpc names, sorted.
    pub fn rpc_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rpcs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered notification names, sorted.
    pub fn notification_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.notifications.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Collects registrations; problems are reported once by [`build`](Self::build).
#[derive(Debug, Default)]
pub struct ProtocolTableBuilder {
    table: ProtocolTable,
    ids: HashMap<u16, String>,
    errors: Vec<ProtocolError>,
}

impl ProtocolTableBuilder {
    /// Register rpc `name` taking `Req` and answering with one `Resp` value.
    ///
    /// Use `()` for calls without arguments or without a result.
    pub fn rpc<Req: Message, Resp: Compost>(mut self, name: &str, rpc_id: u16) -> Self {
        if self.claim(name, rpc_id) {
            let entry = RpcEntry {
                rpc_id,
                request: Shape::of::<Req>(),
                response: Resp::describe().to_string(),
                request_type: TypeId::of::<Req>(),
                response_type: TypeId::of::<Resp>(),
            };
            self.table.rpcs.insert(name.to_string(), entry);
        }
        self
    }

    /// Register notification `name` whose payload decodes as `N`.
    pub fn notification<N: Message>(mut self, name: &str, rpc_id: u16) -> Self {
        if self.claim(name, rpc_id) {
            let entry = NotificationEntry {
                rpc_id,
                shape: Shape::of::<N>(),
                args_type: TypeId::of::<N>(),
            };
            self.table.notifications.insert(name.to_string(), entry);
        }
        self
    }

    pub fn build(mut self) -> std::result::Result<ProtocolTable, ProtocolError> {
        if self.errors.is_empty() {
            Ok(self.table)
        } else {
            Err(self.errors.remove(0))
        }
    }

    fn claim(&mut self, name: &str, rpc_id: u16) -> bool {
        let reason = if rpc_id > MAX_RPC_ID {
            Some(format!("rpc id {rpc_id:#x} exceeds {MAX_RPC_ID:#x}"))
        } else if rpc_id == ERROR_RESPONSE || rpc_id == UNSUPPORTED_RESPONSE {
            Some(format!("rpc id {rpc_id:#05x} is reserved"))
        } else if self.table.rpcs.contains_key(name) || self.table.notifications.contains_key(name) {
            Some("name already registered".to_string())
        } else {
            self.ids
                .get(&rpc_id)
                .map(|other| format!("rpc id {rpc_id:#05x} already used by '{other}'"))
        };
        match reason {
            Some(reason) => {
                self.errors.push(ProtocolError::InvalidRegistration {
                    name: name.to_string(),
                    reason,
                });
                false
            }
            None => {
                self.ids.insert(rpc_id, name.to_string());
                true
            }
        }
    }
}

/// Handle for a notification subscription; pass it to [`Protocol::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    rpc_id: u16,
    handler: NotificationHandler,
}

impl Subscription {
    pub fn rpc_id(&self) -> u16 {
        self.rpc_id
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("rpc_id", &self.rpc_id)
            .finish_non_exhaustive()
    }
}

/// Typed front end over a [`Session`].
pub struct Protocol<T: Transport> {
    session: Arc<Session<T>>,
    table: Arc<ProtocolTable>,
    timeout: Option<Duration>,
}

impl<T: Transport> Protocol<T> {
    pub fn new(session: Arc<Session<T>>, table: ProtocolTable) -> Self {
        Self {
            session,
            table: Arc::new(table),
            timeout: None,
        }
    }

    /// Timeout for calls made through this protocol, overriding the session default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    pub fn table(&self) -> &ProtocolTable {
        &self.table
    }

    /// Call rpc `name` and decode its result.
    pub async fn call<A: Message, R: Compost>(&self, name: &str, args: &A) -> Result<R> {
        let entry = self.table.rpc(name).ok_or_else(|| ProtocolError::UnknownCall {
            name: name.to_string(),
        })?;
        if entry.request_type != TypeId::of::<A>() || entry.response_type != TypeId::of::<R>() {
            return Err(ProtocolError::SignatureMismatch {
                name: name.to_string(),
                expected: entry.signature(),
                found: format!("{} -> {}", Shape::of::<A>(), R::describe()),
            }
            .into());
        }

        let response = self
            .session
            .invoke(entry.rpc_id, args, &entry.request, self.timeout)
            .await?;
        check_response(name, entry.rpc_id, &response)?;

        let mut cursor = BitSize::ZERO;
        let value = R::deserialize(response.payload(), &mut cursor)?;
        debug!(name, rpc_id = entry.rpc_id, "call completed");
        Ok(value)
    }

    /// Run `handler` with the decoded arguments of every `name` notification.
    ///
    /// Payloads that do not decode as `N` are logged and skipped.
    pub fn subscribe<N, F>(&self, name: &str, handler: F) -> Result<Subscription>
    where
        N: Message,
        F: Fn(N) + Send + Sync + 'static,
    {
        let entry = self
            .table
            .notification(name)
            .ok_or_else(|| ProtocolError::UnknownNotification {
                name: name.to_string(),
            })?;
        if entry.args_type != TypeId::of::<N>() {
            return Err(ProtocolError::SignatureMismatch {
                name: name.to_string(),
                expected: entry.shape.to_string(),
                found: Shape::of::<N>().to_string(),
            }
            .into());
        }

        let label = name.to_string();
        let handler: NotificationHandler = Arc::new(move |frame: &Frame| match frame.decode::<N>() {
            Ok(args) => handler(args),
            Err(err) => warn!(
                notification = %label,
                expected = type_name::<N>(),
                error = %err,
                "dropping undecodable notification"
            ),
        });
        self.session.register_notification(entry.rpc_id, &handler);
        Ok(Subscription {
            rpc_id: entry.rpc_id,
            handler,
        })
    }

    /// Stop delivering to `subscription`. Returns whether it was still active.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.session
            .unregister_notification(subscription.rpc_id, &subscription.handler)
    }
}

impl<T: Transport> Clone for Protocol<T> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            table: Arc::clone(&self.table),
            timeout: self.timeout,
        }
    }
}

fn check_response(name: &str, rpc_id: u16, response: &Frame) -> std::result::Result<(), ProtocolError> {
    match response.rpc_id() {
        id if id == rpc_id => Ok(()),
        ERROR_RESPONSE => Err(ProtocolError::ErrorResponse {
            name: name.to_string(),
        }),
        UNSUPPORTED_RESPONSE => Err(ProtocolError::UnsupportedRequest {
            name: name.to_string(),
            rpc_id,
        }),
        received => Err(ProtocolError::MismatchedResponse {
            name: name.to_string(),
            expected: rpc_id,
            received,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_registers_entries() {
        let table = ProtocolTable::builder()
            .rpc::<(u32, u32), u32>("add", 0x010)
            .rpc::<(), ()>("reset", 0x011)
            .notification::<(u16,)>("tick", 0x020)
            .build()
            .unwrap();

        let add = table.rpc("add").unwrap();
        assert_eq!(add.rpc_id(), 0x010);
        assert_eq!(add.request_shape().fixed_size(), Some(BitSize::from_bytes(8)));
        assert_eq!(add.response_type(), "u32");
        assert_eq!(table.rpc_names(), vec!["add", "reset"]);
        assert_eq!(table.notification_names(), vec!["tick"]);
        assert_eq!(table.notification("tick").unwrap().rpc_id(), 0x020);
        assert!(table.rpc("tick").is_none());
    }

    #[test]
    fn builder_rejects_bad_registrations() {
        let dup_name = ProtocolTable::builder()
            .rpc::<(), ()>("ping", 0x001)
            .notification::<()>("ping", 0x002)
            .build();
        assert!(matches!(dup_name, Err(ProtocolError::InvalidRegistration { .. })));

        let dup_id = ProtocolTable::builder()
            .rpc::<(), ()>("a", 0x001)
            .rpc::<(), ()>("b", 0x001)
            .build();
        assert!(matches!(dup_id, Err(ProtocolError::InvalidRegistration { name, .. }) if name == "b"));

        let reserved = ProtocolTable::builder()
            .rpc::<(), ()>("err", ERROR_RESPONSE)
            .build();
        assert!(reserved.is_err());

        let too_big = ProtocolTable::builder()
            .notification::<()>("n", 0x1000)
            .build();
        assert!(too_big.is_err());
    }

    #[test]
    fn response_classification() {
        let ok = Frame::from_payload(1, 0x010, true, &[]).unwrap();
        assert!(check_response("add", 0x010, &ok).is_ok());

        let error = Frame::from_payload(1, ERROR_RESPONSE, true, &[]).unwrap();
        assert!(matches!(
            check_response("add", 0x010, &error),
            Err(ProtocolError::ErrorResponse { .. })
        ));

        let unsupported = Frame::from_payload(1, UNSUPPORTED_RESPONSE, true, &[]).unwrap();
        assert!(matches!(
            check_response("add", 0x010, &unsupported),
            Err(ProtocolError::UnsupportedRequest { rpc_id: 0x010, .. })
        ));

        let other = Frame::from_payload(1, 0x011, true, &[]).unwrap();
        assert!(matches!(
            check_response("add", 0x010, &other),
            Err(ProtocolError::MismatchedResponse {
                expected: 0x010,
                received: 0x011,
                ..
            })
        ));
    }
}
