//! Sessions for Compost RPC.
//!
//! A [`Session`] owns one transport and multiplexes concurrent calls over it,
//! matching responses to callers by transaction id and routing unsolicited
//! frames to notification handlers. [`Protocol`] adds name-based typed calls
//! on top, and [`Proxy`] bridges TCP clients onto a session.

pub mod error;
pub mod notify;
pub mod protocol;
pub mod proxy;
pub mod session;
pub mod table;
pub mod transaction;

pub use error::{ProtocolError, Result, SessionError};
pub use notify::{NotificationHandler, NotificationRegistry};
pub use protocol::{Protocol, ProtocolTable, ProtocolTableBuilder, Subscription};
pub use proxy::{Proxy, ProxyConfig, DEFAULT_PROXY_PORT};
pub use session::{Session, SessionConfig, SessionEvent, DEFAULT_SHUTDOWN_GRACE};
pub use table::{TransactionTable, TxnAllocator};
pub use transaction::{Outcome, Transaction};
