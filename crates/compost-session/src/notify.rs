use std::collections::HashMap;
use std::sync::Arc;

use compost_frame::Frame;
use parking_lot::RwLock;

/// Callback invoked for every notification frame of one rpc id.
pub type NotificationHandler = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Ordered notification handlers per rpc id.
///
/// Handlers are compared by identity (`Arc::ptr_eq`), so registering the same
/// handle twice has no effect. An id with no handlers left is forgotten.
#[derive(Default)]
pub struct NotificationRegistry {
    handlers: RwLock<HashMap<u16, Vec<NotificationHandler>>>,
}

impl NotificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` for `rpc_id`. Returns `false` if it was already there.
    pub fn add(&self, rpc_id: u16, handler: &NotificationHandler) -> bool {
        let mut map = self.handlers.write();
        let list = map.entry(rpc_id).or_default();
        if list.iter().any(|h| Arc::ptr_eq(h, handler)) {
            return false;
        }
        list.push(Arc::clone(handler));
        true
    }

    /// Remove `handler` from `rpc_id`. Returns whether it was registered.
    pub fn remove(&self, rpc_id: u16, handler: &NotificationHandler) -> bool {
        let mut map = self.handlers.write();
        let Some(list) = map.get_mut(&rpc_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !Arc::ptr_eq(h, handler));
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(&rpc_id);
        }
        removed
    }

    /// Snapshot of the handlers for `rpc_id`, or `None` if it is not registered.
    pub fn handlers(&self, rpc_id: u16) -> Option<Vec<NotificationHandler>> {
        self.handlers.read().get(&rpc_id).cloned()
    }

    pub fn is_registered(&self, rpc_id: u16) -> bool {
        self.handlers.read().contains_key(&rpc_id)
    }
}

impl std::fmt::Debug for NotificationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.handlers.read();
        let mut ids: Vec<_> = map.iter().map(|(id, list)| (*id, list.len())).collect();
        ids.sort_unstable();
        f.debug_struct("NotificationRegistry")
            .field("handlers", &ids)
            .finish()
    }
}
