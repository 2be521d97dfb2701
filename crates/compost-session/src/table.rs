use std::sync::Arc;

use parking_lot::Mutex;

use crate::transaction::Transaction;

const SLOTS: usize = 256;

/// Hands out transaction ids 1..=255, wrapping back to 1.
///
/// Id 0 is reserved for notifications and never returned.
#[derive(Debug)]
pub struct TxnAllocator {
    next: Mutex<u8>,
}

impl TxnAllocator {
    pub fn new() -> Self {
        Self {
            next: Mutex::new(1),
        }
    }

    pub fn next_id(&self) -> u8 {
        let mut next = self.next.lock();
        let current = *next;
        *next = match current {
            u8::MAX => 1,
            n => n + 1,
        };
        current
    }
}

impl Default for TxnAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a transaction could not be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    /// A call with the same id is still in flight.
    Occupied(u8),
    /// The table was closed and accepts no more calls.
    Closed,
}

/// Pending transactions indexed by transaction id.
#[derive(Debug)]
pub struct TransactionTable {
    inner: Mutex<Slots>,
}

#[derive(Debug)]
struct Slots {
    slots: Vec<Option<Arc<Transaction>>>,
    pending: usize,
    closed: bool,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Slots {
                slots: vec![None; SLOTS],
                pending: 0,
                closed: false,
            }),
        }
    }

    /// Register `txn` under its id.
    pub fn insert(&self, txn: Arc<Transaction>) -> Result<(), SlotError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SlotError::Closed);
        }
        let id = txn.txn();
        let idx = usize::from(id);
        if inner.slots[idx].is_some() {
            return Err(SlotError::Occupied(id));
        }
        inner.slots[idx] = Some(txn);
        inner.pending += 1;
        Ok(())
    }

    /// Take the transaction registered under `id`.
    pub fn remove(&self, id: u8) -> Option<Arc<Transaction>> {
        let mut inner = self.inner.lock();
        let taken = inner.slots[usize::from(id)].take();
        if taken.is_some() {
            inner.pending -= 1;
        }
        taken
    }

    /// Remove `txn` only if it still occupies its slot.
    pub fn remove_exact(&self, txn: &Arc<Transaction>) -> bool {
        let mut inner = self.inner.lock();
        let idx = usize::from(txn.txn());
        let present = inner.slots[idx]
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, txn));
        if present {
            inner.slots[idx] = None;
            inner.pending -= 1;
        }
        present
    }

    /// Refuse further inserts and return everything still pending.
    pub fn close(&self) -> Vec<Arc<Transaction>> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.pending = 0;
        inner.slots.iter_mut().filter_map(Option::take).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl Default for TransactionTable {
    fn default() -> Self {
        Self::new()
    }
}
