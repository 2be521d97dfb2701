use std::sync::Arc;

use compost_frame::Frame;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// How a transaction ended.
#[derive(Debug)]
pub enum Outcome {
    Response(Frame),
    Cancelled,
}

/// One in-flight call: the request frame and a single resolution slot.
///
/// Whichever of [`resolve`](Self::resolve) or [`cancel`](Self::cancel) runs
/// first decides the outcome; later attempts are ignored and return `false`.
#[derive(Debug)]
pub struct Transaction {
    request: Frame,
    slot: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl Transaction {
    /// Create a transaction for `request` and the receiver its caller awaits.
    pub fn new(request: Frame) -> (Arc<Self>, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let txn = Arc::new(Self {
            request,
            slot: Mutex::new(Some(tx)),
        });
        (txn, rx)
    }

    pub fn txn(&self) -> u8 {
        self.request.txn()
    }

    pub fn request(&self) -> &Frame {
        &self.request
    }

    /// Complete with `response`. Returns `false` if already completed.
    pub fn resolve(&self, response: Frame) -> bool {
        self.complete(Outcome::Response(response))
    }

    /// Complete as cancelled. Returns `false` if already completed.
    pub fn cancel(&self) -> bool {
        self.complete(Outcome::Cancelled)
    }

    pub fn is_completed(&self) -> bool {
        self.slot.lock().is_none()
    }

    fn complete(&self, outcome: Outcome) -> bool {
        let Some(tx) = self.slot.lock().take() else {
            return false;
        };
        // The caller may have given up already; the slot is consumed either way.
        let _ = tx.send(outcome);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Frame {
        Frame::from_payload(4, 0x010, false, &[1, 2, 3, 4]).unwrap()
    }

    #[tokio::test]
    async fn first_resolution_wins() {
        let (txn, rx) = Transaction::new(request());
        assert_eq!(txn.txn(), 4);
        let response = Frame::from_payload(4, 0x010, true, &[9]).unwrap();

        assert!(txn.resolve(response.clone()));
        assert!(txn.is_completed());
        assert!(!txn.cancel());
        assert!(!txn.resolve(response.clone()));

        match rx.await.unwrap() {
            Outcome::Response(frame) => assert_eq!(frame, response),
            Outcome::Cancelled => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn cancel_before_resolve() {
        let (txn, rx) = Transaction::new(request());
        assert!(txn.cancel());
        assert!(!txn.resolve(request()));
        assert!(matches!(rx.await.unwrap(), Outcome::Cancelled));
    }

    #[test]
    fn resolving_after_caller_left_still_consumes() {
        let (txn, rx) = Transaction::new(request());
        drop(rx);
        assert!(txn.cancel());
        assert!(!txn.cancel());
    }
}
