//! Receipt correlation.
//!
//! A frame sent with a `receipt` header gets a [`oneshot`] registered here
//! under its receipt id; the session resolves it when the matching RECEIPT
//! frame arrives, or fails every pending entry when the session dies. The
//! lock is held only for map lookup/insert/remove.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, oneshot};
use tracing::trace;

use crate::error::StompError;

type PendingReceipts = HashMap<String, oneshot::Sender<Result<(), StompError>>>;

/// Tracks `receipt` headers awaiting their server RECEIPT frame.
#[derive(Clone, Default)]
pub struct ReceiptTracker {
    pending: Arc<Mutex<PendingReceipts>>,
    counter: Arc<AtomicU64>,
}

impl ReceiptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a session-unique receipt id.
    pub fn next_id(&self) -> String {
        format!("rcpt-{}", self.counter.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Register a pending receipt and return the completion signal.
    pub async fn register(&self, receipt_id: &str) -> oneshot::Receiver<Result<(), StompError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(receipt_id.to_string(), tx);
        rx
    }

    /// Resolve a receipt by id. Returns false when no such receipt is
    /// pending (already timed out, or never requested).
    pub async fn resolve(&self, receipt_id: &str) -> bool {
        match self.pending.lock().await.remove(receipt_id) {
            Some(tx) => {
                trace!(receipt_id, "receipt resolved");
                tx.send(Ok(())).is_ok()
            }
            None => false,
        }
    }

    /// Drop a registration after its waiter gave up.
    pub async fn forget(&self, receipt_id: &str) {
        self.pending.lock().await.remove(receipt_id);
    }

    /// Fail every pending receipt with the session's terminal cause.
    pub async fn fail_all(&self, cause: &StompError) {
        let mut pending = self.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(cause.clone()));
        }
    }
}
