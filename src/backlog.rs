// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

//! Resolution backlog and batch collection.
//!
//! The backlog is an unbounded multi-producer queue of identifiers
//! awaiting resolution, with an in-flight set so casual callers do not
//! enqueue the same identifier twice. Correctness never depends on
//! backlog uniqueness — batches deduplicate and cache updates are
//! idempotent — the set only keeps request volume down.

use crate::types::AgentId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Multi-producer side of the resolution queue.
#[derive(Debug)]
pub struct Backlog {
    tx: mpsc::UnboundedSender<AgentId>,
    pending: Mutex<HashSet<AgentId>>,
}

impl Backlog {
    /// Create the queue, returning the producer half and the receiver the
    /// collector task drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AgentId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                pending: Mutex::new(HashSet::new()),
            },
            rx,
        )
    }

    /// Queue an identifier for resolution.
    ///
    /// Returns `false` when the identifier is already in flight or the
    /// collector has shut down.
    pub fn enqueue(&self, id: AgentId) -> bool {
        let mut pending = self.pending.lock();
        if pending.contains(&id) {
            return false;
        }
        if self.tx.send(id).is_err() {
            return false;
        }
        pending.insert(id);
        true
    }

    /// Drop identifiers from the in-flight set once their batch has
    /// completed (successfully or not), so later lookups can re-enqueue.
    pub fn clear_pending<'a>(&self, ids: impl IntoIterator<Item = &'a AgentId>) {
        let mut pending = self.pending.lock();
        for id in ids {
            pending.remove(id);
        }
    }

    /// Number of identifiers currently in flight.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Drain the backlog into one bounded batch.
///
/// `first` is the item that woke the collector. Immediately-available
/// items are taken without waiting; when the queue runs dry a bounded
/// wait races the remaining window. Collection stops after `window` has
/// elapsed or the deduplicated batch holds `max_items`, whichever first.
pub(crate) async fn collect_batch(
    rx: &mut mpsc::UnboundedReceiver<AgentId>,
    first: AgentId,
    window: Duration,
    max_items: usize,
) -> HashSet<AgentId> {
    let mut batch = HashSet::new();
    batch.insert(first);
    let deadline = tokio::time::Instant::now() + window;

    while batch.len() < max_items {
        match rx.try_recv() {
            Ok(id) => {
                batch.insert(id);
                continue;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(id)) => {
                batch.insert(id);
            }
            // Channel closed or window exhausted: dispatch what we have.
            Ok(None) | Err(_) => break,
        }
    }

    batch
}
