// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

//! Broadcast fan-out of name-change events.
//!
//! Every successful batch that changed at least one name publishes a map
//! of `{id → formatted string}` for just the changed names. Any number of
//! subscribers may listen; a slow or dropped subscriber never disturbs
//! the publisher or the other subscribers.

use crate::types::AgentId;
use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;

/// Names changed by one resolved batch, formatted under the mode that was
/// current when the batch completed.
pub type NameEvent = HashMap<AgentId, String>;

/// A subscription handle for receiving events.
pub struct Subscription<T> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    fn new(receiver: broadcast::Receiver<T>) -> Self {
        Self { receiver }
    }

    /// Receive the next event.
    pub async fn recv(&mut self) -> Result<T> {
        self.receiver
            .recv()
            .await
            .map_err(|e| anyhow::anyhow!("subscription error: {e}"))
    }

    /// Try to receive without blocking.
    pub fn try_recv(&mut self) -> Result<T> {
        self.receiver
            .try_recv()
            .map_err(|e| anyhow::anyhow!("subscription error: {e}"))
    }

    /// Await the first event for which `matches` returns `Some`, bounded
    /// by `timeout`.
    ///
    /// Lagged receivers skip ahead and keep waiting; channel closure and
    /// timeout both yield `None`. This is the primitive behind the
    /// blocking/awaiting lookup APIs.
    pub async fn next_matching<F, R>(&mut self, timeout: Duration, mut matches: F) -> Option<R>
    where
        F: FnMut(&T) -> Option<R>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match tokio::time::timeout(remaining, self.receiver.recv()).await {
                Ok(Ok(event)) => {
                    if let Some(value) = matches(&event) {
                        return Some(value);
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                Err(_) => return None,
            }
        }
    }
}

/// Broadcaster for [`NameEvent`]s.
#[derive(Debug, Clone)]
pub struct NameEventBus {
    tx: broadcast::Sender<NameEvent>,
}

impl NameEventBus {
    /// Create a bus whose subscribers buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to name-change events.
    pub fn subscribe(&self) -> Subscription<NameEvent> {
        Subscription::new(self.tx.subscribe())
    }

    /// Publish a change map. Empty maps and zero subscribers are no-ops.
    pub fn publish(&self, changed: NameEvent) {
        if changed.is_empty() {
            return;
        }
        let _ = self.tx.send(changed); // Ignore if no subscribers
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let bus = NameEventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let id = AgentId::random();
        let mut event = NameEvent::new();
        event.insert(id, "Jane Doe".to_string());
        bus.publish(event);

        assert_eq!(first.recv().await.unwrap().get(&id).unwrap(), "Jane Doe");
        assert_eq!(second.recv().await.unwrap().get(&id).unwrap(), "Jane Doe");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = NameEventBus::new(16);
        let mut event = NameEvent::new();
        event.insert(AgentId::random(), "Jane Doe".to_string());
        bus.publish(event);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn next_matching_filters_by_identifier() {
        let bus = NameEventBus::new(16);
        let mut sub = bus.subscribe();

        let wanted = AgentId::random();
        let other = AgentId::random();

        let mut unrelated = NameEvent::new();
        unrelated.insert(other, "Someone Else".to_string());
        bus.publish(unrelated);

        let mut relevant = NameEvent::new();
        relevant.insert(wanted, "Jane Doe".to_string());
        bus.publish(relevant);

        let name = sub
            .next_matching(Duration::from_secs(1), |event| event.get(&wanted).cloned())
            .await;
        assert_eq!(name.as_deref(), Some("Jane Doe"));
    }

    #[tokio::test(start_paused = true)]
    async fn next_matching_times_out() {
        let bus = NameEventBus::new(16);
        let mut sub = bus.subscribe();
        let id = AgentId::random();

        let name = sub
            .next_matching(Duration::from_secs(5), |event: &NameEvent| {
                event.get(&id).cloned()
            })
            .await;
        assert!(name.is_none());
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_break_publisher() {
        let bus = NameEventBus::new(16);
        let mut kept = bus.subscribe();
        {
            let _dropped = bus.subscribe();
        }

        let id = AgentId::random();
        let mut event = NameEvent::new();
        event.insert(id, "Jane Doe".to_string());
        bus.publish(event);

        assert!(kept.recv().await.unwrap().contains_key(&id));
    }
}
