//! # Broadcast hub for runtime events.
//!
//! [`Hub`] wraps [`tokio::sync::broadcast`] so that every component (ticker,
//! state store, channel contexts, workers) can publish without blocking.
//!
//! ```text
//! Publishers (many):                 Consumers:
//!   Ticker        ──┐
//!   StateStore    ──┼──► Hub ───────► hub listener ──► ChannelSet / SubscriberSet
//!   ChannelContext──┤  (broadcast)  └─► BusHandle::subscribe() receivers
//!   Workers       ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; events with no receiver are dropped.
//! - One ring buffer of `capacity` events is shared by all receivers.
//! - Lagging receivers observe `RecvError::Lagged(n)` and skip `n` events.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publish/subscribe handle over a broadcast channel.
#[derive(Clone, Debug)]
pub struct Hub {
    tx: broadcast::Sender<Event>,
}

impl Hub {
    /// Creates a hub; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// New receiver observing events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_only_see_later_events() {
        let hub = Hub::new(8);
        hub.publish(Event::new(EventKind::BusStarting));

        let mut rx = hub.subscribe();
        hub.publish(Event::new(EventKind::BusStarted));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::BusStarted);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn lagging_receiver_skips_oldest() {
        let hub = Hub::new(2);
        let mut rx = hub.subscribe();
        for tick in 1..=5 {
            hub.publish(Event::tick(tick));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap().tick, Some(4));
    }
}
