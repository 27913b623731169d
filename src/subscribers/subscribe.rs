//! # Observer trait
//!
//! Each observer is driven by its own worker fed by a bounded queue owned by
//! [`SubscriberSet`](crate::SubscriberSet). Slow observers never block the
//! publisher or each other; when an observer's queue is full its events are
//! dropped and a `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use tickbus::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct TickCounter(AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for TickCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::TickFired {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "tick-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event observers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle one event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (minimum 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
