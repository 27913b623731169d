//! # Non-blocking fan-out to observers.
//!
//! ```text
//! emit(event)
//!     ├──► [queue 1] ──► worker 1 ──► sub1.on_event()   (panic → SubscriberPanicked)
//!     └──► [queue N] ──► worker N ──► subN.on_event()
//! ```
//!
//! ## Rules
//! - `emit()` returns immediately (`try_send`)
//! - Per-observer FIFO, no ordering across observers
//! - Full or closed queue: event dropped for that observer, `SubscriberOverflow` published
//!   (never for an overflow event itself)
//! - Panics are caught; the worker keeps going

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Event, Hub, panic_message};
use crate::subscribers::Subscribe;

struct Queue {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for observers.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
    hub: Hub,
}

impl SubscriberSet {
    /// Spawns one worker per observer. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, hub: Hub) -> Self {
        let mut queues = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            let worker_hub = hub.clone();

            workers.push(tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = std::panic::AssertUnwindSafe(sub.on_event(ev.as_ref()));
                    if let Err(payload) = fut.catch_unwind().await {
                        worker_hub.publish(Event::subscriber_panicked(
                            sub.name(),
                            panic_message(&*payload),
                        ));
                    }
                }
            }));
            queues.push(Queue { name, sender: tx });
        }

        Self {
            queues,
            workers,
            hub,
        }
    }

    /// Number of observers.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Delivers `event` to every observer without waiting.
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Same as [`emit`](Self::emit) for an already shared event.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let is_overflow = event.is_overflow();

        for queue in &self.queues {
            let reason = match queue.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow {
                self.hub
                    .publish(Event::subscriber_overflow(queue.name, reason));
            }
        }
    }

    /// Closes every queue and waits for the workers to drain them.
    pub async fn shutdown(self) {
        drop(self.queues);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
