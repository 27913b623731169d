//! # Per-channel delivery.
//!
//! [`ChannelSet`] owns one bounded queue and one worker per channel and routes
//! traffic events (ticks, messages, state changes) to them.
//!
//! ```text
//! route(event)
//!     │  (Arc-clone per channel, sender of a message skipped)
//!     ├──► [queue A] ──► worker A ──► A.on_tick / on_message / on_state_change
//!     ├──► [queue B] ──► worker B ──► ...
//!     └──► [queue N] ──► worker N ──► ...
//!
//! worker:
//!   while let Some(ev) = rx.recv():
//!       ├─ Ok                    → continue
//!       ├─ Err(Canceled)         → continue
//!       ├─ Err(Fail/Timeout)     → publish ChannelFailed
//!       ├─ Err(Fatal)            → publish ChannelFailed + ChannelDetached, stop
//!       └─ panic                 → publish ChannelPanicked, continue
//!   on_shutdown() → publish ChannelStopped
//! ```
//!
//! ## Rules
//! - `route()` never blocks (`try_send`); a full queue drops the event for that
//!   channel only and publishes `ChannelOverflow`.
//! - A detached channel's closed queue is reported once, not per event.
//! - Per-channel FIFO; no ordering across channels.
//! - `close()` drops the senders: workers drain what is queued, then run `on_shutdown`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle, time};

use crate::channels::{Channel, ChannelContext, ChannelRef, Message, Tick};
use crate::error::ChannelError;
use crate::events::{Event, EventKind, Hub, panic_message};
use crate::state::StateChange;

struct ChannelQueue {
    name: Arc<str>,
    sender: mpsc::Sender<Arc<Event>>,
    closed_reported: AtomicBool,
}

/// Fan-out coordinator for channels.
pub(crate) struct ChannelSet {
    queues: RwLock<Vec<ChannelQueue>>,
    workers: Mutex<Vec<(Arc<str>, JoinHandle<()>)>>,
    hub: Hub,
}

impl ChannelSet {
    /// Spawns one worker per `(channel, context)` pair.
    pub(crate) fn new(
        entries: Vec<(ChannelRef, ChannelContext)>,
        hub: Hub,
        handler_timeout: Option<Duration>,
    ) -> Self {
        let mut queues = Vec::with_capacity(entries.len());
        let mut workers = Vec::with_capacity(entries.len());

        for (channel, ctx) in entries {
            let name: Arc<str> = Arc::from(channel.name());
            let (tx, rx) = mpsc::channel::<Arc<Event>>(channel.queue_capacity().max(1));

            let worker = Worker {
                channel,
                ctx,
                hub: hub.clone(),
                handler_timeout,
            };
            workers.push((Arc::clone(&name), tokio::spawn(worker.run(rx))));
            queues.push(ChannelQueue {
                name,
                sender: tx,
                closed_reported: AtomicBool::new(false),
            });
        }

        Self {
            queues: RwLock::new(queues),
            workers: Mutex::new(workers),
            hub,
        }
    }

    /// Routes a traffic event to the channels; other kinds are ignored.
    pub(crate) fn route(&self, event: &Arc<Event>) {
        if !event.is_traffic() {
            return;
        }
        let source = match event.kind {
            EventKind::MessagePublished => event.channel.as_deref(),
            _ => None,
        };

        let queues = self.queues.read().unwrap_or_else(PoisonError::into_inner);
        for queue in queues.iter() {
            if source == Some(&*queue.name) {
                continue;
            }
            match queue.sender.try_send(Arc::clone(event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.hub
                        .publish(Event::channel_overflow(&queue.name, "full"));
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    if !queue.closed_reported.swap(true, Ordering::Relaxed) {
                        self.hub
                            .publish(Event::channel_overflow(&queue.name, "closed"));
                    }
                }
            }
        }
    }

    /// Drops every sender; workers finish their queues and run `on_shutdown`.
    pub(crate) fn close(&self) {
        self.queues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Waits up to `grace` for all workers; returns the names of those still running
    /// (which are aborted).
    pub(crate) async fn join(&self, grace: Duration) -> Vec<String> {
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let deadline = time::Instant::now() + grace;
        let mut stuck = Vec::new();
        for (name, mut handle) in workers {
            if time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                stuck.push(name.to_string());
            }
        }
        stuck
    }
}

/// Worker state for one channel.
struct Worker {
    channel: ChannelRef,
    ctx: ChannelContext,
    hub: Hub,
    handler_timeout: Option<Duration>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<Arc<Event>>) {
        while let Some(ev) = rx.recv().await {
            let delivery = std::panic::AssertUnwindSafe(self.deliver(&ev)).catch_unwind();

            match delivery.await {
                Ok(Ok(())) | Ok(Err(ChannelError::Canceled)) => {}
                Ok(Err(err)) => {
                    self.hub.publish(
                        Event::new(EventKind::ChannelFailed)
                            .with_channel(self.ctx.name())
                            .with_reason(err.to_string())
                            .with_error_label(err.as_label()),
                    );
                    if let ChannelError::Fatal { error } = err {
                        self.hub.publish(
                            Event::new(EventKind::ChannelDetached)
                                .with_channel(self.ctx.name())
                                .with_reason(error),
                        );
                        break;
                    }
                }
                Err(payload) => {
                    self.hub.publish(Event::channel_panicked(
                        self.ctx.name(),
                        panic_message(&*payload),
                    ));
                }
            }
        }

        drop(rx);
        self.stop().await;
    }

    /// Runs the hook matching the event kind, bounded by the handler timeout.
    async fn deliver(&self, ev: &Event) -> Result<(), ChannelError> {
        let ctx = &self.ctx;
        let hook = async {
            match ev.kind {
                EventKind::TickFired => match Tick::from_event(ev) {
                    Some(tick) => self.channel.on_tick(ctx, tick).await,
                    None => Ok(()),
                },
                EventKind::MessagePublished => match Message::from_event(ev) {
                    Some(msg) => self.channel.on_message(ctx, &msg).await,
                    None => Ok(()),
                },
                EventKind::StateChanged => match StateChange::from_event(ev) {
                    Some(change) => self.channel.on_state_change(ctx, &change).await,
                    None => Ok(()),
                },
                _ => Ok(()),
            }
        };

        match self.handler_timeout {
            Some(limit) => time::timeout(limit, hook)
                .await
                .unwrap_or(Err(ChannelError::Timeout { timeout: limit })),
            None => hook.await,
        }
    }

    async fn stop(&self) {
        stop_channel(self.channel.as_ref(), &self.ctx, &self.hub).await;
    }
}

/// Runs `on_shutdown` (panics caught) and publishes `ChannelStopped`.
pub(crate) async fn stop_channel(channel: &dyn Channel, ctx: &ChannelContext, hub: &Hub) {
    let shutdown = std::panic::AssertUnwindSafe(channel.on_shutdown(ctx));
    if let Err(payload) = shutdown.catch_unwind().await {
        hub.publish(Event::channel_panicked(ctx.name(), panic_message(&*payload)));
    }
    hub.publish(Event::new(EventKind::ChannelStopped).with_channel(ctx.name()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalConfig;
    use crate::state::StateStore;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Probe {
        seen: Mutex<Vec<String>>,
        stopped: AtomicBool,
    }

    #[async_trait]
    impl Channel for Probe {
        fn name(&self) -> &str {
            "probe"
        }
        async fn on_tick(&self, _ctx: &ChannelContext, tick: Tick) -> Result<(), ChannelError> {
            if tick.n == 2 {
                panic!("tick two");
            }
            self.seen.lock().unwrap().push(format!("tick:{}", tick.n));
            Ok(())
        }
        async fn on_message(&self, _ctx: &ChannelContext, msg: &Message) -> Result<(), ChannelError> {
            if &*msg.topic == "poison" {
                return Err(ChannelError::fatal("poisoned"));
            }
            self.seen.lock().unwrap().push(format!("msg:{}", msg.topic));
            Ok(())
        }
        async fn on_state_change(
            &self,
            _ctx: &ChannelContext,
            change: &StateChange,
        ) -> Result<(), ChannelError> {
            self.seen.lock().unwrap().push(format!("state:{}", change.version));
            Err(ChannelError::fail("state handler sulks"))
        }
        async fn on_shutdown(&self, _ctx: &ChannelContext) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    fn set_with(probe: Arc<Probe>, hub: &Hub) -> ChannelSet {
        let state = StateStore::new(json!({}), hub.clone()).unwrap();
        let ctx = ChannelContext::new(
            Arc::from("probe"),
            GlobalConfig::default(),
            &state,
            hub.clone(),
            CancellationToken::new(),
        );
        let channel: ChannelRef = probe;
        ChannelSet::new(vec![(channel, ctx)], hub.clone(), None)
    }

    async fn kinds_until_stopped(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        loop {
            let ev = rx.recv().await.unwrap();
            kinds.push(ev.kind);
            if ev.kind == EventKind::ChannelStopped {
                return kinds;
            }
        }
    }

    #[tokio::test]
    async fn routes_traffic_and_reports_failures() {
        let hub = Hub::new(64);
        let mut rx = hub.subscribe();
        let probe = Arc::new(Probe::default());
        let set = set_with(probe.clone(), &hub);

        set.route(&Arc::new(Event::new(EventKind::BusStarted)));
        set.route(&Arc::new(Event::tick(1)));
        set.route(&Arc::new(Event::tick(2)));
        set.route(&Arc::new(Event::message(None, "hello", json!(1))));
        set.route(&Arc::new(Event::message(Some("probe"), "own-echo", json!(1))));
        set.route(&Arc::new(Event::state_changed(7, vec!["k".into()], None)));
        set.close();
        assert!(set.join(Duration::from_secs(5)).await.is_empty());

        assert_eq!(
            *probe.seen.lock().unwrap(),
            vec!["tick:1", "msg:hello", "state:7"]
        );
        assert!(probe.stopped.load(Ordering::SeqCst));
        assert_eq!(
            kinds_until_stopped(&mut rx).await,
            vec![
                EventKind::ChannelPanicked,
                EventKind::ChannelFailed,
                EventKind::ChannelStopped
            ]
        );
    }

    #[tokio::test]
    async fn fatal_error_detaches_and_closed_queue_is_reported_once() {
        let hub = Hub::new(64);
        let mut rx = hub.subscribe();
        let probe = Arc::new(Probe::default());
        let set = set_with(probe.clone(), &hub);

        set.route(&Arc::new(Event::message(None, "poison", json!(null))));
        assert_eq!(
            kinds_until_stopped(&mut rx).await,
            vec![
                EventKind::ChannelFailed,
                EventKind::ChannelDetached,
                EventKind::ChannelStopped
            ]
        );

        set.route(&Arc::new(Event::tick(1)));
        set.route(&Arc::new(Event::tick(3)));
        let overflow = rx.recv().await.unwrap();
        assert_eq!(overflow.kind, EventKind::ChannelOverflow);
        assert_eq!(overflow.reason.as_deref(), Some("closed"));
        assert!(rx.try_recv().is_err());
        assert!(probe.seen.lock().unwrap().is_empty());

        set.close();
        assert!(set.join(Duration::from_secs(1)).await.is_empty());
    }

    struct Sluggish;

    #[async_trait]
    impl Channel for Sluggish {
        fn name(&self) -> &str {
            "sluggish"
        }
        async fn on_message(&self, _ctx: &ChannelContext, _msg: &Message) -> Result<(), ChannelError> {
            time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_and_slow_handler_times_out() {
        let hub = Hub::new(64);
        let mut rx = hub.subscribe();
        let state = StateStore::new(json!({}), hub.clone()).unwrap();
        let ctx = ChannelContext::new(
            Arc::from("sluggish"),
            GlobalConfig::default(),
            &state,
            hub.clone(),
            CancellationToken::new(),
        );
        let channel: ChannelRef = Arc::new(Sluggish);
        let set = ChannelSet::new(
            vec![(channel, ctx)],
            hub.clone(),
            Some(Duration::from_secs(1)),
        );

        for n in 0..5 {
            set.route(&Arc::new(Event::message(None, format!("m{n}"), json!(n))));
        }

        for _ in 0..4 {
            let ev = rx.recv().await.unwrap();
            assert_eq!(ev.kind, EventKind::ChannelOverflow);
            assert_eq!(ev.channel.as_deref(), Some("sluggish"));
            assert_eq!(ev.reason.as_deref(), Some("full"));
        }

        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::ChannelFailed);
        assert_eq!(failed.error_label, Some("channel_timeout"));
        assert_eq!(failed.reason.as_deref(), Some("timed out after 1s"));

        set.close();
        assert!(set.join(Duration::from_secs(10)).await.is_empty());
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ChannelStopped);
    }
}
