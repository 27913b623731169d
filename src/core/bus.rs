//! # Bus: channel initialization, delivery and graceful shutdown.
//!
//! [`Bus`] owns the hub, the shared state, the global config and the channels.
//! [`Bus::run`] drives them until an OS signal or an explicit shutdown.
//!
//! ## Lifecycle
//! ```text
//! run():
//!   rx = hub.subscribe()                 (buffers events published during init)
//!   spawn cancel_on_signal(token)
//!   publish BusStarting
//!   for channel in registration order:
//!       init_channel()  ── Err ──► stop initialized (on_shutdown, ChannelStopped), flush observers, Err(ChannelInit)
//!   ChannelSet::new(channels)            one worker per channel
//!   SubscriberSet::new(observers)        one worker per observer
//!   spawn hub listener(rx)  ──► ChannelSet::route + SubscriberSet::emit
//!   spawn ticker (if enabled)
//!   publish BusStarted
//!
//!   token.cancelled().await
//!
//!   publish ShutdownRequested
//!   ChannelSet::close()  → workers drain, on_shutdown, ChannelStopped
//!   ChannelSet::join(grace):
//!       ├─ all joined → publish AllStoppedWithin, Ok
//!       └─ timeout    → publish GraceExceeded, Err(GraceExceeded{stuck})
//!   stop listener (drains), SubscriberSet::shutdown()
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tickbus::{Bus, LogWriter, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tickbus::BusError> {
//!     let observers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     Bus::builder()
//!         .with_subscribers(observers)
//!         .enable_tick(1000)
//!         .init_with(json!({ "websocketConnected": false, "messages": [] }))
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    channels::{ChannelContext, ChannelRef},
    config::{BusConfig, GlobalConfig},
    core::{
        BusBuilder, BusHandle,
        dispatch::{ChannelSet, stop_channel},
        init::init_channel,
        shutdown, ticker,
    },
    error::{BusError, ChannelError},
    events::{Event, EventKind, Hub},
    state::StateStore,
    subscribers::{Subscribe, SubscriberSet},
};

/// Assembled bus, ready to run.
pub struct Bus {
    cfg: BusConfig,
    hub: Hub,
    channels: Vec<ChannelRef>,
    config: GlobalConfig,
    state: StateStore,
    subscribers: Vec<Arc<dyn Subscribe>>,
    token: CancellationToken,
}

impl Bus {
    /// Starts a builder with default runtime settings.
    pub fn builder() -> BusBuilder {
        BusBuilder::default()
    }

    pub(crate) fn new_internal(
        cfg: BusConfig,
        hub: Hub,
        channels: Vec<ChannelRef>,
        config: GlobalConfig,
        state: StateStore,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        Self {
            cfg,
            hub,
            channels,
            config,
            state,
            subscribers,
            token: CancellationToken::new(),
        }
    }

    /// Shared state.
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Global config record.
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Runtime settings.
    pub fn runtime_config(&self) -> &BusConfig {
        &self.cfg
    }

    /// Raw receiver of every runtime event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.hub.subscribe()
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Publishes a message to every channel (no source).
    pub fn publish(&self, topic: impl Into<Arc<str>>, payload: serde_json::Value) {
        self.hub.publish(Event::message(None, topic, payload));
    }

    /// Spawns [`run`](Self::run) on the current runtime and returns a control handle.
    pub fn start(self) -> BusHandle {
        let handle = BusHandle::new(
            self.hub.clone(),
            self.state.clone(),
            self.config.clone(),
            self.token.clone(),
        );
        let rx = self.hub.subscribe();
        handle.attach(tokio::spawn(self.run_with(rx)))
    }

    /// Runs until a termination signal or cancellation of the shutdown token.
    ///
    /// Returns `BusError::ChannelInit` if a channel cannot be initialized and
    /// `BusError::GraceExceeded` if channels do not stop within `grace`.
    pub async fn run(self) -> Result<(), BusError> {
        let rx = self.hub.subscribe();
        self.run_with(rx).await
    }

    /// `rx` is subscribed by the caller so nothing published before the task
    /// is first polled gets lost.
    async fn run_with(self, rx: broadcast::Receiver<Event>) -> Result<(), BusError> {
        let signals = tokio::spawn(shutdown::cancel_on_signal(self.token.clone()));
        self.hub.publish(Event::new(EventKind::BusStarting));

        let res = self.drive(rx).await;

        self.token.cancel();
        let _ = signals.await;
        res
    }

    async fn drive(&self, mut rx: broadcast::Receiver<Event>) -> Result<(), BusError> {
        let entries = match self.init_channels().await {
            Ok(entries) => entries,
            Err(err) => {
                let subs = SubscriberSet::new(self.subscribers.clone(), self.hub.clone());
                drain_pending(&mut rx, None, &subs);
                subs.shutdown().await;
                return err.map_or(Ok(()), Err);
            }
        };

        let channels = Arc::new(ChannelSet::new(
            entries,
            self.hub.clone(),
            self.cfg.handler_timeout(),
        ));
        let subs = SubscriberSet::new(self.subscribers.clone(), self.hub.clone());
        let stop_listener = CancellationToken::new();
        let listener = spawn_listener(rx, Arc::clone(&channels), subs, stop_listener.clone());
        let ticker = self
            .cfg
            .tick()
            .map(|period| ticker::spawn(self.hub.clone(), period, self.token.child_token()));

        self.hub.publish(Event::new(EventKind::BusStarted));
        self.token.cancelled().await;

        let res = self.stop_channels(&channels, ticker).await;

        stop_listener.cancel();
        match listener.await {
            Ok(subs) => subs.shutdown().await,
            Err(err) => warn!(error = %err, "hub listener ended abnormally"),
        }
        res
    }

    /// Initializes channels in registration order.
    ///
    /// `Err(None)` means shutdown was requested during initialization.
    async fn init_channels(&self) -> Result<Vec<(ChannelRef, ChannelContext)>, Option<BusError>> {
        let mut ready: Vec<(ChannelRef, ChannelContext)> = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let ctx = ChannelContext::new(
                Arc::from(channel.name()),
                self.config.clone(),
                &self.state,
                self.hub.clone(),
                self.token.clone(),
            );

            match init_channel(channel.as_ref(), &ctx, &self.cfg, &self.hub, &self.token).await {
                Ok(()) => ready.push((Arc::clone(channel), ctx)),
                Err(err) => {
                    for (initialized, ctx) in ready.iter().rev() {
                        stop_channel(initialized.as_ref(), ctx, &self.hub).await;
                    }
                    if matches!(err, ChannelError::Canceled) && self.token.is_cancelled() {
                        self.hub.publish(Event::new(EventKind::ShutdownRequested));
                        return Err(None);
                    }
                    return Err(Some(BusError::ChannelInit {
                        channel: channel.name().to_string(),
                        error: err,
                    }));
                }
            }
        }
        Ok(ready)
    }

    /// Stops the ticker and channel workers within the grace period.
    async fn stop_channels(
        &self,
        channels: &ChannelSet,
        ticker: Option<JoinHandle<u64>>,
    ) -> Result<(), BusError> {
        self.hub.publish(Event::new(EventKind::ShutdownRequested));
        if let Some(ticker) = ticker {
            let _ = ticker.await;
        }

        channels.close();
        let stuck = channels.join(self.cfg.grace).await;

        if stuck.is_empty() {
            self.hub.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        } else {
            self.hub
                .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")));
            Err(BusError::GraceExceeded {
                grace: self.cfg.grace,
                stuck,
            })
        }
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.channels.iter().map(|c| c.name()).collect();
        f.debug_struct("Bus")
            .field("channels", &names)
            .field("subscribers", &self.subscribers.len())
            .field("cfg", &self.cfg)
            .field("state", &self.state)
            .finish()
    }
}

/// Routes hub events to channels and observers until `stop`, then drains what is buffered.
fn spawn_listener(
    mut rx: broadcast::Receiver<Event>,
    channels: Arc<ChannelSet>,
    subs: SubscriberSet,
    stop: CancellationToken,
) -> JoinHandle<SubscriberSet> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => forward(Some(channels.as_ref()), &subs, ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "hub listener lagged; events were dropped");
                    }
                    Err(RecvError::Closed) => return subs,
                }
            }
        }
        drain_pending(&mut rx, Some(channels.as_ref()), &subs);
        subs
    })
}

fn drain_pending(
    rx: &mut broadcast::Receiver<Event>,
    channels: Option<&ChannelSet>,
    subs: &SubscriberSet,
) {
    loop {
        match rx.try_recv() {
            Ok(ev) => forward(channels, subs, ev),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "hub listener lagged; events were dropped");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn forward(channels: Option<&ChannelSet>, subs: &SubscriberSet, ev: Event) {
    let ev = Arc::new(ev);
    if let Some(channels) = channels {
        channels.route(&ev);
    }
    subs.emit_arc(ev);
}
