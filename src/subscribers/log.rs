//! # LogWriter: renders runtime events through `tracing`.
//!
//! Level by kind: failures, overflow and grace problems at `warn`/`error`,
//! lifecycle at `info`, traffic (ticks, messages, state) at `debug`/`trace`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  tickbus: channel initialized channel="socket" attempt=1
//! WARN  tickbus: channel init failed channel="socket" attempt=1 error="connection refused"
//! DEBUG tickbus: state changed version=3 keys=["websocketConnected"] source=Some("socket")
//! ERROR tickbus: grace exceeded stuck="socket"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, trace, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Observer that logs every event.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let channel = e.channel.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::BusStarting => info!(target: "tickbus", seq = e.seq, "bus starting"),
            EventKind::BusStarted => info!(target: "tickbus", seq = e.seq, "bus started"),
            EventKind::ChannelInitialized => {
                info!(target: "tickbus", channel, attempt = e.attempt, "channel initialized")
            }
            EventKind::ChannelInitFailed => warn!(
                target: "tickbus",
                channel,
                attempt = e.attempt,
                label = e.error_label,
                error = reason,
                "channel init failed"
            ),
            EventKind::InitBackoffScheduled => info!(
                target: "tickbus",
                channel,
                after_attempt = e.attempt,
                delay_ms = e.delay_ms,
                "channel init retry scheduled"
            ),
            EventKind::ShutdownRequested => info!(target: "tickbus", "shutdown requested"),
            EventKind::ChannelStopped => info!(target: "tickbus", channel, "channel stopped"),
            EventKind::AllStoppedWithin => {
                info!(target: "tickbus", "all channels stopped within grace")
            }
            EventKind::GraceExceeded => error!(target: "tickbus", stuck = reason, "grace exceeded"),
            EventKind::TickFired => trace!(target: "tickbus", tick = e.tick, "tick"),
            EventKind::MessagePublished => debug!(
                target: "tickbus",
                topic = e.topic.as_deref(),
                source = e.channel.as_deref(),
                "message published"
            ),
            EventKind::StateChanged => debug!(
                target: "tickbus",
                version = e.version,
                keys = ?e.keys.as_deref(),
                source = ?e.channel.as_deref(),
                "state changed"
            ),
            EventKind::ChannelFailed => warn!(
                target: "tickbus",
                channel,
                label = e.error_label,
                error = reason,
                "channel handler failed"
            ),
            EventKind::ChannelDetached => {
                error!(target: "tickbus", channel, error = reason, "channel detached")
            }
            EventKind::ChannelOverflow => {
                warn!(target: "tickbus", channel, reason, "channel queue overflow")
            }
            EventKind::ChannelPanicked => {
                error!(target: "tickbus", channel, info = reason, "channel panicked")
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "tickbus", subscriber = channel, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                error!(target: "tickbus", subscriber = channel, info = reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}
