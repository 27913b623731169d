//! # Runtime events published on the hub.
//!
//! [`EventKind`] classifies events in four groups:
//! - **Lifecycle**: bus start/stop, channel init, shutdown and grace
//! - **Traffic**: ticks, messages, state changes (routed to channels)
//! - **Channel health**: handler failures, detach, overflow, panics
//! - **Observer health**: subscriber overflow and panics
//!
//! [`Event`] carries a global monotonic `seq`, a timestamp and optional
//! metadata whose presence depends on the kind.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use tickbus::{Event, EventKind};
//!
//! let ev = Event::message(Some("chat"), "chat.sent", json!({ "text": "hi" }));
//! assert_eq!(ev.kind, EventKind::MessagePublished);
//! assert_eq!(ev.channel.as_deref(), Some("chat"));
//! assert_eq!(ev.topic.as_deref(), Some("chat.sent"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use serde_json::Value;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Lifecycle ===
    /// `run` was entered; channels are about to be initialized.
    BusStarting,

    /// All channels initialized; workers, ticker and listener are running.
    BusStarted,

    /// A channel's `on_init` succeeded.
    ///
    /// Sets: `channel`, `attempt`
    ChannelInitialized,

    /// A channel's `on_init` attempt failed.
    ///
    /// Sets: `channel`, `attempt`, `reason`, `error_label`
    ChannelInitFailed,

    /// Another `on_init` attempt is scheduled.
    ///
    /// Sets: `channel`, `attempt` (the failed one), `delay_ms`
    InitBackoffScheduled,

    /// Shutdown requested (OS signal or `BusHandle::shutdown`).
    ShutdownRequested,

    /// A channel worker drained its queue, ran `on_shutdown` and exited.
    ///
    /// Sets: `channel`
    ChannelStopped,

    /// Every channel worker stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some channel workers were still running.
    ///
    /// Sets: `reason` (comma-separated stuck channels)
    GraceExceeded,

    // === Traffic ===
    /// Periodic tick.
    ///
    /// Sets: `tick` (1-based)
    TickFired,

    /// A message was published.
    ///
    /// Sets: `topic`, `payload`, `channel` (source, absent for external publishes)
    MessagePublished,

    /// Shared state changed.
    ///
    /// Sets: `version`, `keys`, `channel` (writer, when written through a channel context)
    StateChanged,

    // === Channel health ===
    /// A channel handler returned an error.
    ///
    /// Sets: `channel`, `reason`, `error_label`
    ChannelFailed,

    /// A channel returned a fatal error and no longer receives events.
    ///
    /// Sets: `channel`, `reason`
    ChannelDetached,

    /// An event was dropped for one channel (queue full or closed).
    ///
    /// Sets: `channel`, `reason` (`"full"` / `"closed"`)
    ChannelOverflow,

    /// A channel handler panicked; the worker keeps running.
    ///
    /// Sets: `channel`, `reason` (panic message)
    ChannelPanicked,

    // === Observer health ===
    /// An event was dropped for one subscriber.
    ///
    /// Sets: `channel` (subscriber name), `reason`
    SubscriberOverflow,

    /// A subscriber panicked.
    ///
    /// Sets: `channel` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Channel (or subscriber) the event is about; message/state source.
    pub channel: Option<Arc<str>>,
    /// Message topic.
    pub topic: Option<Arc<str>>,
    /// Message payload.
    pub payload: Option<Arc<Value>>,
    /// Tick counter.
    pub tick: Option<u64>,
    /// State version after the change.
    pub version: Option<u64>,
    /// Changed state keys, sorted.
    pub keys: Option<Arc<[String]>>,
    /// Human-readable reason (errors, overflow details, panic info).
    pub reason: Option<Arc<str>>,
    /// Stable error label (see `ChannelError::as_label`).
    pub error_label: Option<&'static str>,
    /// Attempt number (1-based).
    pub attempt: Option<u32>,
    /// Delay before the next attempt, in milliseconds.
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates an event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            channel: None,
            topic: None,
            payload: None,
            tick: None,
            version: None,
            keys: None,
            reason: None,
            error_label: None,
            attempt: None,
            delay_ms: None,
        }
    }

    /// Tick event.
    pub fn tick(n: u64) -> Self {
        let mut ev = Event::new(EventKind::TickFired);
        ev.tick = Some(n);
        ev
    }

    /// Message event; `source` is the publishing channel, if any.
    pub fn message(source: Option<&str>, topic: impl Into<Arc<str>>, payload: Value) -> Self {
        let mut ev = Event::new(EventKind::MessagePublished);
        ev.channel = source.map(Arc::from);
        ev.topic = Some(topic.into());
        ev.payload = Some(Arc::new(payload));
        ev
    }

    /// State change event.
    pub fn state_changed(version: u64, keys: Vec<String>, source: Option<&str>) -> Self {
        let mut ev = Event::new(EventKind::StateChanged);
        ev.version = Some(version);
        ev.keys = Some(keys.into());
        ev.channel = source.map(Arc::from);
        ev
    }

    /// Attaches a channel (or subscriber) name.
    #[inline]
    pub fn with_channel(mut self, name: impl Into<Arc<str>>) -> Self {
        self.channel = Some(name.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a stable error label.
    #[inline]
    pub fn with_error_label(mut self, label: &'static str) -> Self {
        self.error_label = Some(label);
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Channel overflow: event dropped for `channel`.
    #[inline]
    pub fn channel_overflow(channel: &str, reason: &'static str) -> Self {
        Event::new(EventKind::ChannelOverflow)
            .with_channel(channel)
            .with_reason(reason)
    }

    /// Channel handler panic.
    #[inline]
    pub fn channel_panicked(channel: &str, info: String) -> Self {
        Event::new(EventKind::ChannelPanicked)
            .with_channel(channel)
            .with_reason(info)
    }

    /// Subscriber overflow.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_channel(subscriber)
            .with_reason(reason)
    }

    /// Subscriber panic.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_channel(subscriber)
            .with_reason(info)
    }

    /// `true` for overflow events, which must not cause further overflow events.
    #[inline]
    pub fn is_overflow(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ChannelOverflow | EventKind::SubscriberOverflow
        )
    }

    /// `true` for the kinds routed to channels.
    #[inline]
    pub fn is_traffic(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TickFired | EventKind::MessagePublished | EventKind::StateChanged
        )
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::BusStarting);
        let b = Event::tick(1);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn state_change_carries_sorted_keys_and_source() {
        let ev = Event::state_changed(3, vec!["a".into(), "b".into()], Some("ws"));
        assert_eq!(ev.version, Some(3));
        assert_eq!(ev.keys.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(ev.channel.as_deref(), Some("ws"));
        assert!(ev.is_traffic());
    }

    #[test]
    fn delay_saturates_at_u32() {
        let ev = Event::new(EventKind::InitBackoffScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn overflow_kinds_are_flagged() {
        assert!(Event::channel_overflow("x", "full").is_overflow());
        assert!(Event::subscriber_overflow("log", "closed").is_overflow());
        assert!(!Event::message(None, "t", json!(null)).is_overflow());
    }
}
