use std::sync::Arc;
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::events::{Event, EventKind};

/// Message delivered to `Channel::on_message`.
#[derive(Clone, Debug)]
pub struct Message {
    /// Hub sequence number of the publish.
    pub seq: u64,
    /// Publish time.
    pub at: SystemTime,
    /// Routing topic, free-form (e.g. `"chat.received"`).
    pub topic: Arc<str>,
    /// JSON payload.
    pub payload: Arc<Value>,
    /// Publishing channel; `None` for publishes from a `BusHandle`.
    pub source: Option<Arc<str>>,
}

impl Message {
    /// Converts the payload into `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.payload.as_ref())
    }

    pub(crate) fn from_event(ev: &Event) -> Option<Self> {
        if ev.kind != EventKind::MessagePublished {
            return None;
        }
        Some(Self {
            seq: ev.seq,
            at: ev.at,
            topic: ev.topic.clone()?,
            payload: ev.payload.clone().unwrap_or_else(|| Arc::new(Value::Null)),
            source: ev.channel.clone(),
        })
    }
}

/// Tick delivered to `Channel::on_tick`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    /// Tick counter, starting at 1.
    pub n: u64,
    /// Fire time.
    pub at: SystemTime,
}

impl Tick {
    pub(crate) fn from_event(ev: &Event) -> Option<Self> {
        match ev.kind {
            EventKind::TickFired => Some(Self {
                n: ev.tick?,
                at: ev.at,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Chat {
        text: String,
    }

    #[test]
    fn message_is_built_only_from_message_events() {
        let ev = Event::message(Some("ui"), "chat.sent", json!({ "text": "hello" }));
        let msg = Message::from_event(&ev).unwrap();
        assert_eq!(&*msg.topic, "chat.sent");
        assert_eq!(msg.source.as_deref(), Some("ui"));
        assert_eq!(msg.payload_as::<Chat>().unwrap(), Chat { text: "hello".into() });

        assert!(Message::from_event(&Event::tick(1)).is_none());
    }

    #[test]
    fn tick_carries_counter() {
        assert_eq!(Tick::from_event(&Event::tick(42)).map(|t| t.n), Some(42));
        assert!(Tick::from_event(&Event::new(EventKind::BusStarted)).is_none());
    }
}
