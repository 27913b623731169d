use std::sync::Arc;

use crate::events::{Event, EventKind};

/// One effective write to the shared state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateChange {
    /// State version after the write.
    pub version: u64,
    /// Keys whose value changed (added, modified or removed), sorted.
    pub keys: Arc<[String]>,
    /// Channel that performed the write, if it went through a channel context.
    pub source: Option<Arc<str>>,
}

impl StateChange {
    /// Returns `true` if `key` is among the changed keys.
    pub fn touches(&self, key: &str) -> bool {
        self.keys.binary_search_by(|k| k.as_str().cmp(key)).is_ok()
    }

    pub(crate) fn from_event(ev: &Event) -> Option<Self> {
        if ev.kind != EventKind::StateChanged {
            return None;
        }
        Some(Self {
            version: ev.version?,
            keys: ev.keys.clone()?,
            source: ev.channel.clone(),
        })
    }
}
