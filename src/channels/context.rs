//! # What a channel can reach.
//!
//! [`ChannelContext`] is handed to every hook. It is cheap to clone, so a
//! channel may move it into tasks it spawns itself (e.g. a socket reader).
//!
//! ```text
//! ChannelContext
//!   ├─ config()  ──► GlobalConfig (read-only, shared)
//!   ├─ state()   ──► StateStore   (writes tagged with this channel)
//!   ├─ publish() ──► Hub          (MessagePublished, source = this channel)
//!   └─ token()   ──► CancellationToken (cancelled on shutdown)
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::GlobalConfig;
use crate::events::{Event, Hub};
use crate::state::StateStore;

/// Per-channel view of the bus.
#[derive(Clone, Debug)]
pub struct ChannelContext {
    name: Arc<str>,
    config: GlobalConfig,
    state: StateStore,
    hub: Hub,
    token: CancellationToken,
}

impl ChannelContext {
    pub(crate) fn new(
        name: Arc<str>,
        config: GlobalConfig,
        state: &StateStore,
        hub: Hub,
        token: CancellationToken,
    ) -> Self {
        Self {
            state: state.scoped(Arc::clone(&name)),
            name,
            config,
            hub,
            token,
        }
    }

    /// Name of the channel this context belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global config record.
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Shared state; writes are attributed to this channel.
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Publishes a message to every other channel.
    pub fn publish(&self, topic: impl Into<Arc<str>>, payload: Value) {
        self.hub
            .publish(Event::message(Some(&*self.name), topic, payload));
    }

    /// Serializes `payload` and publishes it.
    pub fn publish_serde<T: Serialize>(
        &self,
        topic: impl Into<Arc<str>>,
        payload: &T,
    ) -> Result<(), serde_json::Error> {
        self.publish(topic, serde_json::to_value(payload)?);
        Ok(())
    }

    /// Token cancelled when the bus shuts down.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `true` once shutdown was requested.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }
}
