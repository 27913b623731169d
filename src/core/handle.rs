//! # Control handle for a bus running in the background.
//!
//! Returned by [`Bus::start`](crate::Bus::start).
//!
//! ```text
//! BusHandle
//!   ├─ publish(topic, payload) ──► Hub (MessagePublished, no source)
//!   ├─ state() / config()
//!   ├─ subscribe()             ──► raw event receiver
//!   └─ shutdown().await        ──► cancel token, join run(), return its result
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::GlobalConfig,
    error::BusError,
    events::{Event, Hub},
    state::StateStore,
};

/// Handle to a running bus.
pub struct BusHandle {
    hub: Hub,
    state: StateStore,
    config: GlobalConfig,
    token: CancellationToken,
    join: Option<JoinHandle<Result<(), BusError>>>,
}

impl BusHandle {
    pub(crate) fn new(
        hub: Hub,
        state: StateStore,
        config: GlobalConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            hub,
            state,
            config,
            token,
            join: None,
        }
    }

    pub(crate) fn attach(mut self, join: JoinHandle<Result<(), BusError>>) -> Self {
        self.join = Some(join);
        self
    }

    /// Publishes a message to every channel.
    pub fn publish(&self, topic: impl Into<Arc<str>>, payload: Value) {
        self.hub.publish(Event::message(None, topic, payload));
    }

    /// Shared state.
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Global config record.
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Raw receiver of every runtime event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.hub.subscribe()
    }

    /// Token that stops the bus when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// `true` once the bus has stopped (or failed to start).
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Requests shutdown and waits for the bus to stop.
    pub async fn shutdown(self) -> Result<(), BusError> {
        self.token.cancel();
        self.wait().await
    }

    /// Waits for the bus to stop on its own (signal, init failure or another
    /// holder of the shutdown token).
    pub async fn wait(mut self) -> Result<(), BusError> {
        match self.join.take() {
            Some(join) => join.await.map_err(|err| BusError::Join {
                reason: err.to_string(),
            })?,
            None => Ok(()),
        }
    }
}
