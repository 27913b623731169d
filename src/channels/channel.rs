//! # The `Channel` trait.
//!
//! A channel is registered once with `BusBuilder::with_channels` and then
//! receives traffic from a dedicated worker. Hooks run sequentially per channel
//! (never concurrently with each other), so `&self` state only needs interior
//! mutability, not cross-hook synchronization.

use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::{ChannelContext, Message, Tick};
use crate::error::ChannelError;
use crate::state::StateChange;

/// Shared handle to a channel.
pub type ChannelRef = Arc<dyn Channel>;

/// # A unit plugged into the bus.
///
/// Every hook has a no-op default, so a channel only implements what it needs.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tickbus::{Channel, ChannelContext, ChannelError, Message, Tick};
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Channel for Heartbeat {
///     fn name(&self) -> &str { "heartbeat" }
///
///     async fn on_tick(&self, ctx: &ChannelContext, tick: Tick) -> Result<(), ChannelError> {
///         ctx.publish("heartbeat", serde_json::json!({ "n": tick.n }));
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Stable name, unique within a bus.
    fn name(&self) -> &str;

    /// Called once before the bus starts delivering events.
    ///
    /// Retryable errors (`Fail`, `Timeout`) are retried with backoff; anything
    /// else aborts startup.
    async fn on_init(&self, _ctx: &ChannelContext) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Called on every tick when ticking is enabled.
    async fn on_tick(&self, _ctx: &ChannelContext, _tick: Tick) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Called for every message published by **another** channel or a bus handle.
    async fn on_message(&self, _ctx: &ChannelContext, _msg: &Message) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Called after every effective state write, including this channel's own.
    async fn on_state_change(
        &self,
        _ctx: &ChannelContext,
        _change: &StateChange,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Called once when the bus shuts down, after queued events were handled.
    async fn on_shutdown(&self, _ctx: &ChannelContext) {}

    /// Capacity of this channel's event queue (minimum 1).
    ///
    /// When full, new events for this channel are dropped and reported as
    /// `ChannelOverflow`.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
