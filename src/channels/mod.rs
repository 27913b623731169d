//! # Channels: the units plugged into a bus.
//!
//! - [`Channel`] trait with async hooks (`on_init`, `on_tick`, `on_message`,
//!   `on_state_change`, `on_shutdown`)
//! - [`ChannelFn`] closure-backed, message-only channel
//! - [`ChannelRef`] shared handle (`Arc<dyn Channel>`)
//! - [`ChannelContext`] what a channel sees: config, state, publish, cancellation
//! - [`Message`], [`Tick`] payloads delivered to the hooks

mod channel;
mod channel_fn;
mod context;
mod message;

pub use channel::{Channel, ChannelRef};
pub use channel_fn::ChannelFn;
pub use context::ChannelContext;
pub use message::{Message, Tick};
