//! # tickbus
//!
//! **Tickbus** is a small in-process message bus for async Rust.
//!
//! A bus wires a set of named channels to a shared global config, a versioned
//! shared state and an optional periodic tick. Channels talk to each other by
//! publishing messages; every effective state write is announced to all of them.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Channel    │   │   Channel    │   │   Channel    │
//!     │  (socket)    │   │    (ui)      │   │  (history)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Bus (runtime orchestrator)                                       │
//! │  - GlobalConfig (read-only record from with_config)               │
//! │  - StateStore   (versioned record from init_with)                 │
//! │  - Ticker       (TickFired every enable_tick ms)                  │
//! │  - ChannelSet   (one queue + worker per channel)                  │
//! │  - SubscriberSet (observers: logging, metrics)                    │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        │ ctx.publish()    │ ctx.state().set()│ ticker        │ lifecycle
//!        ▼                  ▼                  ▼               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Hub (broadcast channel)                    │
//! │                  (capacity: BusConfig::hub_capacity)              │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                         ┌────────────────────┐
//!                         │    hub listener    │
//!                         └───┬────────────┬───┘
//!                  traffic    ▼            ▼   every event
//!                        ChannelSet    SubscriberSet
//!                     ┌──────┼──────┐      ┌────┴────┐
//!                     ▼      ▼      ▼      ▼         ▼
//!                  on_tick on_message   LogWriter  custom
//!                  on_state_change
//! ```
//!
//! ### Lifecycle
//! ```text
//! Bus::builder()
//!     .with_channels(..) .with_config(..) .enable_tick(ms) .init_with(..)
//!     .build()?            (duplicate names, non-object records rejected)
//!     .run().await / .start()
//!
//! run():
//!   ├─► on_init() per channel, in order (timeout, retries with backoff)
//!   ├─► workers, ticker, listener spawned ─► BusStarted
//!   ├─► ... traffic until SIGINT/SIGTERM or shutdown token ...
//!   └─► ShutdownRequested ─► queues drained ─► on_shutdown() ─► AllStoppedWithin
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Channels**      | Units with async hooks for init, ticks, messages and state.  | [`Channel`], [`ChannelFn`], [`ChannelRef`]  |
//! | **Context**       | Config, state, publish and cancellation for a channel.       | [`ChannelContext`], [`Message`], [`Tick`]   |
//! | **State**         | Versioned shared record with change notification.            | [`StateStore`], [`StateChange`]             |
//! | **Configuration** | User record plus runtime knobs.                              | [`GlobalConfig`], [`BusConfig`]             |
//! | **Runtime**       | Assembly, run loop and background control.                   | [`Bus`], [`BusBuilder`], [`BusHandle`]      |
//! | **Observers**     | Hook into every runtime event.                               | [`Subscribe`], [`Event`], [`Hub`]           |
//! | **Policies**      | Backoff between `on_init` attempts.                          | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Errors**        | Typed errors for the bus, channels, state and config.        | [`BusError`], [`ChannelError`]              |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], an observer that renders events through `tracing`.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use tickbus::{Bus, ChannelContext, ChannelError, ChannelFn, ChannelRef, Message};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let history: ChannelRef = ChannelFn::arc("history", |ctx: ChannelContext, msg: Message| async move {
//!         ctx.state()
//!             .append("messages", (*msg.payload).clone())
//!             .map(|_| ())
//!             .map_err(|e| ChannelError::fail(e.to_string()))
//!     });
//!
//!     let handle = Bus::builder()
//!         .with_channels(vec![history])
//!         .with_config(json!({ "websocketHost": "localhost", "websocketPort": 8080 }))
//!         .enable_tick(1000)
//!         .init_with(json!({ "websocketConnected": false, "messages": [] }))
//!         .build()?
//!         .start();
//!
//!     let mut changes = handle.state().watch();
//!     handle.publish("chat", json!("hello"));
//!     changes.changed().await?;
//!
//!     assert_eq!(handle.state().snapshot()["messages"], json!(["hello"]));
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod channels;
mod config;
mod core;
mod error;
mod events;
mod policies;
mod state;
mod subscribers;

// ---- Public re-exports ----

pub use channels::{Channel, ChannelContext, ChannelFn, ChannelRef, Message, Tick};
pub use config::{BusConfig, GlobalConfig};
pub use core::{Bus, BusBuilder, BusHandle};
pub use error::{BusError, ChannelError, ConfigError, StateError};
pub use events::{Event, EventKind, Hub};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use state::{StateChange, StateStore};
pub use subscribers::{Subscribe, SubscriberSet};

// Built-in observer that logs through `tracing`.
// Disable with: `--no-default-features`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
