//! Runtime events: data model and broadcast hub.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] classification and payload metadata
//! - [`Hub`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Bus::run` (lifecycle), the ticker, `StateStore` writes,
//!   `ChannelContext::publish` / `BusHandle::publish`, channel and subscriber workers
//!   (failures, overflow, panics).
//! - **Consumers**: the hub listener in `Bus::run` (routes to channels and
//!   observers) and any receiver from `BusHandle::subscribe`.

mod event;
mod hub;

pub use event::{Event, EventKind};
pub(crate) use event::panic_message;
pub use hub::Hub;
