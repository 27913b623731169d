//! Runtime core: assembly, lifecycle and delivery.
//!
//! The public API from this module is [`Bus`], [`BusBuilder`] and [`BusHandle`].
//!
//! Internal modules:
//! - [`builder`]: fluent assembly and validation;
//! - [`bus`]: startup, hub listener, shutdown with grace;
//! - [`dispatch`]: per-channel queues and workers ([`dispatch::ChannelSet`]);
//! - [`init`]: `on_init` with timeout, retries and backoff;
//! - [`ticker`]: periodic `TickFired` publisher;
//! - [`shutdown`]: OS signal handling;
//! - [`handle`]: control of a bus running in the background.

mod builder;
mod bus;
mod dispatch;
mod handle;
mod init;
mod shutdown;
mod ticker;

pub use builder::BusBuilder;
pub use bus::Bus;
pub use handle::BusHandle;
