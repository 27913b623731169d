//! # Observers of runtime events.
//!
//! Channels only see traffic (ticks, messages, state changes). Observers see
//! **every** event on the hub, which makes them the place for logging, metrics
//! and alerting.
//!
//! ```text
//! Hub ──► hub listener ──► SubscriberSet::emit(&Event)
//!                              ├──► [queue] ──► LogWriter.on_event()
//!                              └──► [queue] ──► Custom.on_event()
//! ```

mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
mod log;

pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;

#[cfg(feature = "logging")]
pub use log::LogWriter;
