//! Configuration layers.
//!
//! - [`BusConfig`] runtime knobs (grace, hub capacity, timeouts, init retries, tick)
//! - [`GlobalConfig`] the user record passed to `with_config`, shared read-only with channels

mod bus_config;
mod global;

pub use bus_config::BusConfig;
pub use global::GlobalConfig;
