//! # Runtime configuration for the bus.
//!
//! ## Sentinel values
//! - `tick_interval = 0s` → ticking disabled
//! - `handler_timeout = 0s` → channel handlers are not bounded
//! - `init_timeout = 0s` → `on_init` is not bounded
//! - `init_attempts = 0` → treated as 1
//! - `hub_capacity = 0` → treated as 1

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Runtime settings for a [`Bus`](crate::Bus).
///
/// All fields are public. Prefer the accessors, which resolve sentinel values.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Maximum wait for channel workers to stop after shutdown is requested.
    ///
    /// On expiry `run` returns `BusError::GraceExceeded` with the stuck channels.
    pub grace: Duration,

    /// Capacity of the internal event hub ring buffer.
    ///
    /// Receivers lagging more than this many events skip the oldest ones.
    pub hub_capacity: usize,

    /// Per-call bound on `on_tick` / `on_message` / `on_state_change`.
    pub handler_timeout: Duration,

    /// Per-attempt bound on `on_init`.
    pub init_timeout: Duration,

    /// Maximum number of `on_init` attempts per channel.
    pub init_attempts: u32,

    /// Delay schedule between `on_init` attempts.
    pub init_backoff: BackoffPolicy,

    /// Period of the ticker (set by `BusBuilder::enable_tick`).
    pub tick_interval: Duration,
}

impl BusConfig {
    /// Returns the tick period, `None` when ticking is disabled.
    #[inline]
    pub fn tick(&self) -> Option<Duration> {
        Some(self.tick_interval).filter(|d| !d.is_zero())
    }

    /// Returns the handler timeout, `None` when unbounded.
    #[inline]
    pub fn handler_timeout(&self) -> Option<Duration> {
        Some(self.handler_timeout).filter(|d| !d.is_zero())
    }

    /// Returns the init timeout, `None` when unbounded.
    #[inline]
    pub fn init_timeout(&self) -> Option<Duration> {
        Some(self.init_timeout).filter(|d| !d.is_zero())
    }

    /// Returns the number of init attempts, at least 1.
    #[inline]
    pub fn init_attempts_clamped(&self) -> u32 {
        self.init_attempts.max(1)
    }

    /// Returns the hub capacity, at least 1.
    #[inline]
    pub fn hub_capacity_clamped(&self) -> usize {
        self.hub_capacity.max(1)
    }
}

impl Default for BusConfig {
    /// - `grace = 30s`
    /// - `hub_capacity = 1024`
    /// - `handler_timeout = 0s` (unbounded)
    /// - `init_timeout = 0s` (unbounded)
    /// - `init_attempts = 3`
    /// - `init_backoff = BackoffPolicy::default()`
    /// - `tick_interval = 0s` (disabled)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            hub_capacity: 1024,
            handler_timeout: Duration::ZERO,
            init_timeout: Duration::ZERO,
            init_attempts: 3,
            init_backoff: BackoffPolicy::default(),
            tick_interval: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_resolve_to_none() {
        let cfg = BusConfig {
            handler_timeout: Duration::ZERO,
            init_timeout: Duration::ZERO,
            ..BusConfig::default()
        };
        assert_eq!(cfg.tick(), None);
        assert_eq!(cfg.handler_timeout(), None);
        assert_eq!(cfg.init_timeout(), None);
    }

    #[test]
    fn defaults_leave_handlers_and_init_unbounded() {
        let cfg = BusConfig::default();
        assert_eq!(cfg.grace, Duration::from_secs(30));
        assert_eq!(cfg.hub_capacity, 1024);
        assert_eq!(cfg.init_attempts, 3);
        assert_eq!(cfg.handler_timeout(), None);
        assert_eq!(cfg.init_timeout(), None);
        assert_eq!(cfg.tick(), None);
    }

    #[test]
    fn zero_counts_are_clamped() {
        let cfg = BusConfig {
            hub_capacity: 0,
            init_attempts: 0,
            tick_interval: Duration::from_millis(250),
            ..BusConfig::default()
        };
        assert_eq!(cfg.hub_capacity_clamped(), 1);
        assert_eq!(cfg.init_attempts_clamped(), 1);
        assert_eq!(cfg.tick(), Some(Duration::from_millis(250)));
    }
}
