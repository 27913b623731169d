//! # Jitter applied to backoff delays.
//!
//! Channels that talk to the same upstream tend to fail together at startup;
//! jitter spreads their retries apart.
//!
//! - [`JitterPolicy::None`] exact delay
//! - [`JitterPolicy::Full`] random in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`] random in `[base, prev * 3]`, capped at max

use rand::Rng;
use std::time::Duration;

/// Randomization strategy for retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the computed delay as is.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Half fixed, half random.
    Equal,
    /// Uniform in `[base, prev * 3]`, capped at `max`.
    /// Needs extra context, see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`. `Decorrelated` returns `delay` unchanged.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => {
                let ms = delay.as_millis() as u64;
                if ms == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rand::rng().random_range(0..=ms))
            }
            JitterPolicy::Equal => {
                let half = delay.as_millis() as u64 / 2;
                if half == 0 {
                    return delay;
                }
                Duration::from_millis(half + rand::rng().random_range(0..=half))
            }
        }
    }

    /// Decorrelated jitter: uniform in `[base, min(prev * 3, max)]`.
    ///
    /// Falls back to [`apply`](Self::apply) on `prev` for other policies.
    pub fn apply_decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }

        let base_ms = base.as_millis() as u64;
        let upper = (prev.as_millis() as u64)
            .saturating_mul(3)
            .min(max.as_millis() as u64)
            .max(base_ms);

        if base_ms >= upper {
            return base;
        }
        Duration::from_millis(rand::rng().random_range(base_ms..=upper))
    }
}
